use nom::{
    IResult, Parser,
    branch::alt,
    character::complete::{char, satisfy},
    combinator::{eof, map, value},
    error::context,
    multi::{many0, many1},
    sequence::preceded,
};
use nom_language::error::VerboseError;

use super::{Pointer, Segment};

// ""            - allowed - root pointer
// /foo/bar      - allowed - object member access
// /foo/0        - allowed - array index
// /foo/-        - allowed - append position
// /foo/a~1b     - allowed - '~1' decodes to '/'
// /foo/m~0n     - allowed - '~0' decodes to '~'
// foo/bar       - not allowed - missing leading '/'
// /foo/a~2b     - not allowed - invalid escape
// /foo~         - not allowed - dangling '~'
pub(crate) fn parse_pointer(input: &str) -> IResult<&str, Pointer, VerboseError<&str>> {
    context(
        "expected a pointer starting with '/' or empty input",
        alt((
            // exactly empty input
            value(Pointer::root(), eof),
            // normal pointer: one or more '/'-led reference tokens
            map(many1(preceded(char('/'), parse_token)), |segments| {
                Pointer { segments }
            }),
        )),
    )
    .parse(input)
}

fn parse_token(input: &str) -> IResult<&str, Segment, VerboseError<&str>> {
    // One decoded char inside a reference token.
    // - `~` must be escaped (~0 or ~1), so raw '~' is excluded here.
    // - '/' terminates the token.
    let token_char = alt((
        unescape_json_pointer,
        satisfy(|c| c != '/' && c != '~'),
    ));
    context(
        "reference token",
        map(many0(token_char), |chars: Vec<char>| {
            classify_token(chars.into_iter().collect::<String>())
        }),
    )
    .parse(input)
}

/// Tokens `-` and canonical non-negative integers get array semantics; every
/// other token, including zero-padded digit runs like `007`, stays a key.
fn classify_token(token: String) -> Segment {
    if token == "-" {
        return Segment::Append;
    }
    let canonical_digits = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if canonical_digits {
        match token.parse::<usize>() {
            Ok(index) => Segment::Index(index),
            Err(_) => Segment::Key(token),
        }
    } else {
        Segment::Key(token)
    }
}

fn unescape_json_pointer(input: &str) -> IResult<&str, char, VerboseError<&str>> {
    let (rest, _) = char('~').parse(input)?;
    let (rest, esc) = alt((char('0'), char('1'))).parse(rest)?;

    let decoded_char = match esc {
        '0' => '~',
        '1' => '/',
        _ => unreachable!(),
    };

    Ok((rest, decoded_char))
}
