mod error;
mod parser;

use std::fmt::Display;

pub use crate::path::error::PathError;

use parser::parse_pointer;

/// One reference token of an RFC 6901 JSON Pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// An object member name (unescaped form).
    Key(String),

    /// A numeric array index.
    Index(usize),

    /// The `-` token addressing the position after the last array element.
    Append,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Pointer {
    pub(crate) segments: Vec<Segment>,
}

impl TryFrom<&str> for Pointer {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Pointer::default());
        }

        match parse_pointer(value) {
            Ok((rest, pointer)) if rest.is_empty() => Ok(pointer),

            // Parsed a valid prefix but there's junk left.
            Ok((rest, _)) => Err(error::trailing_input_error(value, rest)),

            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(error::convert_verbose_error(value, e))
            }

            Err(nom::Err::Incomplete(_)) => Err(PathError::InvalidSyntax {
                position: value.len(),
                message: "unexpected end of input".into(),
            }),
        }
    }
}

impl IntoIterator for Pointer {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

impl<'a> IntoIterator for &'a Pointer {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

impl Pointer {
    pub fn root() -> Self {
        Pointer::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn push(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Pointer { segments }
    }

    pub fn push_key(&self, key: &str) -> Self {
        self.push(Segment::Key(key.to_owned()))
    }

    pub fn push_index(&self, index: usize) -> Self {
        self.push(Segment::Index(index))
    }

    pub fn push_append(&self) -> Self {
        self.push(Segment::Append)
    }

    /// Returns the parent pointer, or None for the root.
    pub fn parent(&self) -> Option<Pointer> {
        if self.segments.is_empty() {
            None
        } else {
            let segments = self.segments[..self.segments.len() - 1].to_vec();
            Some(Pointer { segments })
        }
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Drops every `Index`/`Append` segment. Plan entries are keyed by
    /// normalized pointers, so `/environments/0/services` and
    /// `/environments/services` address the same plan slot.
    pub fn normalized(&self) -> Pointer {
        let segments = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Key(_)))
            .cloned()
            .collect();
        Pointer { segments }
    }

    pub fn starts_with(&self, prefix: &Pointer) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments
    }

    /// Returns the remainder of `self` after `prefix`, or None when `prefix`
    /// does not lead this pointer.
    pub fn strip_prefix(&self, prefix: &Pointer) -> Option<Pointer> {
        if self.starts_with(prefix) {
            Some(Pointer {
                segments: self.segments[prefix.segments.len()..].to_vec(),
            })
        } else {
            None
        }
    }
}

/// Resolves a pointer against a document. Numeric tokens index arrays, or
/// address the same-named member when the node is an object.
pub fn lookup<'a>(doc: &'a serde_json::Value, pointer: &Pointer) -> Option<&'a serde_json::Value> {
    let mut current = doc;
    for segment in pointer {
        current = match segment {
            Segment::Key(key) => current.get(key.as_str())?,
            Segment::Index(index) => match current {
                serde_json::Value::Object(map) => map.get(&index.to_string())?,
                other => other.get(*index)?,
            },
            Segment::Append => return None,
        };
    }
    Some(current)
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

impl Display for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Key(key) => write!(f, "/{}", escape_token(key))?,
                Segment::Index(index) => write!(f, "/{}", index)?,
                Segment::Append => write!(f, "/-")?,
            }
        }
        Ok(())
    }
}

impl serde::Serialize for Pointer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Pointer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Pointer::try_from(raw.as_str()).map_err(serde::de::Error::custom)
    }
}
