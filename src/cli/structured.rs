use plandiff::plan::{PlanOptions, compile_plan};
use plandiff::structured::structured_diff;

use crate::cli::{StructuredArgs, load_json_file};

pub fn handle_structured_command(args: StructuredArgs) -> Result<(), Box<dyn std::error::Error>> {
    let file1 = load_json_file(&args.file1)?;
    let file2 = load_json_file(&args.file2)?;
    let schema = load_json_file(&args.schema)?;
    let plan = compile_plan(&schema, PlanOptions::default());

    let result = structured_diff(&file1, &file2, &plan, &args.target, None)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
