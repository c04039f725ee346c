use plandiff::diff::create_patch;
use plandiff::plan::{Plan, PlanOptions, compile_plan};

use crate::cli::{DiffArgs, load_json_file, parse_primary_keys};

pub fn handle_diff_command(args: DiffArgs) -> Result<(), Box<dyn std::error::Error>> {
    let file1 = load_json_file(&args.file1)?;
    let file2 = load_json_file(&args.file2)?;
    let plan = if let Some(schema_path) = args.schema {
        let schema = load_json_file(&schema_path)?;
        let options = PlanOptions {
            primary_key_map: parse_primary_keys(&args.primary_keys)?,
            ..PlanOptions::default()
        };
        compile_plan(&schema, options)
    } else {
        Plan::default()
    };

    let patch = create_patch(&file1, &file2, &plan);

    println!("{}", serde_json::to_string_pretty(&patch)?);
    Ok(())
}
