use plandiff::plan::{PlanOptions, compile_plan};

use crate::cli::{PlanArgs, load_json_file, parse_primary_keys};

pub fn handle_plan_command(args: PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let schema = load_json_file(&args.schema)?;
    let options = PlanOptions {
        primary_key_map: parse_primary_keys(&args.primary_keys)?,
        ..PlanOptions::default()
    };

    let plan = compile_plan(&schema, options);

    for diagnostic in plan.diagnostics() {
        eprintln!("warning: {}: {}", diagnostic.pointer, diagnostic.message);
    }
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
