pub mod diff;
pub mod plan;
pub mod structured;

use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "plandiff", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile a JSON Schema into the per-array strategy plan
    Plan(PlanArgs),

    /// Diff two JSON documents into a compact patch
    Diff(DiffArgs),

    /// Split a diff into parent/child blocks around a keyed array
    Structured(StructuredArgs),
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Path to the JSON Schema file
    pub schema: PathBuf,

    /// Force a primary key for an array pointer, e.g. /envs/services=id
    #[arg(short = 'k', long = "primary-key", value_name = "POINTER=FIELD")]
    pub primary_keys: Vec<String>,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Path to the source JSON file
    pub file1: PathBuf,

    /// Path to the target JSON file
    pub file2: PathBuf,

    /// Path to the JSON Schema guiding per-array strategies
    #[arg(short, long)]
    pub schema: Option<PathBuf>,

    /// Force a primary key for an array pointer, e.g. /envs/services=id
    #[arg(short = 'k', long = "primary-key", value_name = "POINTER=FIELD")]
    pub primary_keys: Vec<String>,
}

#[derive(Debug, Args)]
pub struct StructuredArgs {
    /// Path to the source JSON file
    pub file1: PathBuf,

    /// Path to the target JSON file
    pub file2: PathBuf,

    /// Path to the JSON Schema guiding per-array strategies
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Pointer of the keyed array to split around
    #[arg(short, long)]
    pub target: String,
}

pub(super) fn load_json_file(path: &std::path::Path) -> Result<serde_json::Value, Box<dyn Error>> {
    let data = std::fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&data)?;
    Ok(json)
}

pub(super) fn parse_primary_keys(raw: &[String]) -> Result<HashMap<String, String>, Box<dyn Error>> {
    let mut map = HashMap::new();
    for entry in raw {
        let Some((pointer, field)) = entry.split_once('=') else {
            return Err(format!(
                "invalid --primary-key '{entry}', expected POINTER=FIELD"
            )
            .into());
        };
        map.insert(pointer.to_string(), field.to_string());
    }
    Ok(map)
}
