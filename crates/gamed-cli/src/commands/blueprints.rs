//! `gamed blueprints` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use gamed_host::config::ENV_BLUEPRINTS;
use gamed_types::BlueprintRegistry;

#[derive(Args, Debug)]
pub struct BlueprintsArgs {
    /// JSON blueprint file (default: built-in registry)
    #[arg(long, env = ENV_BLUEPRINTS)]
    pub blueprints: Option<PathBuf>,
}

pub fn cmd_blueprints(args: &BlueprintsArgs) -> Result<()> {
    let registry = match &args.blueprints {
        Some(path) => BlueprintRegistry::from_json_path(path)?,
        None => BlueprintRegistry::builtin(),
    };
    let listing: Vec<_> = registry
        .names()
        .into_iter()
        .filter_map(|name| registry.get(name))
        .collect();
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}
