mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::blueprints::BlueprintsArgs;
use commands::grain_id::GrainIdArgs;
use commands::serve::ServeArgs;

#[derive(Parser, Debug)]
#[command(name = "gamed", version, about = "Game daemon: per-player inventory and scheduler grains")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP gateway and grain host
    Serve(ServeArgs),

    /// Print the inventory grain id derived from a user id
    GrainId(GrainIdArgs),

    /// List the blueprints the daemon would load
    Blueprints(BlueprintsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => commands::serve::cmd_serve(&args).await,
        Command::GrainId(args) => commands::grain_id::cmd_grain_id(&args),
        Command::Blueprints(args) => commands::blueprints::cmd_blueprints(&args),
    }
}
