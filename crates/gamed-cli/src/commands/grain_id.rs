//! `gamed grain-id` command.

use anyhow::{Context, Result};
use clap::Args;
use gamed_types::{GrainAddress, inventory_grain_id};
use uuid::Uuid;

#[derive(Args, Debug)]
pub struct GrainIdArgs {
    /// User id (UUID) as sent in the X-User-Id header
    pub user_id: String,
}

pub fn cmd_grain_id(args: &GrainIdArgs) -> Result<()> {
    let user = Uuid::parse_str(args.user_id.trim())
        .with_context(|| format!("invalid user id {:?}", args.user_id))?;
    println!("{}", GrainAddress::inventory(inventory_grain_id(user)));
    Ok(())
}
