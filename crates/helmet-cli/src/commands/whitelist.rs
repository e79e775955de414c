//! Whitelist commands - manage the release whitelist

use console::style;
use helmet_kube::WhitelistChange;
use std::path::Path;

use super::{Context, release_id};
use crate::error::Result;

/// Add a bundle's release id to the whitelist
pub async fn add(ctx: &Context, bundle: &Path) -> Result<()> {
    let release = release_id(bundle)?;
    let cluster = ctx.connect().await?;

    match cluster.gate.add(&release).await? {
        WhitelistChange::Changed => println!(
            "{} Whitelisted {}",
            style("✓").green().bold(),
            style(&release).cyan()
        ),
        WhitelistChange::Unchanged => println!(
            "{} {} is already whitelisted",
            style("✓").green().bold(),
            style(&release).cyan()
        ),
    }

    Ok(())
}

/// Remove a bundle's release id from the whitelist
pub async fn remove(ctx: &Context, bundle: &Path) -> Result<()> {
    let release = release_id(bundle)?;
    let cluster = ctx.connect().await?;

    cluster.gate.remove(&release).await?;
    println!(
        "{} Blacklisted {}",
        style("✓").green().bold(),
        style(&release).cyan()
    );

    Ok(())
}

/// Fail unless a bundle's release id is whitelisted
pub async fn ensure(ctx: &Context, bundle: &Path) -> Result<()> {
    let release = release_id(bundle)?;
    let cluster = ctx.connect().await?;

    cluster.gate.ensure(&release).await?;
    println!(
        "{} {} is whitelisted in namespace {}",
        style("✓").green().bold(),
        style(&release).cyan(),
        style(cluster.gate.namespace()).yellow()
    );

    Ok(())
}
