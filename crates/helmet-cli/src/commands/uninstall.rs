//! Uninstall command - remove a bundle's releases from Kubernetes

use console::style;
use helmet_kube::uninstall_bundle;
use std::path::Path;

use super::{Context, release_id};
use crate::error::Result;

pub async fn run(ctx: &Context, bundle: &Path) -> Result<()> {
    let release = release_id(bundle)?;
    let cluster = ctx.connect().await?;

    println!(
        "{} Uninstalling bundle {}",
        style("→").blue().bold(),
        style(&release).cyan()
    );

    let report = uninstall_bundle(
        bundle,
        &cluster.gate,
        cluster.deployer.as_ref(),
        cluster.store.as_ref(),
    )
    .await?;

    for name in &report.releases {
        println!("{} {} uninstalled", style("✓").green().bold(), style(name).cyan());
    }
    if report.releases.is_empty() {
        println!("{} No release was installed", style("→").blue().bold());
    }

    Ok(())
}
