//! Update command - bring local charts in line with the chart manifest

use console::style;
use helmet_repo::{ChartManifest, ChartSynchronizer, ChartUpdateOutcome};
use std::path::Path;

use crate::error::{CliError, Result};

pub async fn run(manifest: &Path, charts: &Path, types: &Path, only: Option<&str>) -> Result<()> {
    for (dir, flag) in [(charts, "--charts"), (types, "--types")] {
        if !dir.is_dir() {
            return Err(CliError::validation_with_help(
                format!("directory '{}' does not exist", dir.display()),
                format!("create it or point {} elsewhere", flag),
            ));
        }
    }

    let manifest = ChartManifest::load(manifest)?;
    let selected = manifest.select(only);

    if selected.is_empty() {
        println!("{} No chart matches", style("→").blue().bold());
        return Ok(());
    }

    let total = selected.len();
    let sync = ChartSynchronizer::new(charts, types)?;
    let reports = sync.sync(selected).await;

    let mut failures = Vec::new();
    for report in reports {
        let name = style(format!("[{}]", report.name)).cyan();
        match report.result {
            Ok(ChartUpdateOutcome::Updated { from, to }) => println!(
                "{} {} Updated chart from {} to {}",
                style("✓").green().bold(),
                name,
                from.as_deref().unwrap_or("never"),
                style(to).green()
            ),
            Ok(ChartUpdateOutcome::UpToDate { version }) => println!(
                "{} {} Already up to date at {}",
                style("✓").green().bold(),
                name,
                version
            ),
            Err(e) => {
                println!(
                    "{} {} Failed updating due to: {}",
                    style("✗").red().bold(),
                    name,
                    e
                );
                failures.push(CliError::from(e));
            }
        }
    }

    match CliError::batch("charts", total, &failures) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
