//! Install command - deploy compiled bundles

use console::style;
use helmet_kube::{
    DeploymentExecutor, DeploymentPlan, DeploymentPlanner, HelmOptions, SubReleaseState,
    deploy_bundles,
};
use std::path::PathBuf;

use super::Context;
use crate::error::{CliError, Result};

/// Flags of the install command
#[derive(Debug, Clone, Default)]
pub struct InstallFlags {
    pub wait: bool,
    pub atomic: bool,
    pub cleanup_on_fail: bool,
    pub force: bool,
    pub create_namespace: bool,
    pub timeout: Option<String>,
    pub ignore_purity: bool,
    pub helm_debug: bool,
}

pub async fn run(ctx: &Context, bundles: &[PathBuf], flags: InstallFlags) -> Result<()> {
    let cluster = ctx.connect().await?;

    let options = HelmOptions {
        wait: flags.wait,
        atomic: flags.atomic,
        cleanup_on_fail: flags.cleanup_on_fail,
        force: flags.force,
        create_namespace: flags.create_namespace,
        timeout: flags.timeout,
        debug: flags.helm_debug,
        history_max: ctx.config.history_max,
    };

    let planner = DeploymentPlanner::new(cluster.store.clone()).ignore_purity(flags.ignore_purity);
    let executor = DeploymentExecutor::new(cluster.deployer.clone(), cluster.store.clone(), options);

    let reports = deploy_bundles(&cluster.gate, &planner, &executor, bundles).await?;

    let mut failures = Vec::new();
    for report in reports {
        match report.result {
            Ok(plan) => print_plan(&plan),
            Err(e) => {
                println!(
                    "{} {} {}",
                    style("✗").red().bold(),
                    style(report.bundle.display()).cyan(),
                    e
                );
                failures.push(CliError::from(e));
            }
        }
    }

    match CliError::batch("bundles", bundles.len(), &failures) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn print_plan(plan: &DeploymentPlan) {
    if plan.sub_releases.iter().all(|s| s.state == SubReleaseState::Skip) {
        println!(
            "{} {} is up to date",
            style("✓").green().bold(),
            style(&plan.name).cyan()
        );
        return;
    }

    for sub in &plan.sub_releases {
        match sub.state {
            SubReleaseState::Installed => println!(
                "{} {} deployed",
                style("✓").green().bold(),
                style(&sub.release_name).cyan()
            ),
            SubReleaseState::Skip => println!(
                "{} {} unchanged",
                style("-").dim(),
                style(&sub.release_name).dim()
            ),
            SubReleaseState::Install | SubReleaseState::RolledBack => {}
        }
    }
}
