//! Helmet CLI - chart synchronization and idempotent bundle deployment

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod exit_codes;

use commands::Context;
use commands::install::InstallFlags;
use error::Result;

#[derive(Parser)]
#[command(name = "helmet")]
#[command(author = "Helmet Contributors")]
#[command(version)]
#[command(about = "Keep third-party charts in sync and deploy compiled bundles idempotently", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.config/helmet/config.yaml)
    #[arg(long, global = true, env = "HELMET_CONFIG")]
    config: Option<PathBuf>,

    /// Namespace of the whitelist ConfigMap
    #[arg(long, global = true, env = "HELMET_WHITELIST_NAMESPACE")]
    whitelist_namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Update local charts from their remote sources
    Update {
        /// Chart manifest
        #[arg(short, long, default_value = "charts.yaml")]
        manifest: PathBuf,

        /// Directory holding the charts
        #[arg(long)]
        charts: PathBuf,

        /// Directory handed to hooks for generated types
        #[arg(long)]
        types: PathBuf,

        /// Only update charts whose name contains this string
        #[arg(long)]
        only: Option<String>,
    },

    /// Deploy compiled bundles
    Install {
        /// Compiled bundle directories
        #[arg(required = true)]
        bundles: Vec<PathBuf>,

        /// Wait until all resources are ready
        #[arg(long)]
        wait: bool,

        /// Roll back a failed release
        #[arg(long)]
        atomic: bool,

        /// Delete new resources created by a failed upgrade
        #[arg(long)]
        cleanup_on_fail: bool,

        /// Force resource updates through replacement
        #[arg(long)]
        force: bool,

        /// Create the release namespace if missing
        #[arg(long)]
        create_namespace: bool,

        /// Time to wait for each Helm operation (e.g. 5m0s)
        #[arg(long)]
        timeout: Option<String>,

        /// Deploy every sub-release even if its digest is unchanged
        #[arg(long)]
        ignore_purity: bool,

        /// Pass --debug to helm
        #[arg(long)]
        helm_debug: bool,
    },

    /// Uninstall a bundle's releases
    Uninstall {
        /// Compiled bundle directory
        bundle: PathBuf,
    },

    /// Add a bundle's release to the whitelist
    Whitelist {
        /// Compiled bundle directory
        bundle: PathBuf,
    },

    /// Remove a bundle's release from the whitelist
    Blacklist {
        /// Compiled bundle directory
        bundle: PathBuf,
    },

    /// Fail unless a bundle's release is whitelisted
    EnsureWhitelisted {
        /// Compiled bundle directory
        bundle: PathBuf,
    },

    /// Print the canonical digest of a directory
    Digest {
        /// Directory to hash
        dir: PathBuf,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug { "helmet=debug" } else { "helmet=info" };
    let filter = EnvFilter::try_from_env("HELMET_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let context = || Context::load(cli.config.as_deref(), cli.whitelist_namespace.clone());

    match cli.command {
        Commands::Update {
            ref manifest,
            ref charts,
            ref types,
            ref only,
        } => commands::update::run(manifest, charts, types, only.as_deref()).await,

        Commands::Install {
            ref bundles,
            wait,
            atomic,
            cleanup_on_fail,
            force,
            create_namespace,
            ref timeout,
            ignore_purity,
            helm_debug,
        } => {
            let flags = InstallFlags {
                wait,
                atomic,
                cleanup_on_fail,
                force,
                create_namespace,
                timeout: timeout.clone(),
                ignore_purity,
                helm_debug,
            };
            commands::install::run(&context()?, bundles, flags).await
        }

        Commands::Uninstall { ref bundle } => commands::uninstall::run(&context()?, bundle).await,

        Commands::Whitelist { ref bundle } => commands::whitelist::add(&context()?, bundle).await,

        Commands::Blacklist { ref bundle } => {
            commands::whitelist::remove(&context()?, bundle).await
        }

        Commands::EnsureWhitelisted { ref bundle } => {
            commands::whitelist::ensure(&context()?, bundle).await
        }

        Commands::Digest { ref dir } => commands::digest::run(dir),
    }
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let code = match run(cli).await {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{:?}", miette::Report::new(e));
            code
        }
    };

    std::process::exit(code);
}
