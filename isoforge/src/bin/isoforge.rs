//! isoforge command line.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use isoforge::hook::ShellHook;
use isoforge::logging::{default_log_dir, init_logging};
use isoforge::{Builder, RawConfig, TracingUi};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "isoforge", version, about = "Build VMware VM images from installation ISOs")]
struct Cli {
    /// Directory for rotated log files (defaults to the per-user data directory)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a build from a JSON template
    Build {
        /// Path to the JSON template
        template: PathBuf,

        /// Seed for port selection, for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Shell command to run in the guest before shutdown (repeatable)
        #[arg(long = "provision")]
        provision: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_dir = cli.log_dir.unwrap_or_else(default_log_dir);
    let _guard = init_logging(Some(log_dir.as_path()));

    match cli.command {
        Commands::Build {
            template,
            seed,
            provision,
        } => build(template, seed, provision).await,
    }
}

async fn build(template: PathBuf, seed: Option<u64>, provision: Vec<String>) -> anyhow::Result<()> {
    let json = tokio::fs::read_to_string(&template)
        .await
        .with_context(|| format!("reading template {}", template.display()))?;
    let raw = RawConfig::from_json(&json)?;

    let mut builder = Builder::prepare(raw).await?;
    if let Some(seed) = seed {
        builder = builder.with_seed(seed);
    }
    let builder = Arc::new(builder);

    let on_interrupt = Arc::clone(&builder);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling build");
            on_interrupt.cancel();
        }
    });

    let hook = Arc::new(ShellHook::new(provision));
    match builder.run(Arc::new(TracingUi), hook).await? {
        Some(artifact) => {
            tracing::info!(builder_id = artifact.builder_id(), files = artifact.files().len(), "Build finished");
            println!("{}", artifact);
            Ok(())
        }
        None if builder.signals().is_cancelled() => bail!("build cancelled"),
        None => bail!("build failed"),
    }
}
