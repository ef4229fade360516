use std::io;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kube_resources::render::{render_json, render_text};
use kube_resources::{collect, KubeSource};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "kube-resources",
    about = "Show requested CPU and memory against allocatable capacity for every node"
)]
struct Cli {
    /// List the requests of every pod under its node
    #[arg(short, long)]
    verbose: bool,

    /// Kubeconfig context to use instead of the current one
    #[arg(long)]
    context: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Output::Text)]
    output: Output,
}

#[derive(Clone, Copy, ValueEnum)]
enum Output {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();

    let source = KubeSource::connect(cli.context)
        .await
        .context("failed to connect to the cluster")?;
    let context = source.context().map(String::from);
    let report = collect(&source, context).await?;

    let mut stdout = io::stdout().lock();
    match cli.output {
        Output::Text => render_text(&report, cli.verbose, &mut stdout)?,
        Output::Json => render_json(&report, &mut stdout)?,
    }

    Ok(())
}
