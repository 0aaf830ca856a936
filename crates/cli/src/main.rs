//! print-changes - watch directories and print each change batch

use anyhow::{Context, Result};
use dirwatch::{example_config, ChangeBatch, Notifier, NotifierConfig};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Read from the working directory when present
const CONFIG_FILE: &str = "dirwatch.toml";

/// Latency used when no config file is found
const DEMO_LATENCY: f64 = 0.2;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let notifier = build_notifier(Path::new(CONFIG_FILE))?;
    notifier
        .on_change(|batch| println!("{}", render_batch(&batch)))
        .context("Failed to register change handler")?;
    notifier.start().context("Failed to start watching")?;

    for dir in notifier.paths() {
        println!("{} Watching {}", "→".cyan(), dir.display().yellow());
    }
    println!("{}", "Press Ctrl-C to stop".dimmed());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    notifier.stop().context("Failed to stop watching")?;
    println!("{} Stopped", "✓".green());
    Ok(())
}

fn build_notifier(config_path: &Path) -> Result<Notifier> {
    if config_path.exists() {
        let config = NotifierConfig::load(config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
        tracing::info!("Loaded configuration from {}", config_path.display());
        return Notifier::from_config(&config).context("Invalid configuration");
    }

    println!(
        "{} No {} found, using defaults. Example:\n{}",
        "ℹ".blue(),
        config_path.display(),
        example_config().dimmed()
    );
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let dirs: Vec<PathBuf> = vec![cwd, std::env::temp_dir()];
    Notifier::new(dirs, DEMO_LATENCY).context("Failed to create notifier")
}

fn render_batch(batch: &ChangeBatch) -> String {
    let mut out = format!("{} {} changed", "●".blue(), batch.len());
    for dir in batch.clone().into_sorted_vec() {
        out.push_str(&format!("\n  {}", dir.display()));
    }
    out
}
