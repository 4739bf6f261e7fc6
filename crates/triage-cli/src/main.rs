use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;

mod config;
mod pipeline;

use config::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
    info!("triage v{}", env!("CARGO_PKG_VERSION"));

    // Failures are reported, never propagated: the exit status stays 0.
    match pipeline::run(&cli) {
        Ok(summary) => {
            if !summary.skipped.is_empty() {
                let skipped: Vec<&str> = summary.skipped.iter().map(|p| p.as_str()).collect();
                warn!(?skipped, "some providers produced no column");
            }
            for column in &summary.columns {
                info!(
                    column = %column.name,
                    rows = column.rows,
                    elapsed_secs = column.elapsed.as_secs_f64(),
                    "prediction column"
                );
            }
            info!(
                rows = summary.rows,
                columns = summary.columns.len(),
                path = %summary.output.display(),
                "all classifications saved"
            );
        }
        Err(error) => {
            warn!(stage = error.stage(), %error, "classification pipeline failed");
        }
    }
    Ok(())
}
