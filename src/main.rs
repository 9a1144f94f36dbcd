use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tsvis::cli::{Cli, Command};
use tsvis::pipeline;
use tsvis::VisConfig;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug || std::env::var_os("RUST_LOG").is_some() {
        let filter = if debug {
            EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
        } else {
            EnvFilter::from_default_env()
        };
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let env_config = VisConfig::from_env().context("reading TSVIS_* environment")?;

    match cli.command {
        Command::Interp(args) => {
            let config = args.figure.apply(env_config);
            let request = args.request();
            println!("🔍 Explaining prediction: {}", request.dump_path().display());

            let outcome = pipeline::explain_prediction(&request, &config)
                .with_context(|| format!("explaining {}", request.dump_path().display()))?;

            println!(
                "✅ Class {} explained by {} attributes:",
                outcome.report.predicted_class,
                outcome.report.selections.len()
            );
            for selection in &outcome.report.selections {
                println!(
                    "  - {} (peak {} at t={}): interval {}..{}, {} {:.4}",
                    selection.name,
                    selection.peak_count,
                    selection.peak_time,
                    selection.node.interval_start,
                    selection.node.interval_end,
                    selection.node.comparison.symbol(),
                    selection.node.threshold
                );
            }
        }
        Command::Curves(args) => {
            let config = args.apply(env_config);
            let request = args.request();
            println!("🔍 Drawing importance curves: {}", request.dump_path().display());

            pipeline::render_importance_curves(&request, &config)
                .with_context(|| format!("drawing {}", request.dump_path().display()))?;
        }
        Command::Tde(args) => {
            let config = args.apply(env_config);
            let request = args.request();
            println!("🔍 Drawing dictionary figures: {}", request.dump_path().display());

            let figures = pipeline::render_dictionary_figures(&request, &config)
                .with_context(|| format!("drawing {}", request.dump_path().display()))?;
            println!(
                "✅ Wrote {} and {}",
                figures.histograms.display(),
                figures.transform.display()
            );
        }
    }

    Ok(())
}
