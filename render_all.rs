/// Explain every prediction dump in a directory
/// Usage: cargo run --bin render_all --release -- <DIR>
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tsvis::pipeline::{self, InterpretRequest};
use tsvis::VisConfig;

fn main() -> Result<()> {
    let dir = match std::env::args().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => bail!("usage: render_all <DIR>"),
    };

    let config = VisConfig::from_env().context("reading TSVIS_* environment")?;
    let dumps = pipeline::find_prediction_dumps(&dir)
        .with_context(|| format!("listing {}", dir.display()))?;

    println!("📁 Found {} prediction dumps in {}", dumps.len(), dir.display());
    println!();

    let mut failed = 0;
    for (seed, pred_id) in dumps {
        let request = InterpretRequest::new(&dir, seed, pred_id);
        match pipeline::explain_prediction(&request, &config) {
            Ok(outcome) => println!(
                "✅ pred{}-{}: class {} ({}/{} trees)",
                seed,
                pred_id,
                outcome.report.predicted_class,
                outcome.report.votes_for_class,
                outcome.report.total_trees
            ),
            Err(e) => {
                failed += 1;
                eprintln!("⚠️  Warning: pred{}-{} skipped: {}", seed, pred_id, e);
            }
        }
    }

    println!();
    if failed > 0 {
        bail!("{} dumps could not be explained", failed);
    }
    println!("✅ All figures generated successfully!");
    Ok(())
}
