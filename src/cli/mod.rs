// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// All work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`       — fine-tune SegNet, keeping best/regular checkpoints
//   2. `ood-scatter` — partition saved uncertainty maps by domain
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, OodArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "segnet-transfer",
    version = "0.1.0",
    about = "Fine-tune a segmentation checkpoint on a new label set and analyse OOD uncertainty."
)]
pub struct Cli {
    /// The subcommand to run (train or ood-scatter)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. Routing only.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)      => run_train(args),
            Commands::OodScatter(args) => run_ood_scatter(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on samples in: {}", args.data_dir);
    let summary = TrainUseCase::new(args.into()).execute()?;

    match summary.best_epoch {
        Some(epoch) => println!(
            "Training complete. Best score {:.4} at epoch {} ({}).",
            summary.best_score,
            epoch,
            summary.best_checkpoint.as_deref().map(|p| p.display().to_string()).unwrap_or_default()
        ),
        None => println!("Training complete. No epoch improved on a score of 0."),
    }
    println!("Final checkpoint: {}", summary.checkpoint.display());
    Ok(())
}

fn run_ood_scatter(args: OodArgs) -> Result<()> {
    use crate::application::ood_use_case::OodScatterUseCase;

    let dir   = args.dir.clone();
    let parts = OodScatterUseCase::new(args.into()).execute()?;
    println!(
        "{} in-distribution and {} out-of-distribution pixels written to {}",
        parts.in_count(),
        parts.out_count(),
        dir
    );
    Ok(())
}
