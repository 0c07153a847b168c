// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses command line arguments with clap and hands the work
// to Layer 2 (application). Three commands are supported:
//
//   1. `train`   — fits the model on a labelled TSV file
//   2. `score`   — held-out metrics of the saved best model
//   3. `explain` — rationale for one sentence
//
// The GPU (wgpu) backend is the default; --cpu switches to ndarray.
// During `train`, the first Ctrl-C stops after the current batch and
// still saves the model; a second one exits immediately.

pub mod commands;

use anyhow::{Context, Result};
use burn::backend::{
    ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu,
};
use clap::Parser;
use commands::{Commands, ExplainArgs, ScoreArgs, TrainArgs};
use signal_hook::consts::SIGINT;

use crate::application::{
    explain_use_case::ExplainUseCase,
    score_use_case::ScoreUseCase,
    train_use_case::TrainUseCase,
};
use crate::domain::traits::LocalExplainer;
use crate::ml::trainer::CancelFlag;

#[derive(Parser, Debug)]
#[command(
    name = "introspective-rationale",
    version = "0.1.0",
    about = "Train a three-player introspective rationale classifier, then score it or explain sentences."
)]
pub struct Cli {
    /// Run on the CPU (ndarray) backend instead of wgpu
    #[arg(long, global = true)]
    pub cpu: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. This layer only routes and prints.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args, self.cpu),
            Commands::Score(args)   => run_score(args, self.cpu),
            Commands::Explain(args) => run_explain(args, self.cpu),
        }
    }
}

fn run_train(args: TrainArgs, cpu: bool) -> Result<()> {
    tracing::info!("Starting training on: {}", args.data);
    let use_case = TrainUseCase::new(args.into());
    stop_on_interrupt(&use_case.cancel_flag())?;

    let summary = if cpu {
        use_case.execute::<Autodiff<NdArray>>(NdArrayDevice::default())?
    } else {
        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        use_case.execute::<Autodiff<Wgpu>>(device)?
    };

    match (summary.best_epoch, summary.best_accuracy) {
        (Some(epoch), Some(acc)) => println!(
            "Training complete after {} epochs. Best model: epoch {} ({:.1}% val accuracy).",
            summary.epochs_run, epoch, acc * 100.0
        ),
        _ => println!("Training stopped before any epoch was evaluated."),
    }
    if summary.cancelled {
        println!("(cancelled)");
    }
    Ok(())
}

fn stop_on_interrupt(cancel: &CancelFlag) -> Result<()> {
    // Registered first, so it only fires once the flag is already set
    signal_hook::flag::register_conditional_shutdown(SIGINT, 130, cancel.shared())
        .context("Cannot install Ctrl-C handler")?;
    signal_hook::flag::register(SIGINT, cancel.shared())
        .context("Cannot install Ctrl-C handler")?;
    Ok(())
}

fn run_score(args: ScoreArgs, cpu: bool) -> Result<()> {
    let metrics = if cpu {
        ScoreUseCase::<NdArray>::new(&args.checkpoint_dir, NdArrayDevice::default())?.score(&args.data)?
    } else {
        ScoreUseCase::<Wgpu>::new(&args.checkpoint_dir, WgpuDevice::default())?.score(&args.data)?
    };

    println!("examples:      {}", metrics.examples());
    println!("accuracy:      {:.4}", metrics.accuracy());
    println!("anti-accuracy: {:.4}", metrics.anti_accuracy());
    println!("sparsity:      {:.4}", metrics.sparsity());
    println!("mean loss:     {:.4}", metrics.mean_loss());
    Ok(())
}

fn run_explain(args: ExplainArgs, cpu: bool) -> Result<()> {
    let explanation = if cpu {
        ExplainUseCase::<NdArray>::new(&args.checkpoint_dir, NdArrayDevice::default())?
            .explain_local(&args.text)?
    } else {
        ExplainUseCase::<Wgpu>::new(&args.checkpoint_dir, WgpuDevice::default())?
            .explain_local(&args.text)?
    };

    println!("\n{}\n", explanation.highlighted());
    println!("rationale:       {}", explanation.rationale().join(" "));
    println!("predicted label: {}", explanation.predicted_label);
    println!("rationale probs: {:?}", explanation.rationale_probs);
    println!("full-input probs: {:?}", explanation.full_probs);
    println!("complement probs: {:?}", explanation.anti_probs);
    println!();
    for t in &explanation.tokens {
        println!("{} {:>8.3}  {}", if t.selected { '*' } else { ' ' }, t.score, t.token);
    }
    Ok(())
}
