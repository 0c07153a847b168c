// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `score` and `explain`
// and all their configurable flags.
//
// clap's derive macros generate --help text, missing-argument
// errors and string → number conversion.

use clap::{Args, Subcommand};
use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the three-player rationale model on a labelled TSV file
    Train(TrainArgs),

    /// Report accuracy, anti-accuracy and sparsity of a trained model
    Score(ScoreArgs),

    /// Show the rationale the model picks for one sentence
    Explain(ExplainArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// TSV file with `sentence<TAB>label` rows
    #[arg(long, default_value = "data/train.tsv")]
    pub data: String,

    /// Directory for the tokenizer, config, metrics and best model
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Tokens per example after padding / truncation
    #[arg(long, default_value_t = 64)]
    pub max_seq_len: usize,

    /// Vocabulary cap, [PAD] and [UNK] included
    #[arg(long, default_value_t = 20_000)]
    pub max_vocab: usize,

    /// Words seen fewer times than this map to [UNK]
    #[arg(long, default_value_t = 1)]
    pub min_freq: usize,

    /// Number of classes; 0 infers it from the data
    #[arg(long, default_value_t = 0)]
    pub num_labels: usize,

    #[arg(long, default_value_t = 64)]
    pub embedding_dim: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 64)]
    pub d_model: usize,

    #[arg(long, default_value_t = 4)]
    pub num_heads: usize,

    /// Encoder blocks per player
    #[arg(long, default_value_t = 1)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 128)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Train a label-agnostic generator instead of the introspective one
    #[arg(long)]
    pub no_introspection: bool,

    /// Do not update the embedding tables
    #[arg(long)]
    pub fixed_embeddings: bool,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Classifier-only epochs before joint training
    #[arg(long, default_value_t = 1)]
    pub pretrain_epochs: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Seed for the train/validation split and batch order
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    /// Target fraction of real tokens kept in the rationale, in [0, 1]
    #[arg(long, default_value_t = 0.2)]
    pub sparsity: f32,

    /// Inputs shorter than this keep every token
    #[arg(long, default_value_t = 1)]
    pub min_rationale_len: usize,

    /// Soft-mask temperature during training
    #[arg(long, default_value_t = 0.5)]
    pub temperature: f32,

    /// Weight of the anti-classifier term
    #[arg(long, default_value_t = 1.0)]
    pub lambda_anti: f64,

    /// Weight of the sparsity penalty
    #[arg(long, default_value_t = 1.0)]
    pub lambda_sparsity: f64,

    /// Weight of the continuity penalty
    #[arg(long, default_value_t = 0.1)]
    pub lambda_continuity: f64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_path:         a.data,
            checkpoint_dir:    a.checkpoint_dir,
            max_seq_len:       a.max_seq_len,
            max_vocab:         a.max_vocab,
            min_freq:          a.min_freq,
            vocab_size:        0,
            num_labels:        a.num_labels,
            embedding_dim:     a.embedding_dim,
            d_model:           a.d_model,
            num_heads:         a.num_heads,
            num_layers:        a.num_layers,
            d_ff:              a.d_ff,
            dropout:           a.dropout,
            introspective:     !a.no_introspection,
            fixed_embeddings:  a.fixed_embeddings,
            epochs:            a.epochs,
            pretrain_epochs:   a.pretrain_epochs,
            batch_size:        a.batch_size,
            lr:                a.lr,
            seed:              a.seed,
            train_fraction:    a.train_fraction,
            sparsity:          a.sparsity,
            min_rationale_len: a.min_rationale_len,
            temperature:       a.temperature,
            lambda_anti:       a.lambda_anti,
            lambda_sparsity:   a.lambda_sparsity,
            lambda_continuity: a.lambda_continuity,
        }
    }
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Labelled TSV file to evaluate
    #[arg(long)]
    pub data: String,

    /// Directory written by `train`
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

#[derive(Args, Debug)]
pub struct ExplainArgs {
    /// The sentence to explain
    #[arg(long)]
    pub text: String,

    /// Directory written by `train`
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "introspective-rationale", "train",
            "--data", "sst2.tsv", "--sparsity", "0.3", "--no-introspection", "--lambda-anti", "2",
        ]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.data_path, "sst2.tsv");
        assert_eq!(cfg.sparsity, 0.3);
        assert!(!cfg.introspective);
        assert_eq!(cfg.lambda_anti, 2.0);
        assert_eq!(cfg.vocab_size, 0);
    }

    #[test]
    fn test_explain_requires_text() {
        assert!(Cli::try_parse_from(["introspective-rationale", "explain"]).is_err());
        let cli = Cli::try_parse_from(["introspective-rationale", "--cpu", "explain", "--text", "fine"]).unwrap();
        assert!(cli.cpu);
    }
}
