//! fastNLP CLI - Command-line front end for the fastNLP core
//!
//! Pads ad-hoc batches, collates JSONL datasets into padded batches and
//! runs a simulated training loop against the progress callbacks.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{collate, pad, simulate};

/// fastNLP CLI - Batch padding and training-loop progress
#[derive(Parser, Debug)]
#[command(
    name = "fastnlp",
    author,
    version,
    about = "fastNLP - Batch padding and training-loop progress",
    long_about = "Pads ragged fields into rectangular arrays, collates JSONL datasets into indexed batches\nand drives a simulated training loop through the progress callbacks."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pad one batch of field values
    ///
    /// Reads a JSON array (one entry per example) and prints the padded
    /// array as JSON, together with its dtype and shape.
    Pad {
        /// The batch as JSON, e.g. '[[1, 2], [3]]'
        batch: Option<String>,

        /// Read the batch from a file instead
        #[arg(short, long, conflicts_with = "batch")]
        input: Option<PathBuf>,

        /// Padder to use (number, sequence, array); detected when omitted
        #[arg(short, long)]
        kind: Option<String>,

        /// Value used for padded positions
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        pad_value: String,

        /// Declared element type of the field
        #[arg(long)]
        ele_dtype: Option<String>,

        /// Output dtype (int64, float32, bool, ...)
        #[arg(short, long)]
        dtype: Option<String>,
    },

    /// Collate a JSONL dataset into indexed, padded batches
    ///
    /// Each line of the input is one example: a JSON object mapping field
    /// names to values. Prints one JSON line per batch.
    Collate {
        /// JSONL file with one example per line
        input: PathBuf,

        /// Configuration file with a [dataloader] section
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Examples per batch
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Shuffle the examples
        #[arg(long)]
        shuffle: bool,

        /// Shuffle seed
        #[arg(long)]
        seed: Option<u64>,

        /// Skip a trailing incomplete batch
        #[arg(long)]
        drop_last: bool,

        /// Value used for padded positions
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        pad_value: String,

        /// Fields to leave out of the batches
        #[arg(long = "ignore", value_name = "FIELD")]
        ignored: Vec<String>,
    },

    /// Run a simulated training loop with progress reporting
    ///
    /// Steps produce a decaying synthetic loss and evaluations a rising
    /// synthetic accuracy, reported under the metric `acc#acc`.
    Simulate {
        /// Configuration file with [progress] and [trainer] sections
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Batches per epoch
        #[arg(short, long, default_value = "10")]
        batches: usize,

        /// Batches between progress reports
        #[arg(long)]
        print_every: Option<usize>,

        /// Progress display (auto, rich, raw, none)
        #[arg(long)]
        progress: Option<String>,

        /// Metric to highlight when it improves
        #[arg(short, long)]
        monitor: Option<String>,

        /// Positive: evaluate every n batches. Negative: every |n| epochs. Zero: never
        #[arg(long, allow_hyphen_values = true)]
        evaluate_every: Option<i64>,

        /// Local rank of this process
        #[arg(long, default_value = "0")]
        rank: usize,

        /// Fail at this global batch number
        #[arg(long)]
        fail_at: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber =
        FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Pad { batch, input, kind, pad_value, ele_dtype, dtype } => {
            pad::execute(batch, input, kind, &pad_value, ele_dtype, dtype)?;
        }
        Command::Collate { input, config, batch_size, shuffle, seed, drop_last, pad_value, ignored } => {
            let overrides = collate::LoaderOverrides { batch_size, shuffle, seed, drop_last };
            collate::execute(&input, config.as_deref(), overrides, &pad_value, &ignored)?;
        }
        Command::Simulate {
            config,
            epochs,
            batches,
            print_every,
            progress,
            monitor,
            evaluate_every,
            rank,
            fail_at,
        } => {
            let options = simulate::SimulateOptions {
                epochs,
                batches,
                print_every,
                progress,
                monitor,
                evaluate_every,
                rank,
                fail_at,
            };
            simulate::execute(config.as_deref(), options)?;
        }
    }

    Ok(())
}
