use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use env_logger::Env;
use log::info;

use rustmolprep::{preprocess, CorpusPair, PreprocessConfig, SplitCorpora};

#[derive(Parser, Debug)]
#[command(author, version, about = "Binarize paired SMILES corpora", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, action = ArgAction::Count)]
    quiet: u8,

    /// JSON configuration file; replaces every other pipeline option
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long = "train_src", value_name = "PATH")]
    train_src: Option<PathBuf>,
    #[arg(long = "train_tgt", value_name = "PATH")]
    train_tgt: Option<PathBuf>,
    #[arg(long = "val_src", value_name = "PATH")]
    val_src: Option<PathBuf>,
    #[arg(long = "val_tgt", value_name = "PATH")]
    val_tgt: Option<PathBuf>,
    #[arg(long = "test_src", value_name = "PATH")]
    test_src: Option<PathBuf>,
    #[arg(long = "test_tgt", value_name = "PATH")]
    test_tgt: Option<PathBuf>,

    /// Directory for tokenized files, the vocabulary and binarized artifacts
    #[arg(long = "preprocess_output_path", value_name = "DIR")]
    preprocess_output_path: Option<PathBuf>,

    #[arg(long = "representation_start", default_value = "smiles")]
    representation_start: String,

    #[arg(long = "representation_end", default_value = "smiles")]
    representation_end: String,

    /// Tokenize the raw corpora before building the vocabulary
    #[arg(long = "do_tokenize")]
    do_tokenize: bool,

    #[arg(long = "max_src_len", default_value_t = 1024)]
    max_src_len: usize,

    #[arg(long = "max_tgt_len", default_value_t = 1024)]
    max_tgt_len: usize,

    /// `s2s` for sequence arrays only, any `g2s*` value to add graph records
    #[arg(long, default_value = "g2s_series_rel")]
    model: String,

    #[arg(long = "num_workers", default_value_t = 1)]
    num_workers: usize,

    /// Stop after the vocabulary is built
    #[arg(long = "make_vocab_only")]
    make_vocab_only: bool,

    /// Write the run report as JSON to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;
    let report = preprocess(&config).context("preprocessing failed")?;

    for step in &report.steps {
        info!(
            "{}: {} rows, {} dropped -> {}",
            step.prefix,
            step.rows,
            step.dropped.len(),
            step.sequence_artifact.display()
        );
    }
    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .with_context(|| format!("unable to write report {}", path.display()))?;
    }
    Ok(())
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn build_config(cli: &Cli) -> Result<PreprocessConfig> {
    if let Some(path) = &cli.config {
        return PreprocessConfig::from_json_file(path)
            .with_context(|| format!("unable to load config {}", path.display()));
    }

    let Some(output_dir) = &cli.preprocess_output_path else {
        bail!("--preprocess_output_path is required without --config");
    };

    let mut corpora = SplitCorpora::default();
    for (name, src, tgt, pairs) in [
        ("train", &cli.train_src, &cli.train_tgt, &mut corpora.train),
        ("val", &cli.val_src, &cli.val_tgt, &mut corpora.val),
        ("test", &cli.test_src, &cli.test_tgt, &mut corpora.test),
    ] {
        match (src, tgt) {
            (Some(src), Some(tgt)) => pairs.push(CorpusPair::new(src, tgt)),
            (None, None) => {}
            _ => bail!("--{name}_src and --{name}_tgt must be given together"),
        }
    }

    let mut config = PreprocessConfig::new(output_dir, corpora);
    config.representation_start = cli.representation_start.clone();
    config.representation_end = cli.representation_end.clone();
    config.do_tokenize = cli.do_tokenize;
    config.max_src_len = cli.max_src_len;
    config.max_tgt_len = cli.max_tgt_len;
    config.model = cli.model.clone();
    config.num_workers = cli.num_workers;
    config.make_vocab_only = cli.make_vocab_only;
    Ok(config)
}
