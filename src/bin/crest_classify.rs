use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use crest_rs::{run_classifier, write_outputs, ClassifierConfig, ClassifierInputs};

/// Assign taxonomy to OTUs from their BLAST hits against a CREST reference.
#[derive(Parser, Debug)]
#[command(name = "crest-classify")]
#[command(author, version, about)]
struct Cli {
    /// OTU sequences (FASTA, optionally .gz)
    #[arg(long)]
    fasta: PathBuf,

    /// BLAST tabular (-outfmt 6) hits of the OTUs against the reference
    #[arg(long)]
    hits: PathBuf,

    /// Reference .map file (node id, name, unused, similarity cutoff)
    #[arg(long)]
    map: PathBuf,

    /// Reference .tre file (Newick)
    #[arg(long)]
    tree: PathBuf,

    /// Annotated FASTA output
    #[arg(long)]
    out_fasta: PathBuf,

    /// Taxonomy table output
    #[arg(long)]
    out_table: PathBuf,

    /// Minimum bit score for an alignment to count
    #[arg(long, default_value_t = 155.0)]
    min_score: f64,

    /// Keep hits within this fraction of the best bit score
    #[arg(long, default_value_t = 0.98)]
    top_fraction: f64,

    /// Reassign eukaryotic classifications to "No hits"
    #[arg(long)]
    euk_filter: bool,

    /// Worker threads (0 = all cores)
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

fn spinner(color: &str, msg: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&[
                "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
            ])
            .template(&format!("{{spinner:.{color}}} {{msg}}"))
            .expect("Invalid spinner template"),
    );
    spinner.set_message(msg);
    spinner
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()?;
    }

    let inputs = ClassifierInputs {
        fasta: cli.fasta,
        hits: cli.hits,
        map: cli.map,
        tree: cli.tree,
    };
    let config = ClassifierConfig {
        min_score: cli.min_score,
        top_fraction: cli.top_fraction,
        euk_filter: cli.euk_filter,
        ..ClassifierConfig::default()
    };

    // 1. Build the reference and classify
    let bar = spinner("green", "Classifying OTUs...");
    let results = run_classifier(&inputs, &config)?;
    bar.finish_with_message(format!(
        "Classified {} of {} OTUs.",
        results.classified_count(),
        results.otus.len()
    ));

    // 2. Write outputs
    let bar = spinner("yellow", "Writing output files...");
    write_outputs(&results, &cli.out_fasta, &cli.out_table)?;
    bar.finish_with_message("Output files created.");

    Ok(())
}
