// src/lib.rs
pub mod classify;
pub mod error;
pub mod fasta;
pub mod hits;
pub mod lca;
pub mod newick;
pub mod taxonomy;
pub mod taxtree;
pub mod types;

use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};

use crate::classify::{classify_otus, classify_otus_parallel, ClassifyStats};
use crate::error::ClassifyError;
use crate::fasta::{format_fasta_record, read_fasta_otus};
use crate::hits::read_blast6;
use crate::taxonomy::TaxonomyRecord;
use crate::taxtree::Tree;
use crate::types::Otu;

/// Tunable classification options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    /// Alignment records below this bit score are discarded.
    pub min_score: f64,
    /// Keep hits scoring at least this fraction of the query's best bit score.
    pub top_fraction: f64,
    /// Reassign eukaryotic calls to "No hits".
    pub euk_filter: bool,
    /// Classify OTUs on the rayon thread pool.
    pub parallel: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_score: 155.0,
            top_fraction: 0.98,
            euk_filter: false,
            parallel: true,
        }
    }
}

/// Input files for one run.
#[derive(Debug, Clone)]
pub struct ClassifierInputs {
    pub fasta: PathBuf,
    pub hits: PathBuf,
    pub map: PathBuf,
    pub tree: PathBuf,
}

/// Classified OTUs plus the tree needed to render them.
/// Output text is generated on demand.
pub struct ClassificationResults {
    pub otus: Vec<Otu>,
    pub tree: Tree,
    pub stats: ClassifyStats,
}

impl ClassificationResults {
    pub fn taxonomy_of(&self, otu: &Otu) -> TaxonomyRecord {
        self.tree.taxonomy(otu.classification)
    }

    /// FASTA with `;tax=k__..,p__..,...` appended to each header, in input order.
    pub fn get_fasta_output(&self) -> String {
        let mut output = String::new();
        for otu in &self.otus {
            let header = format!("{};tax={}", otu.name, self.taxonomy_of(otu).fasta_string());
            let _ = writeln!(output, "{}", format_fasta_record(&header, &otu.sequence));
        }
        output
    }

    /// `name \t k__..;p__..;...` per OTU, in input order.
    pub fn get_table_output(&self) -> String {
        let mut output = String::new();
        for otu in &self.otus {
            let _ = writeln!(output, "{}\t{}", otu.name, self.taxonomy_of(otu).table_string());
        }
        output
    }

    pub fn classified_count(&self) -> usize {
        self.otus.iter().filter(|o| o.classification.is_classified()).count()
    }
}

/// Classifies already-loaded OTUs against `tree` using the hits in `hits_path`.
pub fn classify_with_tree(
    mut otus: Vec<Otu>,
    tree: Tree,
    hits_path: &Path,
    config: &ClassifierConfig,
) -> Result<ClassificationResults, ClassifyError> {
    let hits = read_blast6(hits_path, config.min_score, config.top_fraction)?;

    let stats = if config.parallel {
        classify_otus_parallel(&mut otus, &hits, &tree, config.euk_filter)
    } else {
        classify_otus(&mut otus, &hits, &tree, config.euk_filter)
    };
    log::info!(
        "Classified {} of {} OTUs ({} without hits, {} unresolved, {} eukaryotic filtered)",
        stats.classified,
        stats.total(),
        stats.no_hits,
        stats.unresolved,
        stats.eukaryote_filtered
    );

    Ok(ClassificationResults { otus, tree, stats })
}

/// Reads the sequences, builds the reference tree and classifies every OTU.
pub fn run_classifier(
    inputs: &ClassifierInputs,
    config: &ClassifierConfig,
) -> Result<ClassificationResults, ClassifyError> {
    log::info!("Reading the input fasta ({})", inputs.fasta.display());
    let otus = read_fasta_otus(&inputs.fasta)?;

    log::info!("Parsing the map and tree inputs");
    let tree = Tree::from_files(&inputs.tree, &inputs.map)?;

    log::info!("Classifying BLAST hits");
    classify_with_tree(otus, tree, &inputs.hits, config)
}

/// Writes the annotated FASTA and the taxonomy table.
pub fn write_outputs(
    results: &ClassificationResults,
    out_fasta: &Path,
    out_table: &Path,
) -> Result<(), ClassifyError> {
    fs::write(out_fasta, results.get_fasta_output())?;
    fs::write(out_table, results.get_table_output())?;
    Ok(())
}
