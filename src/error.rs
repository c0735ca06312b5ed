//src/error.rs

use std::io;
use thiserror::Error;

/// Errors raised while reading the reference tree or its mapping file.
/// Any of these means the reference data is unusable.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("I/O error reading reference data: {0}")]
    Io(#[from] io::Error),

    #[error("malformed Newick at byte {offset}: {msg}")]
    Newick { offset: usize, msg: String },

    #[error("tree file contains no nodes")]
    Empty,

    #[error("node {0} is not reachable from the root through a single parent")]
    Disconnected(usize),
}

/// Failures of a single LCA lookup. These are per-query and never abort a batch.
#[derive(Debug, Error, PartialEq)]
pub enum LcaError {
    #[error("reference '{0}' is not registered in the tree")]
    Unresolved(String),

    #[error("cannot find a parent beyond node {0}")]
    BrokenPath(usize),
}

#[derive(Debug, Error)]
pub enum HitError {
    #[error("I/O error reading alignment records: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum FastaError {
    #[error("I/O error reading FASTA: {0}")]
    Io(#[from] io::Error),

    #[error("sequence data on line {0} appears before any '>' header")]
    Orphan(usize),
}

/// Top level error returned by [`crate::run_classifier`].
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Hits(#[from] HitError),

    #[error(transparent)]
    Fasta(#[from] FastaError),

    #[error("I/O error writing output: {0}")]
    Io(#[from] io::Error),
}
