//src/hits.rs

use std::io::BufRead;
use std::path::Path;

use ahash::AHashMap;

use crate::error::HitError;
use crate::fasta::open_input;

/// Column order of BLAST tabular output (`-outfmt 6`).
pub const BLAST6_COLUMNS: [&str; 12] = [
    "qseqid", "sseqid", "pident", "length", "mismatch", "gapopen", "qstart", "qend", "sstart",
    "send", "evalue", "bitscore",
];

const QSEQID: usize = 0;
const SSEQID: usize = 1;
const PIDENT: usize = 2;
const BITSCORE: usize = 11;

/// A single retained alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub reference: String,
    pub identity: f64,
    pub bitscore: f64,
}

/// Hits of one query whose bit score is within `top_fraction` of the best seen.
#[derive(Debug, Clone)]
pub struct HitSet {
    top_fraction: f64,
    best: Option<f64>,
    hits: Vec<Hit>,
}

impl HitSet {
    pub fn new(top_fraction: f64) -> Self {
        Self {
            top_fraction,
            best: None,
            hits: Vec::new(),
        }
    }

    /// Adds a hit. A new best score evicts earlier hits that fall below the
    /// raised floor and is always kept itself. Returns false if the hit is
    /// below the floor.
    pub fn add(&mut self, reference: &str, identity: f64, bitscore: f64) -> bool {
        if self.best.map_or(true, |best| bitscore > best) {
            self.best = Some(bitscore);
            let floor = self.floor();
            self.hits.retain(|h| h.bitscore >= floor);
        } else if bitscore < self.floor() {
            return false;
        }
        self.hits.push(Hit {
            reference: reference.to_string(),
            identity,
            bitscore,
        });
        true
    }

    /// Lowest score still retained: `top_fraction` of the best, measured so
    /// the floor never rises above the best score even when it is negative.
    fn floor(&self) -> f64 {
        self.best
            .map_or(f64::NEG_INFINITY, |best| best - best.abs() * (1.0 - self.top_fraction))
    }

    pub fn best_bitscore(&self) -> Option<f64> {
        self.best
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Reference ids of the retained hits, in insertion order, duplicates kept.
    pub fn names(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.reference.as_str()).collect()
    }

    /// Retained identities sorted from highest to lowest, so the last one is
    /// the weakest hit.
    pub fn percent_ids(&self) -> Vec<f64> {
        let mut ids: Vec<f64> = self.hits.iter().map(|h| h.identity).collect();
        ids.sort_by(|a, b| b.total_cmp(a));
        ids
    }

    /// Identity of the weakest retained hit.
    pub fn min_identity(&self) -> Option<f64> {
        self.hits.iter().map(|h| h.identity).min_by(|a, b| a.total_cmp(b))
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Per-query hit sets, kept in the order queries first appear.
#[derive(Debug, Clone, Default)]
pub struct HitTable {
    queries: Vec<(String, HitSet)>,
    index: AHashMap<String, usize>,
}

impl HitTable {
    pub fn get(&self, query: &str) -> Option<&HitSet> {
        self.index.get(query).map(|&i| &self.queries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HitSet)> {
        self.queries.iter().map(|(q, h)| (q.as_str(), h))
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    fn entry(&mut self, query: &str, top_fraction: f64) -> &mut HitSet {
        let i = match self.index.get(query) {
            Some(&i) => i,
            None => {
                self.queries.push((query.to_string(), HitSet::new(top_fraction)));
                self.index.insert(query.to_string(), self.queries.len() - 1);
                self.queries.len() - 1
            }
        };
        &mut self.queries[i].1
    }
}

/// Reads a BLAST tabular file (plain or `.gz`).
pub fn read_blast6<P: AsRef<Path>>(
    path: P,
    min_score: f64,
    top_fraction: f64,
) -> Result<HitTable, HitError> {
    let reader = open_input(path)?;
    parse_blast6(reader, min_score, top_fraction)
}

/// Parses BLAST tabular records, drops those scoring below `min_score`, and
/// groups the rest per query into top-fraction [`HitSet`]s.
///
/// Lines are streamed, so the whole file is never held in memory.
pub fn parse_blast6<R: BufRead>(
    reader: R,
    min_score: f64,
    top_fraction: f64,
) -> Result<HitTable, HitError> {
    let mut table = HitTable::default();
    let mut below_min = 0usize;
    let mut skipped = 0usize;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < BLAST6_COLUMNS.len() {
            log::warn!(
                "Alignment line {} has {} columns, expected {}; skipped",
                lineno + 1,
                fields.len(),
                BLAST6_COLUMNS.len()
            );
            skipped += 1;
            continue;
        }

        let (identity, bitscore) = match (
            fields[PIDENT].trim().parse::<f64>(),
            fields[BITSCORE].trim().parse::<f64>(),
        ) {
            (Ok(i), Ok(b)) if i.is_finite() && b.is_finite() => (i, b),
            _ => {
                log::warn!("Alignment line {} has a non-numeric identity or bit score; skipped", lineno + 1);
                skipped += 1;
                continue;
            }
        };

        if bitscore < min_score {
            below_min += 1;
            continue;
        }
        table
            .entry(fields[QSEQID], top_fraction)
            .add(fields[SSEQID], identity, bitscore);
    }

    log::info!(
        "Parsed hits for {} queries ({} records below bit score {}, {} malformed)",
        table.len(),
        below_min,
        min_score,
        skipped
    );
    Ok(table)
}
