//src/taxonomy.rs

use std::fmt::Write;

use crate::taxtree::Tree;
use crate::types::{Classification, Rank};

/// Placeholder for ranks the classification does not reach.
pub const UNKNOWN: &str = "?";

/// Slot letters in output order.
pub const SLOTS: [char; 7] = ['k', 'p', 'c', 'o', 'f', 'g', 's'];

/// A fixed seven-rank taxonomy (`k, p, c, o, f, g, s`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyRecord {
    names: [String; 7],
}

impl Default for TaxonomyRecord {
    fn default() -> Self {
        Self {
            names: std::array::from_fn(|_| UNKNOWN.to_string()),
        }
    }
}

impl TaxonomyRecord {
    fn slot_index(abb: char) -> Option<usize> {
        SLOTS.iter().position(|&s| s == abb)
    }

    pub fn get(&self, abb: char) -> Option<&str> {
        Self::slot_index(abb).map(|i| self.names[i].as_str())
    }

    fn set(&mut self, abb: char, name: &str) {
        if let Some(i) = Self::slot_index(abb) {
            self.names[i] = name.replace(' ', "_");
        }
    }

    /// `(slot, name)` pairs in output order.
    pub fn entries(&self) -> impl Iterator<Item = (char, &str)> {
        SLOTS.iter().copied().zip(self.names.iter().map(String::as_str))
    }

    pub fn is_unknown(&self) -> bool {
        self.names.iter().all(|n| n == UNKNOWN)
    }

    fn join(&self, sep: char) -> String {
        let mut out = String::new();
        for (i, (abb, name)) in self.entries().enumerate() {
            if i > 0 {
                out.push(sep);
            }
            let _ = write!(out, "{}__{}", abb, name);
        }
        out
    }

    /// Form used in FASTA headers: `k__X,p__Y,...`
    pub fn fasta_string(&self) -> String {
        self.join(',')
    }

    /// Form used in the tab-separated table: `k__X;p__Y;...`
    pub fn table_string(&self) -> String {
        self.join(';')
    }
}

impl Tree {
    /// Renders a classification into the seven fixed slots.
    ///
    /// Superkingdom and kingdom depths never get their own slot; the domain
    /// ancestor fills `k`. Ranks the lineage does not reach stay unknown.
    pub fn taxonomy(&self, classification: Classification) -> TaxonomyRecord {
        let mut record = TaxonomyRecord::default();
        let Some(node) = classification.node() else {
            return record;
        };
        let path = match self.path(node) {
            Ok(p) => p,
            Err(e) => {
                log::error!("Cannot render taxonomy for node {}: {}", node, e);
                return record;
            }
        };
        for clade in path {
            let rank = self.rank(clade);
            if rank <= Rank::Meta || rank >= Rank::Strain {
                continue;
            }
            if let (Some(abb), Some(name)) = (rank.abbreviation(), self.name(clade)) {
                record.set(abb, name);
            }
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxtree::tests::sample_tree;

    #[test]
    fn test_unclassified_renders_unknown() {
        let tree = sample_tree();
        let record = tree.taxonomy(Classification::Unclassified);
        assert!(record.is_unknown());
        assert_eq!(record.fasta_string(), "k__?,p__?,c__?,o__?,f__?,g__?,s__?");
    }

    #[test]
    fn test_species_renders_full_lineage() {
        let tree = sample_tree();
        let ecoli = tree.resolve_name("Escherichia coli").unwrap();
        let record = tree.taxonomy(Classification::ClassifiedAt(ecoli));
        assert_eq!(
            record.fasta_string(),
            "k__Bacteria,p__Proteobacteria,c__Gammaproteobacteria,o__Enterobacterales,\
             f__Enterobacteriaceae,g__Escherichia,s__Escherichia_coli"
        );
        assert_eq!(
            record.table_string(),
            "k__Bacteria;p__Proteobacteria;c__Gammaproteobacteria;o__Enterobacterales;\
             f__Enterobacteriaceae;g__Escherichia;s__Escherichia_coli"
        );
    }

    #[test]
    fn test_kingdom_depths_fold_into_domain_slot() {
        let tree = sample_tree();
        let k = tree.resolve_name("Bacteria (k)").unwrap();
        let record = tree.taxonomy(Classification::ClassifiedAt(k));
        assert_eq!(record.get('k'), Some("Bacteria"));
        assert_eq!(record.entries().filter(|(_, n)| *n != UNKNOWN).count(), 1);
    }

    #[test]
    fn test_strain_and_shallow_nodes() {
        let tree = sample_tree();
        // the strain-level leaf renders down to its species
        let strain = tree.resolve_name("AB123456").unwrap();
        let record = tree.taxonomy(Classification::ClassifiedAt(strain));
        assert_eq!(record.get('s'), Some("Escherichia_coli"));

        let meta = tree.resolve_name("Main genome").unwrap();
        assert!(tree.taxonomy(Classification::ClassifiedAt(meta)).is_unknown());

        let genus = tree.resolve_name("Salmonella").unwrap();
        let record = tree.taxonomy(Classification::ClassifiedAt(genus));
        assert_eq!(record.get('g'), Some("Salmonella"));
        assert_eq!(record.get('s'), Some(UNKNOWN));
    }
}
