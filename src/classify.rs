//src/classify.rs

use ahash::AHashSet;
use rayon::prelude::*;

use crate::hits::{HitSet, HitTable};
use crate::taxtree::Tree;
use crate::types::{Classification, Otu};

/// Why a query ended up where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Classified,
    /// No retained hits.
    NoHits,
    /// Hits named references the tree cannot resolve.
    Unresolved,
    /// Resolved into Eukaryota while the eukaryote filter is on.
    EukaryoteFiltered,
}

/// Per-outcome counters for a classification run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyStats {
    pub classified: usize,
    pub no_hits: usize,
    pub unresolved: usize,
    pub eukaryote_filtered: usize,
}

impl ClassifyStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Classified => self.classified += 1,
            Outcome::NoHits => self.no_hits += 1,
            Outcome::Unresolved => self.unresolved += 1,
            Outcome::EukaryoteFiltered => self.eukaryote_filtered += 1,
        }
    }

    fn merge(mut self, other: ClassifyStats) -> ClassifyStats {
        self.classified += other.classified;
        self.no_hits += other.no_hits;
        self.unresolved += other.unresolved;
        self.eukaryote_filtered += other.eukaryote_filtered;
        self
    }

    pub fn total(&self) -> usize {
        self.classified + self.no_hits + self.unresolved + self.eukaryote_filtered
    }
}

/// Classifies one query from its hit set.
///
/// 1. LCA of every retained reference
/// 2. climb while the weakest hit misses the node's threshold
/// 3. optionally drop eukaryotic lineages
pub fn classify_hits(tree: &Tree, hits: Option<&HitSet>, euk_filter: bool) -> (Classification, Outcome) {
    let hits = match hits {
        Some(h) if !h.is_empty() => h,
        _ => return (Classification::Unclassified, Outcome::NoHits),
    };

    let names = hits.names();
    let lca = match tree.common_ancestor(names.as_slice()) {
        Ok(Some(node)) => node,
        Ok(None) => {
            log::debug!("No LCA -- assigning to No Hits: {:?}", names);
            return (Classification::Unclassified, Outcome::NoHits);
        }
        Err(e) => {
            log::debug!("No LCA ({}) -- assigning to No Hits: {:?}", e, names);
            return (Classification::Unclassified, Outcome::Unresolved);
        }
    };

    let node = match hits.min_identity() {
        Some(weakest) => tree.climb(lca, weakest),
        None => lca,
    };

    if euk_filter && tree.is_eukaryotic(node) {
        return (Classification::Unclassified, Outcome::EukaryoteFiltered);
    }
    (Classification::ClassifiedAt(node), Outcome::Classified)
}

fn warn_unknown_queries(otus: &[Otu], hits: &HitTable) {
    let known: AHashSet<&str> = otus.iter().map(|o| o.name.as_str()).collect();
    for (query, _) in hits.iter() {
        if !known.contains(query) {
            log::warn!("Hits for '{}' have no matching input sequence; ignored", query);
        }
    }
}

/// Classifies every OTU in place, one after another.
pub fn classify_otus(otus: &mut [Otu], hits: &HitTable, tree: &Tree, euk_filter: bool) -> ClassifyStats {
    warn_unknown_queries(otus, hits);
    let mut stats = ClassifyStats::default();
    for otu in otus.iter_mut() {
        let (classification, outcome) = classify_hits(tree, hits.get(&otu.name), euk_filter);
        otu.classification = classification;
        stats.record(outcome);
    }
    stats
}

/// Parallel version of [`classify_otus`].
///
/// The tree is never written after construction, so all workers share it
/// directly; each worker only touches its own OTU.
pub fn classify_otus_parallel(
    otus: &mut [Otu],
    hits: &HitTable,
    tree: &Tree,
    euk_filter: bool,
) -> ClassifyStats {
    warn_unknown_queries(otus, hits);
    otus.par_iter_mut()
        .fold(ClassifyStats::default, |mut acc, otu| {
            let (classification, outcome) = classify_hits(tree, hits.get(&otu.name), euk_filter);
            otu.classification = classification;
            acc.record(outcome);
            acc
        })
        .reduce(ClassifyStats::default, ClassifyStats::merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxtree::tests::sample_tree;

    fn hitset(hits: &[(&str, f64)]) -> HitSet {
        let mut set = HitSet::new(0.98);
        for &(name, identity) in hits {
            set.add(name, identity, 400.0);
        }
        set
    }

    #[test]
    fn test_confident_species_call() {
        let tree = sample_tree();
        let hits = hitset(&[("Escherichia coli", 99.6)]);
        let (c, outcome) = classify_hits(&tree, Some(&hits), false);
        assert_eq!(outcome, Outcome::Classified);
        assert_eq!(c.node(), tree.resolve_name("Escherichia coli"));
    }

    #[test]
    fn test_weak_species_hit_climbs_to_genus() {
        let tree = sample_tree();
        // 97% misses the species cutoff (99) but meets the genus cutoff (94.5)
        let hits = hitset(&[("Escherichia coli", 99.8), ("Escherichia coli", 97.0)]);
        let (c, _) = classify_hits(&tree, Some(&hits), false);
        assert_eq!(c.node(), tree.resolve_name("Escherichia"));
    }

    #[test]
    fn test_accession_hits_use_their_lca() {
        let tree = sample_tree();
        let hits = hitset(&[("AB123456", 99.5), ("CP0000012", 99.5)]);
        let (c, _) = classify_hits(&tree, Some(&hits), false);
        assert_eq!(c.node(), tree.resolve_name("Escherichia"));
    }

    #[test]
    fn test_no_evidence_is_unclassified() {
        let tree = sample_tree();
        assert_eq!(
            classify_hits(&tree, None, false),
            (Classification::Unclassified, Outcome::NoHits)
        );
        let empty = HitSet::new(0.98);
        assert_eq!(
            classify_hits(&tree, Some(&empty), false),
            (Classification::Unclassified, Outcome::NoHits)
        );
        let unknown = hitset(&[("Escherichia coli", 99.0), ("Missing ref", 99.0)]);
        assert_eq!(
            classify_hits(&tree, Some(&unknown), false),
            (Classification::Unclassified, Outcome::Unresolved)
        );
    }

    #[test]
    fn test_eukaryote_filter_only_hits_eukaryotes() {
        let tree = sample_tree();
        let euk = hitset(&[("Chlamydomonas", 99.0)]);
        let (c, outcome) = classify_hits(&tree, Some(&euk), true);
        assert_eq!(c, Classification::Unclassified);
        assert_eq!(outcome, Outcome::EukaryoteFiltered);

        let (c, _) = classify_hits(&tree, Some(&euk), false);
        assert_eq!(c.node(), tree.resolve_name("Chlamydomonas"));

        let bac = hitset(&[("Salmonella enterica", 99.5)]);
        let (c, _) = classify_hits(&tree, Some(&bac), true);
        assert_eq!(c.node(), tree.resolve_name("Salmonella enterica"));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let tree = sample_tree();
        let text = "\
otu1\tEscherichia coli\t99.5\t250\t1\t0\t1\t250\t1\t250\t1e-100\t450
otu2\tX12345\t97.0\t250\t7\t0\t1\t250\t1\t250\t1e-90\t420
otu2\tAB123456\t96.0\t250\t9\t0\t1\t250\t1\t250\t1e-90\t415
otu3\tChlamydomonas\t99.0\t250\t2\t0\t1\t250\t1\t250\t1e-100\t440
ghost\tEscherichia coli\t99.0\t250\t2\t0\t1\t250\t1\t250\t1e-100\t440
";
        let hits = crate::hits::parse_blast6(text.as_bytes(), 155.0, 0.98).unwrap();
        let mut seq: Vec<Otu> = (1..=4).map(|i| Otu::new(format!("otu{i}"), "ACGT")).collect();
        let mut par = seq.clone();

        let s1 = classify_otus(&mut seq, &hits, &tree, true);
        let s2 = classify_otus_parallel(&mut par, &hits, &tree, true);
        assert_eq!(s1, s2);
        assert_eq!(
            s1,
            ClassifyStats {
                classified: 2,
                no_hits: 1,
                unresolved: 0,
                eukaryote_filtered: 1
            }
        );
        assert_eq!(s1.total(), 4);
        for (a, b) in seq.iter().zip(&par) {
            assert_eq!(a.classification, b.classification);
        }
        assert_eq!(seq[1].classification.node(), tree.resolve_name("Enterobacteriaceae"));
        assert!(!seq[3].classification.is_classified());
    }
}
