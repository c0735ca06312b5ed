//src/lca.rs

use crate::error::LcaError;
use crate::taxtree::Tree;
use crate::types::{NodeId, Rank};

/// Top-level taxon whose lineages the eukaryote filter discards.
pub const EUKARYOTA: &str = "Eukaryota";

impl Tree {
    /// Return the lowest common ancestor of the nodes registered under `names`.
    /// Duplicates are allowed and order does not matter.
    ///
    /// Returns `Ok(None)` for an empty list. Any name that cannot be resolved
    /// fails the whole lookup, so a partial LCA is never reported.
    pub fn common_ancestor<S: AsRef<str>>(&self, names: &[S]) -> Result<Option<NodeId>, LcaError> {
        let mut nodes = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let id = self
                .resolve_name(name)
                .ok_or_else(|| LcaError::Unresolved(name.to_string()))?;
            nodes.push(id);
        }
        nodes.sort_unstable();
        nodes.dedup();

        match nodes.len() {
            0 => return Ok(None),
            1 => return Ok(Some(nodes[0])),
            _ => {}
        }

        let mut paths = nodes
            .iter()
            .map(|&n| self.path(n))
            .collect::<Result<Vec<_>, _>>()?;
        // Shortest first: the LCA can be no deeper than the shallowest node.
        paths.sort_by_key(|p| p.len());

        let mut iter = paths.into_iter();
        let mut lca_path = match iter.next() {
            Some(p) => p,
            None => return Ok(None),
        };
        for path in iter {
            // Paths start at the root, so a node at depth d sits at index d.
            while path.get(lca_path.len() - 1) != lca_path.last() {
                if lca_path.len() == 1 {
                    return Ok(Some(self.root()));
                }
                lca_path.pop();
            }
        }
        Ok(lca_path.last().copied())
    }

    /// Walk `node` towards the root while the weakest supporting identity is
    /// below the node's calibrated threshold. Nodes without a threshold are
    /// accepted as they are, and the walk never passes the root.
    pub fn climb(&self, mut node: NodeId, weakest_identity: f64) -> NodeId {
        while let Some(min) = self.assignment_min(node) {
            if weakest_identity >= min || node == self.root() {
                break;
            }
            match self.parent(node) {
                Some(p) => node = p,
                None => break,
            }
        }
        node
    }

    /// Domain-level ancestor of `node` (depth 2), if `node` is that deep.
    pub fn domain_of(&self, node: NodeId) -> Option<NodeId> {
        let path = self.path(node).ok()?;
        path.get(Rank::Domain as usize).copied()
    }

    /// True when `node` lies in the Eukaryota lineage.
    pub fn is_eukaryotic(&self, node: NodeId) -> bool {
        self.domain_of(node)
            .and_then(|d| self.name(d))
            .map(|name| name == EUKARYOTA)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::LcaError;
    use crate::newick::parse_newick;
    use crate::taxtree::tests::sample_tree;
    use crate::taxtree::Tree;

    fn id(tree: &Tree, name: &str) -> usize {
        tree.resolve_name(name).unwrap()
    }

    #[test]
    fn test_single_name_is_its_own_lca() {
        let tree = sample_tree();
        let lca = tree.common_ancestor(&["Escherichia coli"]).unwrap();
        assert_eq!(lca, Some(id(&tree, "Escherichia coli")));

        // duplicates and aliases of one node collapse
        let lca = tree
            .common_ancestor(&["Escherichia albertii", "CP0000012", "Escherichia albertii"])
            .unwrap();
        assert_eq!(lca, Some(id(&tree, "Escherichia albertii")));
    }

    #[test]
    fn test_lca_of_sibling_species_is_genus() {
        let tree = sample_tree();
        let lca = tree
            .common_ancestor(&["Escherichia coli", "Escherichia albertii"])
            .unwrap();
        assert_eq!(lca, Some(id(&tree, "Escherichia")));
    }

    #[test]
    fn test_lca_across_branches_and_depths() {
        let tree = sample_tree();
        // strain-level accession vs. a species in another genus
        let lca = tree.common_ancestor(&["AB123456", "X12345"]).unwrap();
        assert_eq!(lca, Some(id(&tree, "Enterobacteriaceae")));

        // an ancestor and its descendant resolve to the ancestor
        let lca = tree.common_ancestor(&["AB123456", "Escherichia"]).unwrap();
        assert_eq!(lca, Some(id(&tree, "Escherichia")));

        let lca = tree.common_ancestor(&["Escherichia coli", "Chlamydomonas"]).unwrap();
        assert_eq!(lca, Some(id(&tree, "Main genome")));
    }

    #[test]
    fn test_lca_can_be_root() {
        let tree = Tree::build(parse_newick("(1,2)0;").unwrap(), "1\tA\t\t90\n2\tB\t\t90\n".as_bytes()).unwrap();
        assert_eq!(tree.common_ancestor(&["A", "B"]).unwrap(), Some(tree.root()));
    }

    #[test]
    fn test_lca_empty_and_unresolved() {
        let tree = sample_tree();
        let empty: [&str; 0] = [];
        assert_eq!(tree.common_ancestor(&empty).unwrap(), None);
        assert_eq!(
            tree.common_ancestor(&["Escherichia coli", "Nowhere"]),
            Err(LcaError::Unresolved("Nowhere".to_string()))
        );
    }

    #[test]
    fn test_climb_without_threshold_stays() {
        let tree = sample_tree();
        let acc = id(&tree, "AB123456");
        assert_eq!(tree.climb(acc, 0.0), acc);
    }

    #[test]
    fn test_climb_stops_at_first_satisfied_threshold() {
        let tree = sample_tree();
        let ecoli = id(&tree, "Escherichia coli");
        assert_eq!(tree.climb(ecoli, 99.5), ecoli);
        assert_eq!(tree.climb(ecoli, 99.0), ecoli);
        assert_eq!(tree.climb(ecoli, 97.0), id(&tree, "Escherichia"));
        assert_eq!(tree.climb(ecoli, 90.0), id(&tree, "Enterobacteriaceae"));
        assert_eq!(tree.climb(ecoli, 76.0), id(&tree, "Proteobacteria"));
        // Bacteria (k) has a zero threshold
        assert_eq!(tree.climb(ecoli, 50.0), id(&tree, "Bacteria (k)"));
    }

    #[test]
    fn test_climb_never_passes_root() {
        let tree = Tree::build(
            parse_newick("((2)1)0;").unwrap(),
            "0\tRoot\t\t50\n1\tA\t\t60\n2\tB\t\t70\n".as_bytes(),
        )
        .unwrap();
        let b = id(&tree, "B");
        assert_eq!(tree.climb(b, 10.0), tree.root());
        assert_eq!(tree.climb(b, -1.0), tree.root());
    }

    #[test]
    fn test_eukaryote_detection() {
        let tree = sample_tree();
        assert!(tree.is_eukaryotic(id(&tree, "Chlamydomonas")));
        assert!(tree.is_eukaryotic(id(&tree, "Eukaryota")));
        assert!(!tree.is_eukaryotic(id(&tree, "Escherichia coli")));
        assert!(!tree.is_eukaryotic(id(&tree, "Main genome")));
        assert!(!tree.is_eukaryotic(tree.root()));
    }
}
