//src/taxtree.rs

use std::io::{BufRead, Read};
use std::path::Path;
use std::sync::LazyLock;

use ahash::AHashMap;
use regex::RegexSet;

use crate::error::{LcaError, TreeError};
use crate::fasta::open_input;
use crate::newick::{parse_newick, NewickTree};
use crate::types::{NodeId, Rank};

/// Names that are bare GenBank/EMBL accessions rather than taxa.
static ACCESSION_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"^\D\D\d{6}$",
        r"^\D\d{5}$",
        r"^\D{4}\d{9}$",
        r"^\D{4}\d{8}$",
    ])
    .expect("accession patterns are valid")
});

pub fn is_accession(name: &str) -> bool {
    ACCESSION_PATTERNS.is_match(name)
}

/// A node of the reference taxonomy.
#[derive(Debug, Clone, Default)]
pub struct TaxNode {
    /// Raw id from the tree file.
    pub raw_id: Option<String>,
    /// Curated taxon name, or the raw id until the mapping renames it.
    pub name: Option<String>,
    /// Minimum percent identity required to assign a query here.
    pub assignment_min: Option<f64>,
    pub children: Vec<NodeId>,
}

/// Counters reported after the mapping file is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingStats {
    pub rows: usize,
    pub renamed: usize,
    pub aliases: usize,
    pub missing_nodes: usize,
    pub name_conflicts: usize,
    pub malformed: usize,
}

/// Summary of a built tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub nodes: usize,
    pub raw_ids: usize,
    pub names: usize,
    pub thresholds: usize,
    pub mapping: MappingStats,
}

/// The indexed reference taxonomy. Immutable once built: the parent and depth
/// tables are filled during construction, so shared reads need no locking.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<TaxNode>,
    parents: Vec<Option<NodeId>>,
    depths: Vec<usize>,
    by_raw_id: AHashMap<String, NodeId>,
    by_name: AHashMap<String, NodeId>,
    root: NodeId,
    mapping: MappingStats,
}

impl Tree {
    /// Loads a Newick tree file and its `.map` file (either may be gzipped).
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(
        tree_path: P,
        map_path: Q,
    ) -> Result<Self, TreeError> {
        let mut text = String::new();
        open_input(tree_path)?.read_to_string(&mut text)?;
        let newick = parse_newick(&text)?;
        let mapping = open_input(map_path)?;
        Self::build(newick, mapping)
    }

    /// Indexes a parsed tree and applies the id -> name -> cutoff mapping.
    pub fn build<R: BufRead>(newick: NewickTree, mapping: R) -> Result<Self, TreeError> {
        let mut tree = Self::index(newick)?;
        tree.mapping = tree.apply_mapping(mapping)?;
        let stats = tree.stats();
        log::info!(
            "Reference tree: {} nodes, {} raw ids, {} names, {} thresholds ({} mapping rows, {} missing, {} conflicts, {} malformed)",
            stats.nodes,
            stats.raw_ids,
            stats.names,
            stats.thresholds,
            stats.mapping.rows,
            stats.mapping.missing_nodes,
            stats.mapping.name_conflicts,
            stats.mapping.malformed
        );
        Ok(tree)
    }

    /// Converts the arena and fills parent, depth and raw id tables with one
    /// iterative walk from the root.
    fn index(newick: NewickTree) -> Result<Self, TreeError> {
        if newick.is_empty() {
            return Err(TreeError::Empty);
        }
        let root = NewickTree::ROOT;
        let declared: Vec<Option<NodeId>> = newick.nodes.iter().map(|n| n.parent).collect();
        let nodes: Vec<TaxNode> = newick
            .nodes
            .into_iter()
            .map(|n| TaxNode {
                raw_id: n.label.clone(),
                name: n.label,
                assignment_min: None,
                children: n.children,
            })
            .collect();

        let mut parents = vec![None; nodes.len()];
        let mut depths = vec![0usize; nodes.len()];
        let mut visited = vec![false; nodes.len()];
        let mut by_raw_id = AHashMap::with_capacity(nodes.len());

        let mut stack = vec![root];
        if declared[root].is_some() {
            return Err(TreeError::Disconnected(root));
        }
        visited[root] = true;
        while let Some(id) = stack.pop() {
            if let Some(raw) = &nodes[id].raw_id {
                if by_raw_id.contains_key(raw) {
                    log::warn!("Raw id '{}' appears more than once in the tree; keeping the first", raw);
                } else {
                    by_raw_id.insert(raw.clone(), id);
                }
            }
            // reversed so siblings are visited left to right
            for &child in nodes[id].children.iter().rev() {
                if child >= nodes.len() || visited[child] || declared[child] != Some(id) {
                    return Err(TreeError::Disconnected(child));
                }
                visited[child] = true;
                parents[child] = Some(id);
                depths[child] = depths[id] + 1;
                stack.push(child);
            }
        }

        if let Some(orphan) = visited.iter().position(|v| !v) {
            return Err(TreeError::Disconnected(orphan));
        }

        Ok(Self {
            nodes,
            parents,
            depths,
            by_raw_id,
            by_name: AHashMap::new(),
            root,
            mapping: MappingStats::default(),
        })
    }

    /// Applies rows of `node_id \t name \t (unused) \t similarity_cutoff`.
    ///
    /// Every resolvable row registers `name`. Rows with a non-negative cutoff whose
    /// name is not a bare accession also rename the node and set its threshold.
    fn apply_mapping<R: BufRead>(&mut self, reader: R) -> Result<MappingStats, TreeError> {
        let mut stats = MappingStats::default();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            stats.rows += 1;

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                log::warn!("Mapping line {} has {} columns, expected 4; skipped", lineno + 1, fields.len());
                stats.malformed += 1;
                continue;
            }
            let node_id = fields[0].trim();
            let name = fields[1].trim();
            let cutoff: f64 = match fields[3].trim().parse() {
                Ok(c) => c,
                Err(_) => {
                    log::warn!("Mapping line {} has invalid cutoff '{}'; skipped", lineno + 1, fields[3]);
                    stats.malformed += 1;
                    continue;
                }
            };

            let Some(&node) = self.by_raw_id.get(node_id) else {
                log::error!("Node {} ({}) not found in tree", node_id, name);
                stats.missing_nodes += 1;
                continue;
            };

            match self.by_name.get(name) {
                Some(&existing) if existing != node => {
                    log::error!("Node name '{}' is not unique - not added", name);
                    stats.name_conflicts += 1;
                    continue;
                }
                Some(_) => {}
                None => {
                    self.by_name.insert(name.to_string(), node);
                }
            }

            if cutoff >= 0.0 && !is_accession(name) {
                let n = &mut self.nodes[node];
                if n.assignment_min.is_some() {
                    log::warn!(
                        "Node {} is already named '{}'; '{}' kept as an alias",
                        node_id,
                        n.name.as_deref().unwrap_or_default(),
                        name
                    );
                    stats.aliases += 1;
                } else {
                    n.name = Some(name.to_string());
                    n.assignment_min = Some(cutoff);
                    stats.renamed += 1;
                }
            }
        }

        Ok(stats)
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            nodes: self.nodes.len(),
            raw_ids: self.by_raw_id.len(),
            names: self.by_name.len(),
            thresholds: self.nodes.iter().filter(|n| n.assignment_min.is_some()).count(),
            mapping: self.mapping,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve by reference.
    pub fn node(&self, id: NodeId) -> &TaxNode {
        &self.nodes[id]
    }

    /// Resolve by name (mapping names and accessions). Logs and returns `None` on a miss.
    pub fn resolve_name(&self, name: &str) -> Option<NodeId> {
        let found = self.by_name.get(name).copied();
        if found.is_none() {
            log::error!("Verification Error: Node '{}' not found", name);
        }
        found
    }

    pub fn lookup_raw_id(&self, raw_id: &str) -> Option<NodeId> {
        self.by_raw_id.get(raw_id).copied()
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes[id].name.as_deref()
    }

    pub fn assignment_min(&self, id: NodeId) -> Option<f64> {
        self.nodes[id].assignment_min
    }

    /// Parent of `id`; the root has none.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id]
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.depths[id]
    }

    pub fn rank(&self, id: NodeId) -> Rank {
        Rank::from_depth(self.depth(id))
    }

    /// Ancestor chain from the root down to `id`, both inclusive.
    pub fn path(&self, id: NodeId) -> Result<Vec<NodeId>, LcaError> {
        let mut path = Vec::with_capacity(self.depths[id] + 1);
        let mut cur = id;
        path.push(cur);
        while cur != self.root {
            match self.parents[cur] {
                // a chain longer than the tree means a cycle
                Some(p) if path.len() <= self.nodes.len() => {
                    path.push(p);
                    cur = p;
                }
                _ => {
                    log::error!("Cannot find parent beyond node {}", cur);
                    return Err(LcaError::BrokenPath(cur));
                }
            }
        }
        path.reverse();
        Ok(path)
    }
}
