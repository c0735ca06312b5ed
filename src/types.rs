//src/types.rs

use std::fmt;

/// Index of a node in the tree arena.
pub type NodeId = usize;

/// Taxonomic ranks, indexed by depth below the root.
/// CREST reference trees keep these depths fixed, so rank is depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Root = 0,
    Meta,
    Domain,
    Superkingdom,
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
    Strain,
}

impl Rank {
    const BY_DEPTH: [Rank; 12] = [
        Rank::Root,
        Rank::Meta,
        Rank::Domain,
        Rank::Superkingdom,
        Rank::Kingdom,
        Rank::Phylum,
        Rank::Class,
        Rank::Order,
        Rank::Family,
        Rank::Genus,
        Rank::Species,
        Rank::Strain,
    ];

    /// Rank for a node at `depth` edges from the root. Anything deeper than
    /// strain is still a strain.
    pub fn from_depth(depth: usize) -> Rank {
        Self::BY_DEPTH[depth.min(Rank::Strain as usize)]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Root => "root",
            Rank::Meta => "meta",
            Rank::Domain => "domain",
            Rank::Superkingdom => "superkingdom",
            Rank::Kingdom => "kingdom",
            Rank::Phylum => "phylum",
            Rank::Class => "class",
            Rank::Order => "order",
            Rank::Family => "family",
            Rank::Genus => "genus",
            Rank::Species => "species",
            Rank::Strain => "strain",
        }
    }

    /// Slot letter used in rendered taxonomy strings, if this rank has one.
    /// Superkingdom and kingdom are folded into the domain slot, so they get none.
    pub fn abbreviation(&self) -> Option<char> {
        match self {
            Rank::Domain => Some('k'),
            Rank::Phylum => Some('p'),
            Rank::Class => Some('c'),
            Rank::Order => Some('o'),
            Rank::Family => Some('f'),
            Rank::Genus => Some('g'),
            Rank::Species => Some('s'),
            _ => None,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Classification {
    /// No usable evidence ("No hits").
    #[default]
    Unclassified,
    ClassifiedAt(NodeId),
}

impl Classification {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Classification::Unclassified => None,
            Classification::ClassifiedAt(id) => Some(*id),
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, Classification::ClassifiedAt(_))
    }
}

/// A query sequence (OTU) and its classification.
#[derive(Debug, Clone)]
pub struct Otu {
    pub name: String,
    pub sequence: String,
    pub classification: Classification,
}

impl Otu {
    pub fn new(name: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: sequence.into(),
            classification: Classification::Unclassified,
        }
    }
}
