//src/newick.rs

use crate::error::TreeError;

/// One node as it appears in the Newick text.
#[derive(Debug, Clone, Default)]
pub struct NewickNode {
    /// Raw label (CREST trees use numeric ids), `None` for unlabeled nodes.
    pub label: Option<String>,
    /// Enclosing clade; checked against `children` when the tree is indexed.
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// A parsed Newick tree in arena form. The root is always index 0.
#[derive(Debug, Clone)]
pub struct NewickTree {
    pub nodes: Vec<NewickNode>,
}

impl NewickTree {
    pub const ROOT: usize = 0;

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn newick_err(offset: usize, msg: impl Into<String>) -> TreeError {
    TreeError::Newick {
        offset,
        msg: msg.into(),
    }
}

#[inline]
fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b',' | b':' | b';' | b'[') || b.is_ascii_whitespace()
}

/// Appends a node under the innermost open clade (or as the root).
fn new_node(nodes: &mut Vec<NewickNode>, stack: &[usize], at: usize) -> Result<usize, TreeError> {
    let parent = stack.last().copied();
    if parent.is_none() && !nodes.is_empty() {
        return Err(newick_err(at, "more than one root clade"));
    }
    let id = nodes.len();
    nodes.push(NewickNode {
        parent,
        ..NewickNode::default()
    });
    if let Some(p) = parent {
        nodes[p].children.push(id);
    }
    Ok(id)
}

/// Parses a rooted Newick tree.
///
/// Supports nested clades, labels on leaves and internal nodes, single-quoted
/// labels (`''` is an escaped quote), `:length` suffixes and `[...]` comments.
/// Parsing uses an explicit stack of open clades, so very deep trees are fine.
pub fn parse_newick(text: &str) -> Result<NewickTree, TreeError> {
    let bytes = text.as_bytes();
    let mut nodes: Vec<NewickNode> = Vec::new();
    // Open clades, innermost last.
    let mut stack: Vec<usize> = Vec::new();
    // Node that the next label / length belongs to.
    let mut last: Option<usize> = None;
    // True right after '(' or ',' where a (possibly empty) child is expected.
    let mut expect_node = true;
    let mut finished = false;

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if finished {
            if !b.is_ascii_whitespace() {
                return Err(newick_err(i, "unexpected content after ';'"));
            }
            i += 1;
            continue;
        }
        match b {
            b'(' => {
                if !expect_node {
                    return Err(newick_err(i, "'(' must start a new child"));
                }
                let id = new_node(&mut nodes, &stack, i)?;
                stack.push(id);
                last = None;
                i += 1;
            }
            b',' | b')' => {
                if stack.is_empty() {
                    return Err(newick_err(i, format!("'{}' outside of any clade", b as char)));
                }
                if expect_node {
                    // empty leaf, e.g. "(,A)"
                    new_node(&mut nodes, &stack, i)?;
                }
                if b == b')' {
                    last = stack.pop();
                    expect_node = false;
                } else {
                    last = None;
                    expect_node = true;
                }
                i += 1;
            }
            b':' => {
                // lengths are validated but not kept
                match last {
                    Some(_) => {}
                    None if expect_node => {
                        last = Some(new_node(&mut nodes, &stack, i)?);
                        expect_node = false;
                    }
                    None => return Err(newick_err(i, "branch length without a node")),
                }
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && !is_delimiter(bytes[end]) {
                    end += 1;
                }
                let raw = &text[start..end];
                raw.parse::<f64>()
                    .map_err(|_| newick_err(start, format!("invalid branch length '{raw}'")))?;
                i = end;
            }
            b'[' => {
                match bytes[i..].iter().position(|&c| c == b']') {
                    Some(close) => i += close + 1,
                    None => return Err(newick_err(i, "unterminated comment")),
                }
            }
            b';' => {
                if !stack.is_empty() {
                    return Err(newick_err(i, "unbalanced parentheses"));
                }
                finished = true;
                i += 1;
            }
            b if b.is_ascii_whitespace() => {
                i += 1;
            }
            _ => {
                let (label, next) = if b == b'\'' {
                    read_quoted(text, i)?
                } else {
                    let mut end = i;
                    while end < bytes.len() && !is_delimiter(bytes[end]) {
                        end += 1;
                    }
                    (text[i..end].to_string(), end)
                };

                let target = if expect_node {
                    let id = new_node(&mut nodes, &stack, i)?;
                    expect_node = false;
                    id
                } else {
                    match last {
                        Some(id) if nodes[id].label.is_none() => id,
                        _ => return Err(newick_err(i, format!("unexpected label '{label}'"))),
                    }
                };
                nodes[target].label = Some(label);
                last = Some(target);
                i = next;
            }
        }
    }

    if !stack.is_empty() {
        return Err(newick_err(bytes.len(), "unbalanced parentheses"));
    }
    if nodes.is_empty() {
        return Err(TreeError::Empty);
    }

    Ok(NewickTree { nodes })
}

/// Reads a single-quoted label starting at `start`; returns the label and the
/// offset just past the closing quote.
fn read_quoted(text: &str, start: usize) -> Result<(String, usize), TreeError> {
    let bytes = text.as_bytes();
    let mut label = String::new();
    let mut i = start + 1;
    let mut seg_start = i;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            label.push_str(&text[seg_start..i]);
            if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                label.push('\'');
                i += 2;
                seg_start = i;
                continue;
            }
            return Ok((label, i + 1));
        }
        i += 1;
    }
    Err(newick_err(start, "unterminated quoted label"))
}
