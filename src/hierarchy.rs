//! Reconstructs the line tree from document order.
//!
//! Two structural cues are combined: indentation (a line nests under the nearest preceding
//! line with a smaller indent) and cumulative successors (a subtotal line closes off every
//! line since the previous subtotal). A flat statement with no indentation therefore still
//! forms a tree purely from the position of its cumulative lines.

use crate::schema::LineItem;
use std::collections::BTreeMap;

/// Parents, children and roots are built together and stay read-only so they always agree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
    index_by_id: BTreeMap<String, usize>,
}

impl Hierarchy {
    pub fn build(lines: &[LineItem]) -> Self {
        let indent_parents = indentation_parents(lines);
        let successors = cumulative_successors(lines);

        let mut parents: Vec<Option<usize>> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                if line.is_cumulative() {
                    successors[i].or(indent_parents[i])
                } else {
                    indent_parents[i].or(successors[i])
                }
            })
            .collect();
        break_cycles(&mut parents);

        let mut children = vec![Vec::new(); lines.len()];
        let mut roots = Vec::new();
        for (i, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[*p].push(i),
                None => roots.push(i),
            }
        }

        let mut index_by_id = BTreeMap::new();
        for (i, line) in lines.iter().enumerate() {
            index_by_id.entry(line.id.clone()).or_insert(i);
        }

        Self {
            parents,
            children,
            roots,
            index_by_id,
        }
    }

    /// Final parent of each line, by document index.
    pub fn parents(&self) -> &[Option<usize>] {
        &self.parents
    }

    /// Lines without a parent, in document order.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    pub fn children_of(&self, index: usize) -> &[usize] {
        self.children.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_root(&self, index: usize) -> bool {
        index < self.len() && self.parents[index].is_none()
    }

    /// Parent id for every line id (`None` for roots).
    pub fn parent_ids(&self, lines: &[LineItem]) -> BTreeMap<String, Option<String>> {
        let mut map = BTreeMap::new();
        for (i, line) in lines.iter().enumerate() {
            let parent = self.parent_of(i).map(|p| lines[p].id.clone());
            map.entry(line.id.clone()).or_insert(parent);
        }
        map
    }

    /// Distance from the line's root, following final parents.
    pub fn depth_of(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut current = self.parent_of(index);
        while let Some(p) = current {
            depth += 1;
            current = self.parent_of(p);
        }
        depth
    }
}

/// Nearest preceding line with a strictly smaller indent.
pub fn indentation_parents(lines: &[LineItem]) -> Vec<Option<usize>> {
    let mut stack: Vec<(usize, u32)> = Vec::new();
    let mut parents = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        while let Some(&(_, indent)) = stack.last() {
            if indent >= line.indent {
                stack.pop();
            } else {
                break;
            }
        }
        parents.push(stack.last().map(|&(idx, _)| idx));
        stack.push((i, line.indent));
    }

    parents
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Unseen,
    OnPath,
    Done,
}

/// Any parent chain that loops back on itself is cut at its earliest member, which becomes a
/// root. Each line is walked once.
fn break_cycles(parents: &mut [Option<usize>]) {
    let mut state = vec![Visit::Unseen; parents.len()];
    let mut path = Vec::new();

    for start in 0..parents.len() {
        if state[start] != Visit::Unseen {
            continue;
        }

        let mut current = Some(start);
        while let Some(node) = current {
            match state[node] {
                Visit::Done => break,
                Visit::OnPath => {
                    let loop_start = path.iter().position(|&member| member == node).unwrap_or(0);
                    if let Some(&earliest) = path[loop_start..].iter().min() {
                        log::debug!("Breaking parent cycle at line index {}", earliest);
                        parents[earliest] = None;
                    }
                    break;
                }
                Visit::Unseen => {
                    state[node] = Visit::OnPath;
                    path.push(node);
                    current = parents[node];
                }
            }
        }

        for node in path.drain(..) {
            state[node] = Visit::Done;
        }
    }
}

/// Nearest cumulative line strictly after each line.
pub fn cumulative_successors(lines: &[LineItem]) -> Vec<Option<usize>> {
    let mut successors = vec![None; lines.len()];
    let mut next_cumulative = None;

    for (i, line) in lines.iter().enumerate().rev() {
        successors[i] = next_cumulative;
        if line.is_cumulative() {
            next_cumulative = Some(i);
        }
    }

    successors
}
