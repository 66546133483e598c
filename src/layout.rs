//! Two-dimensional placement of a [`TreeNode`] tree: one column per depth, one row slot per
//! leaf, parents centred on their children, orthogonal connectors between them.

use crate::config::LayoutConfig;
use crate::tree::TreeNode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePosition {
    pub line_id: String,
    pub depth: usize,
    /// Top-left corner.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NodePosition {
    pub fn right_anchor(&self) -> Point {
        Point {
            x: self.x + self.width,
            y: self.y + self.height / 2.0,
        }
    }

    pub fn left_anchor(&self) -> Point {
        Point {
            x: self.x,
            y: self.y + self.height / 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub from_id: String,
    pub to_id: String,
    /// Horizontal, vertical, horizontal: four points.
    pub points: Vec<Point>,
}

impl Connector {
    fn between(parent: &NodePosition, child: &NodePosition) -> Self {
        let start = parent.right_anchor();
        let end = child.left_anchor();
        let mid_x = (start.x + end.x) / 2.0;

        Self {
            from_id: parent.line_id.clone(),
            to_id: child.line_id.clone(),
            points: vec![
                start,
                Point { x: mid_x, y: start.y },
                Point { x: mid_x, y: end.y },
                end,
            ],
        }
    }

    /// SVG path data, e.g. `M 220 32 H 260 V 120 H 300`.
    pub fn svg_path(&self) -> String {
        match self.points.as_slice() {
            [start, bend, turn, end] => format!(
                "M {} {} H {} V {} H {}",
                start.x, start.y, bend.x, turn.y, end.x
            ),
            points => {
                let mut path = String::new();
                for (i, point) in points.iter().enumerate() {
                    let command = if i == 0 { "M" } else { "L" };
                    if !path.is_empty() {
                        path.push(' ');
                    }
                    path.push_str(&format!("{} {} {}", command, point.x, point.y));
                }
                path
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreeLayout {
    /// Pre-order, matching a walk of the tree.
    pub positions: Vec<NodePosition>,
    pub connectors: Vec<Connector>,
    pub width: f64,
    pub height: f64,
}

impl TreeLayout {
    pub fn position_of(&self, line_id: &str) -> Option<&NodePosition> {
        self.positions.iter().find(|p| p.line_id == line_id)
    }
}

struct LayoutBuilder<'a> {
    config: &'a LayoutConfig,
    next_slot: usize,
    max_depth: usize,
    positions: Vec<NodePosition>,
    connectors: Vec<Connector>,
}

impl<'a> LayoutBuilder<'a> {
    /// Places `node` and its subtree; returns the index of `node` in `positions`.
    /// Recursion depth equals tree depth.
    fn place(&mut self, node: &TreeNode, depth: usize) -> usize {
        self.max_depth = self.max_depth.max(depth);

        let own = self.positions.len();
        self.positions.push(NodePosition {
            line_id: node.line.id.clone(),
            depth,
            x: self.config.padding + depth as f64 * self.config.column_pitch(),
            y: 0.0,
            width: self.config.column_width,
            height: self.config.node_height,
        });

        let child_indices: Vec<usize> = node
            .children
            .iter()
            .map(|child| self.place(child, depth + 1))
            .collect();

        self.positions[own].y = if child_indices.is_empty() {
            let slot = self.next_slot;
            self.next_slot += 1;
            self.config.padding + slot as f64 * self.config.row_pitch()
        } else {
            let sum: f64 = child_indices.iter().map(|&i| self.positions[i].y).sum();
            sum / child_indices.len() as f64
        };

        for child in child_indices {
            let connector = Connector::between(&self.positions[own], &self.positions[child]);
            self.connectors.push(connector);
        }

        own
    }
}

pub fn compute_layout(root: &TreeNode, config: &LayoutConfig) -> TreeLayout {
    let mut builder = LayoutBuilder {
        config,
        next_slot: 0,
        max_depth: 0,
        positions: Vec::with_capacity(root.node_count()),
        connectors: Vec::new(),
    };
    builder.place(root, 0);

    let columns = builder.max_depth + 1;
    let leaves = builder.next_slot.max(1);
    let width = 2.0 * config.padding
        + columns as f64 * config.column_width
        + (columns - 1) as f64 * config.column_gap;
    let height = 2.0 * config.padding
        + leaves as f64 * config.node_height
        + (leaves - 1) as f64 * config.row_gap;

    TreeLayout {
        positions: builder.positions,
        connectors: builder.connectors,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Computation, LineItem};

    fn node(id: &str, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            line: LineItem::new(id, id, 0, Computation::Manual),
            children,
            base_value: 0.0,
            initiative_value: 0.0,
            total_value: 0.0,
        }
    }

    fn plain_config() -> LayoutConfig {
        LayoutConfig {
            column_width: 100.0,
            column_gap: 50.0,
            node_height: 40.0,
            row_gap: 20.0,
            padding: 0.0,
        }
    }

    #[test]
    fn test_leaves_stack_and_parents_centre() {
        // net -> [gm -> [rev, cogs], opex]
        let tree = node(
            "net",
            vec![node("gm", vec![node("rev", vec![]), node("cogs", vec![])]), node("opex", vec![])],
        );

        let layout = compute_layout(&tree, &plain_config());
        let ids: Vec<&str> = layout.positions.iter().map(|p| p.line_id.as_str()).collect();
        assert_eq!(ids, vec!["net", "gm", "rev", "cogs", "opex"]);

        let rev = layout.position_of("rev").unwrap();
        let cogs = layout.position_of("cogs").unwrap();
        let opex = layout.position_of("opex").unwrap();
        let gm = layout.position_of("gm").unwrap();
        let net = layout.position_of("net").unwrap();

        assert_eq!(rev.y, 0.0);
        assert_eq!(cogs.y, 60.0);
        assert_eq!(opex.y, 120.0);
        assert_eq!(gm.y, 30.0);
        assert_eq!(net.y, 75.0);

        assert_eq!(net.x, 0.0);
        assert_eq!(gm.x, 150.0);
        assert_eq!(rev.x, 300.0);
        assert_eq!(opex.x, 150.0);

        assert_eq!(layout.width, 400.0);
        assert_eq!(layout.height, 160.0);
    }

    #[test]
    fn test_connectors_are_orthogonal() {
        let tree = node("gm", vec![node("rev", vec![]), node("cogs", vec![])]);
        let layout = compute_layout(&tree, &plain_config());

        assert_eq!(layout.connectors.len(), 2);
        let to_cogs = layout
            .connectors
            .iter()
            .find(|c| c.to_id == "cogs")
            .unwrap();
        assert_eq!(to_cogs.from_id, "gm");
        assert_eq!(
            to_cogs.points,
            vec![
                Point { x: 100.0, y: 50.0 },
                Point { x: 125.0, y: 50.0 },
                Point { x: 125.0, y: 80.0 },
                Point { x: 150.0, y: 80.0 },
            ]
        );
        assert_eq!(to_cogs.svg_path(), "M 100 50 H 125 V 80 H 150");

        for connector in &layout.connectors {
            for pair in connector.points.windows(2) {
                assert!(pair[0].x == pair[1].x || pair[0].y == pair[1].y);
            }
        }
    }

    #[test]
    fn test_single_node_layout() {
        let config = LayoutConfig::default();
        let layout = compute_layout(&node("net", vec![]), &config);

        assert_eq!(layout.positions.len(), 1);
        assert!(layout.connectors.is_empty());
        assert_eq!(layout.positions[0].x, config.padding);
        assert_eq!(layout.positions[0].y, config.padding);
        assert_eq!(layout.width, 2.0 * config.padding + config.column_width);
        assert_eq!(layout.height, 2.0 * config.padding + config.node_height);
    }
}
