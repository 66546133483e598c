use crate::aggregation::MonthlyRecord;
use crate::hierarchy::Hierarchy;
use crate::overlay::InitiativeOverlay;
use crate::schema::{Blueprint, LineItem};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub line: LineItem,
    pub children: Vec<TreeNode>,
    /// Year total of the line's own blueprint values.
    pub base_value: f64,
    /// Year total of the initiative effect landing on or propagated into the line.
    pub initiative_value: f64,
    pub total_value: f64,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, itself included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }

    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.line.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Pre-order walk.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TreeNode, usize)) {
        self.walk_at(0, visit);
    }

    fn walk_at<'a>(&'a self, depth: usize, visit: &mut impl FnMut(&'a TreeNode, usize)) {
        visit(self, depth);
        for child in &self.children {
            child.walk_at(depth + 1, visit);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RootChoice {
    /// Named by the blueprint's `rootLineId`.
    Designated,
    /// Cumulative root whose code contains "NET".
    NetProfitHeuristic,
    FirstRoot,
}

/// Picks the line to render as the tree root.
pub fn select_root(blueprint: &Blueprint, hierarchy: &Hierarchy) -> Option<(usize, RootChoice)> {
    if let Some(root_id) = &blueprint.root_line_id {
        match hierarchy.index_of(root_id) {
            Some(index) => return Some((index, RootChoice::Designated)),
            None => debug!(
                "Designated root '{}' not found, falling back to heuristic",
                root_id
            ),
        }
    }

    let net_root = hierarchy.roots().iter().copied().find(|&index| {
        let line = &blueprint.lines[index];
        line.is_cumulative() && line.code.to_uppercase().contains("NET")
    });
    if let Some(index) = net_root {
        return Some((index, RootChoice::NetProfitHeuristic));
    }

    hierarchy
        .roots()
        .first()
        .map(|&index| (index, RootChoice::FirstRoot))
}

/// Assembles the render tree below `root` with year totals for `year`. Recurses once per level.
pub fn build_tree(
    blueprint: &Blueprint,
    hierarchy: &Hierarchy,
    base_values: &[MonthlyRecord],
    overlay: &InitiativeOverlay,
    root: usize,
    year: i32,
) -> TreeNode {
    let base_value = base_values
        .get(root)
        .map(|record| record.total_for_year(year))
        .unwrap_or(0.0);
    let initiative_value = overlay.effect_at(root);

    let children = hierarchy
        .children_of(root)
        .iter()
        .map(|&child| build_tree(blueprint, hierarchy, base_values, overlay, child, year))
        .collect();

    TreeNode {
        line: blueprint.lines[root].clone(),
        children,
        base_value,
        initiative_value,
        total_value: base_value + initiative_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::resolve_base_values;
    use crate::config::{SignConvention, StageFilter};
    use crate::schema::{Computation, FinancialEntry, Initiative};
    use crate::utils::build_month_index;
    use rstest::rstest;

    fn statement() -> Blueprint {
        Blueprint::new(vec![
            LineItem::manual("rev", "REV", 0, &[("2024-01", 10.0)]),
            LineItem::manual("cogs", "COGS", 0, &[("2024-01", -4.0)]),
            LineItem::new("gm", "GROSS_MARGIN", 0, Computation::Cumulative),
            LineItem::manual("opex", "OPEX", 0, &[("2024-01", -1.0)]),
            LineItem::new("net", "NET_PROFIT", 0, Computation::Cumulative),
        ])
    }

    #[test]
    fn test_net_profit_preferred_over_gross_margin() {
        let blueprint = Blueprint::new(vec![
            LineItem::new("gm", "GROSS_MARGIN", 0, Computation::Cumulative)
                .with_name("Gross Margin"),
            LineItem::manual("memo", "MEMO", 1, &[]),
            LineItem::new("net", "net_profit", 0, Computation::Cumulative).with_name("Net Profit"),
        ]);
        let hierarchy = Hierarchy::build(&blueprint.lines);
        assert_eq!(hierarchy.roots(), &[2]);

        let (root, choice) = select_root(&blueprint, &hierarchy).unwrap();
        assert_eq!(blueprint.lines[root].name, "Net Profit");
        assert_eq!(choice, RootChoice::NetProfitHeuristic);
    }

    #[test]
    fn test_cycle_cut_root_is_first_root() {
        // "net" is the last subtotal and nested under "group", so "group" becomes the root
        let blueprint = Blueprint::new(vec![
            LineItem::new("group", "GROUP", 0, Computation::Children),
            LineItem::new("net", "NET_PROFIT", 1, Computation::Cumulative),
        ]);
        let hierarchy = Hierarchy::build(&blueprint.lines);

        let (root, choice) = select_root(&blueprint, &hierarchy).unwrap();
        assert_eq!(root, 0);
        assert_eq!(choice, RootChoice::FirstRoot);
    }

    #[test]
    fn test_first_root_when_no_net_line() {
        let blueprint = Blueprint::new(vec![
            LineItem::manual("a", "A", 0, &[]),
            LineItem::new("gm", "GM", 0, Computation::Cumulative),
            LineItem::manual("memo", "MEMO", 0, &[]),
        ]);
        let hierarchy = Hierarchy::build(&blueprint.lines);
        assert_eq!(hierarchy.roots(), &[1, 2]);

        let (root, choice) = select_root(&blueprint, &hierarchy).unwrap();
        assert_eq!(root, 1);
        assert_eq!(choice, RootChoice::FirstRoot);
    }

    #[test]
    fn test_net_heuristic_requires_cumulative_root() {
        let blueprint = Blueprint::new(vec![
            LineItem::manual("first", "FIRST", 0, &[]),
            LineItem::manual("net_sales", "NET_SALES", 0, &[]),
        ]);
        let hierarchy = Hierarchy::build(&blueprint.lines);

        let (root, choice) = select_root(&blueprint, &hierarchy).unwrap();
        assert_eq!(root, 0);
        assert_eq!(choice, RootChoice::FirstRoot);
    }

    #[test]
    fn test_no_roots_means_no_tree() {
        let blueprint = Blueprint::default();
        let hierarchy = Hierarchy::build(&blueprint.lines);
        assert!(select_root(&blueprint, &hierarchy).is_none());
    }

    #[rstest]
    #[case(Some("gm"), 2, RootChoice::Designated)]
    #[case(Some("missing"), 4, RootChoice::NetProfitHeuristic)]
    #[case(None, 4, RootChoice::NetProfitHeuristic)]
    fn test_designated_root(
        #[case] root_line_id: Option<&str>,
        #[case] expected: usize,
        #[case] expected_choice: RootChoice,
    ) {
        let mut blueprint = statement();
        blueprint.root_line_id = root_line_id.map(str::to_string);
        let hierarchy = Hierarchy::build(&blueprint.lines);

        let (root, choice) = select_root(&blueprint, &hierarchy).unwrap();
        assert_eq!(root, expected);
        assert_eq!(choice, expected_choice);
    }

    #[test]
    fn test_tree_values_and_shape() {
        let blueprint = Blueprint::new(vec![
            LineItem::manual("rev", "Revenue", 0, &[("2024-01", 100.0), ("2024-02", 120.0)]),
            LineItem::manual("cogs", "COGS", 0, &[("2024-01", -40.0), ("2024-02", -50.0)]),
            LineItem::new("gm", "GrossMargin", 0, Computation::Cumulative),
        ]);
        let initiatives = vec![Initiative::new("i1", "L3").with_entry(
            "recurring_benefits",
            FinancialEntry::new("Revenue", &[("2024-01", 10.0)]),
        )];

        let index = build_month_index(&blueprint.lines);
        let hierarchy = Hierarchy::build(&blueprint.lines);
        let base = resolve_base_values(&blueprint.lines, &hierarchy, &index);
        let overlay = InitiativeOverlay::build(
            &blueprint,
            &hierarchy,
            &initiatives,
            2024,
            &StageFilter::All,
            SignConvention::AsRecorded,
        );

        let (root, _) = select_root(&blueprint, &hierarchy).unwrap();
        let tree = build_tree(&blueprint, &hierarchy, &base, &overlay, root, 2024);

        assert_eq!(tree.line.id, "gm");
        assert_eq!(tree.base_value, 130.0);
        assert_eq!(tree.initiative_value, 10.0);
        assert_eq!(tree.total_value, 140.0);
        assert_eq!(tree.node_count(), 3);

        let revenue = tree.find("rev").unwrap();
        assert!(revenue.is_leaf());
        assert_eq!(revenue.base_value, 220.0);
        assert_eq!(revenue.total_value, 230.0);

        let mut visited = Vec::new();
        tree.walk(&mut |node, depth| visited.push((node.line.id.clone(), depth)));
        assert_eq!(
            visited,
            vec![
                ("gm".to_string(), 0),
                ("rev".to_string(), 1),
                ("cogs".to_string(), 1)
            ]
        );
    }
}
