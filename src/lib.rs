//! # P&L Blueprint
//!
//! Aggregation engine for financial planning blueprints. Takes a flat, indentation-encoded
//! list of P&L line items plus the monthly adjustments planned by initiatives, and produces
//! hierarchy-aware, time-bucketed values with a render-ready tree and layout.
//!
//! ## Core Concepts
//!
//! - **Blueprint**: ordered line items. Document order defines nesting (by indent) and the
//!   scope of cumulative subtotals.
//! - **Computation modes**: `manual` lines carry their own monthly values, `children` lines sum
//!   the lines nested under them, `cumulative` lines are running subtotals of every preceding
//!   non-cumulative line.
//! - **Initiative overlay**: year-scoped deltas routed onto lines by code and pushed up through
//!   the same three rules, so "with initiatives" stays consistent with "without" at every level.
//! - **Graceful degradation**: malformed months are dropped, bad amounts count as zero, unknown
//!   line codes are ignored, and a blueprint with nothing to render yields
//!   [`EngineOutput::Unavailable`] instead of an error.
//!
//! ## Example
//!
//! ```rust
//! use pnl_blueprint::*;
//!
//! let blueprint = Blueprint::new(vec![
//!     LineItem::manual("rev", "Revenue", 0, &[("2024-01", 100.0), ("2024-02", 120.0)]),
//!     LineItem::manual("cogs", "COGS", 0, &[("2024-01", -40.0), ("2024-02", -50.0)]),
//!     LineItem::new("gm", "GrossMargin", 0, Computation::Cumulative),
//! ]);
//! let initiatives = vec![Initiative::new("pricing", "L3").with_entry(
//!     "recurring_benefits",
//!     FinancialEntry::new("Revenue", &[("2024-01", 10.0)]),
//! )];
//!
//! let output = process_blueprint(&blueprint, &initiatives, &EngineOptions::for_year(2024));
//! let analysis = output.analysis().unwrap();
//! assert_eq!(analysis.root.base_value, 130.0);
//! assert_eq!(analysis.root.total_value, 140.0);
//! ```

pub mod aggregation;
pub mod config;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod layout;
pub mod overlay;
pub mod schema;
pub mod tree;
pub mod utils;
pub mod validation;

pub use aggregation::{resolve_base_values, Aggregate, LineResolver, MonthlyRecord};
pub use config::{EngineOptions, LayoutConfig, SignConvention, StageFilter};
pub use engine::{Analysis, BlueprintEngine, EngineOutput, LineSummary, UnavailableReason};
pub use error::{BlueprintError, Result};
pub use hierarchy::Hierarchy;
pub use layout::{compute_layout, Connector, NodePosition, Point, TreeLayout};
pub use overlay::InitiativeOverlay;
pub use schema::*;
pub use tree::{build_tree, select_root, RootChoice, TreeNode};
pub use utils::*;
pub use validation::{find_issues, validate_blueprint, ValidationIssue};

use log::debug;

pub fn process_blueprint(
    blueprint: &Blueprint,
    initiatives: &[Initiative],
    options: &EngineOptions,
) -> EngineOutput {
    BlueprintEngine::new(options.clone()).analyze(blueprint, initiatives)
}

/// Parses the JSON wire shapes, validates the options and runs the engine.
/// Blueprint problems never fail here; only undecodable input or bad options do.
pub fn process_blueprint_json(
    blueprint_json: &str,
    initiatives_json: &str,
    options: &EngineOptions,
) -> Result<EngineOutput> {
    options.validate()?;

    let blueprint: Blueprint = serde_json::from_str(blueprint_json)?;
    let initiatives: Vec<Initiative> = serde_json::from_str(initiatives_json)?;
    debug!(
        "Decoded blueprint with {} lines and {} initiatives",
        blueprint.lines.len(),
        initiatives.len()
    );

    Ok(process_blueprint(&blueprint, &initiatives, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_blueprint_json_end_to_end() {
        let blueprint = r#"{
            "lines": [
                { "id": "rev", "code": "REVENUE", "nature": "revenue", "months": { "2024-01": 100, "2024-02": "120" } },
                { "id": "cogs", "code": "COGS", "nature": "cost", "months": { "2024-01": -40, "2024-02": -50, "oops": 3 } },
                { "id": "gm", "code": "GROSS_MARGIN", "computation": "cumulative" },
                { "id": "opex", "code": "OPEX", "nature": "cost", "months": { "2024-02": -10 } },
                { "id": "net", "code": "NET_PROFIT", "computation": "cumulative" }
            ]
        }"#;
        let initiatives = r#"[
            {
                "id": "pricing",
                "activeStage": "L3",
                "stages": { "L3": { "financials": {
                    "recurring_benefits": [ { "lineCode": "REVENUE", "distribution": { "2024-01": 10, "2025-01": 99 } } ],
                    "one_off_costs": [ { "lineCode": "DOES_NOT_EXIST", "distribution": { "2024-01": 5 } } ]
                } } }
            }
        ]"#;

        let output =
            process_blueprint_json(blueprint, initiatives, &EngineOptions::default()).unwrap();
        let analysis = output.analysis().unwrap();

        assert_eq!(analysis.root.line.id, "net");
        assert_eq!(analysis.root_choice, RootChoice::NetProfitHeuristic);
        assert_eq!(analysis.root.base_value, 120.0);
        assert_eq!(analysis.root.initiative_value, 10.0);
        assert_eq!(analysis.root.total_value, 130.0);
        assert_eq!(analysis.unmatched_codes["DOES_NOT_EXIST"], 1);
        assert_eq!(analysis.months.len(), 2);
    }

    #[test]
    fn test_process_blueprint_json_rejects_bad_input() {
        let result = process_blueprint_json("{ nope", "[]", &EngineOptions::default());
        assert!(matches!(result, Err(BlueprintError::SerializationError(_))));

        let mut options = EngineOptions::default();
        options.layout.column_width = -1.0;
        let result = process_blueprint_json(r#"{ "lines": [] }"#, "[]", &options);
        assert!(matches!(
            result,
            Err(BlueprintError::InvalidLayoutSetting { .. })
        ));
    }
}
