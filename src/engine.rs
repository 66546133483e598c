use crate::aggregation::{resolve_base_values, MonthlyRecord};
use crate::config::EngineOptions;
use crate::hierarchy::Hierarchy;
use crate::layout::{compute_layout, TreeLayout};
use crate::overlay::InitiativeOverlay;
use crate::schema::{Blueprint, Initiative};
use crate::tree::{build_tree, select_root, RootChoice, TreeNode};
use crate::utils::{build_month_index, years_in_index, MonthDescriptor};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum UnavailableReason {
    EmptyBlueprint,
    NoMonthData,
    NoRootLine,
}

/// One row of the analysed statement, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineSummary {
    pub id: String,
    pub code: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub depth: usize,
    pub monthly: MonthlyRecord,
    pub yearly: BTreeMap<i32, f64>,
    /// Base total for the analysed year.
    pub base_value: f64,
    pub direct_effect: f64,
    pub initiative_value: f64,
    pub total_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub year: i32,
    pub months: Vec<MonthDescriptor>,
    pub root_choice: RootChoice,
    pub root: TreeNode,
    pub layout: TreeLayout,
    pub lines: Vec<LineSummary>,
    /// Initiative line codes that matched nothing, with occurrence counts.
    pub unmatched_codes: BTreeMap<String, usize>,
}

impl Analysis {
    pub fn line(&self, id: &str) -> Option<&LineSummary> {
        self.lines.iter().find(|line| line.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum EngineOutput {
    Available(Box<Analysis>),
    Unavailable { reason: UnavailableReason },
}

impl EngineOutput {
    pub fn is_available(&self) -> bool {
        matches!(self, EngineOutput::Available(_))
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        match self {
            EngineOutput::Available(analysis) => Some(analysis),
            EngineOutput::Unavailable { .. } => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<UnavailableReason> {
        match self {
            EngineOutput::Available(_) => None,
            EngineOutput::Unavailable { reason } => Some(*reason),
        }
    }
}

/// Runs the whole pipeline: month index, hierarchy, base values, initiative overlay, tree,
/// layout. Stateless; every call is a fresh pass over its inputs.
#[derive(Debug, Clone, Default)]
pub struct BlueprintEngine {
    options: EngineOptions,
}

impl BlueprintEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn analyze(&self, blueprint: &Blueprint, initiatives: &[Initiative]) -> EngineOutput {
        if blueprint.is_empty() {
            debug!("Blueprint has no lines");
            return unavailable(UnavailableReason::EmptyBlueprint);
        }

        let months = build_month_index(&blueprint.lines);
        let latest_year = match years_in_index(&months).last() {
            Some(&latest) => latest,
            None => {
                debug!("Blueprint records no parseable months");
                return unavailable(UnavailableReason::NoMonthData);
            }
        };
        let year = self.options.year.unwrap_or(latest_year);

        info!(
            "Analysing blueprint of {} lines against {} initiatives for {}",
            blueprint.lines.len(),
            initiatives.len(),
            year
        );

        let hierarchy = Hierarchy::build(&blueprint.lines);
        debug!(
            "Hierarchy has {} root(s) over {} month(s)",
            hierarchy.roots().len(),
            months.len()
        );

        let (root, root_choice) = match select_root(blueprint, &hierarchy) {
            Some(found) => found,
            None => return unavailable(UnavailableReason::NoRootLine),
        };

        let base_values = resolve_base_values(&blueprint.lines, &hierarchy, &months);
        let overlay = InitiativeOverlay::build(
            blueprint,
            &hierarchy,
            initiatives,
            year,
            &self.options.stage_filter,
            self.options.sign_convention,
        );
        if !overlay.unmatched_codes.is_empty() {
            debug!(
                "{} initiative line code(s) matched no blueprint line",
                overlay.unmatched_codes.len()
            );
        }

        let tree = build_tree(blueprint, &hierarchy, &base_values, &overlay, root, year);
        let layout = compute_layout(&tree, &self.options.layout);
        let lines = summarize_lines(blueprint, &hierarchy, &base_values, &overlay, year);

        info!(
            "Rendered '{}' as root ({:?}): base {:.2}, initiatives {:.2}",
            tree.line.id, root_choice, tree.base_value, tree.initiative_value
        );

        EngineOutput::Available(Box::new(Analysis {
            year,
            months,
            root_choice,
            root: tree,
            layout,
            lines,
            unmatched_codes: overlay.unmatched_codes,
        }))
    }
}

fn unavailable(reason: UnavailableReason) -> EngineOutput {
    EngineOutput::Unavailable { reason }
}

fn summarize_lines(
    blueprint: &Blueprint,
    hierarchy: &Hierarchy,
    base_values: &[MonthlyRecord],
    overlay: &InitiativeOverlay,
    year: i32,
) -> Vec<LineSummary> {
    blueprint
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let monthly = base_values[i].clone();
            let base_value = monthly.total_for_year(year);
            let initiative_value = overlay.effect_at(i);

            LineSummary {
                id: line.id.clone(),
                code: line.code.clone(),
                name: line.name.clone(),
                parent_id: hierarchy
                    .parent_of(i)
                    .map(|p| blueprint.lines[p].id.clone()),
                depth: hierarchy.depth_of(i),
                yearly: monthly.totals_by_year(),
                monthly,
                base_value,
                direct_effect: overlay.direct[i],
                initiative_value,
                total_value: base_value + initiative_value,
            }
        })
        .collect()
}
