use crate::aggregation::LineResolver;
use crate::config::{SignConvention, StageFilter};
use crate::hierarchy::Hierarchy;
use crate::schema::{Blueprint, FinancialEntry, Initiative, LineNature};
use crate::utils::key_in_year;
use log::debug;
use std::collections::BTreeMap;

/// Year-scoped initiative effect per line, by document index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitiativeOverlay {
    pub year: i32,
    /// Amounts routed straight onto each line by initiative entries.
    pub direct: Vec<f64>,
    /// Direct effects pushed up through the same aggregation rules as the base values.
    pub propagated: Vec<f64>,
    /// Codes referenced by entries that match no line, with how often each was seen.
    pub unmatched_codes: BTreeMap<String, usize>,
}

impl InitiativeOverlay {
    pub fn build(
        blueprint: &Blueprint,
        hierarchy: &Hierarchy,
        initiatives: &[Initiative],
        year: i32,
        stage_filter: &StageFilter,
        sign_convention: SignConvention,
    ) -> Self {
        let (direct, unmatched_codes) =
            direct_effects(blueprint, initiatives, year, stage_filter, sign_convention);
        let propagated = propagate_effects(blueprint, hierarchy, &direct);

        Self {
            year,
            direct,
            propagated,
            unmatched_codes,
        }
    }

    pub fn effect_at(&self, index: usize) -> f64 {
        self.propagated.get(index).copied().unwrap_or(0.0)
    }

    pub fn direct_by_id(&self, blueprint: &Blueprint) -> BTreeMap<String, f64> {
        by_id(blueprint, &self.direct)
    }

    pub fn propagated_by_id(&self, blueprint: &Blueprint) -> BTreeMap<String, f64> {
        by_id(blueprint, &self.propagated)
    }
}

fn by_id(blueprint: &Blueprint, values: &[f64]) -> BTreeMap<String, f64> {
    let mut map = BTreeMap::new();
    for (line, value) in blueprint.lines.iter().zip(values) {
        map.entry(line.id.clone()).or_insert(*value);
    }
    map
}

/// Sum of an entry's distribution over the months of `year`.
pub fn entry_total_for_year(entry: &FinancialEntry, year: i32) -> f64 {
    entry
        .distribution
        .iter()
        .filter(|(key, _)| key_in_year(key, year))
        .map(|(_, amount)| if amount.is_finite() { *amount } else { 0.0 })
        .sum()
}

/// Accumulates each accepted initiative's active-stage entries onto the lines they target.
/// Entries naming an unknown code are skipped and reported back.
pub fn direct_effects(
    blueprint: &Blueprint,
    initiatives: &[Initiative],
    year: i32,
    stage_filter: &StageFilter,
    sign_convention: SignConvention,
) -> (Vec<f64>, BTreeMap<String, usize>) {
    let mut direct = vec![0.0; blueprint.lines.len()];
    let mut unmatched: BTreeMap<String, usize> = BTreeMap::new();

    for initiative in initiatives {
        if !stage_filter.accepts(&initiative.active_stage) {
            debug!(
                "Skipping initiative '{}' in stage '{}'",
                initiative.id, initiative.active_stage
            );
            continue;
        }

        for entry in initiative.active_entries() {
            let total = entry_total_for_year(entry, year);
            if total == 0.0 {
                continue;
            }

            match blueprint.line_by_code(&entry.line_code) {
                Some((index, line)) => {
                    let signed = match (sign_convention, line.nature) {
                        (SignConvention::CostNegated, LineNature::Cost) => -total,
                        _ => total,
                    };
                    direct[index] += signed;
                }
                None => {
                    debug!(
                        "Initiative '{}' targets unknown line code '{}'",
                        initiative.id, entry.line_code
                    );
                    *unmatched.entry(entry.line_code.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    (direct, unmatched)
}

/// Pushes direct effects through the hierarchy. Only `manual` lines keep their own direct
/// effect; derived lines take the sum their mode prescribes.
pub fn propagate_effects(blueprint: &Blueprint, hierarchy: &Hierarchy, direct: &[f64]) -> Vec<f64> {
    LineResolver::new(&blueprint.lines, hierarchy, 0.0, |i, _| {
        direct.get(i).copied().unwrap_or(0.0)
    })
    .resolve_all()
}
