//! Three-mode line resolution (`manual`, `children`, `cumulative`), written once and reused for
//! month-keyed base values and for scalar initiative effects.

use crate::hierarchy::Hierarchy;
use crate::schema::{Computation, LineItem};
use crate::utils::{key_in_year, parse_month_key, year_of_key, MonthDescriptor};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value that lines can be summed into.
pub trait Aggregate: Clone {
    fn accumulate(&mut self, other: &Self);
}

impl Aggregate for f64 {
    fn accumulate(&mut self, other: &Self) {
        *self += *other;
    }
}

/// Month key ("YYYY-MM") to amount, always in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MonthlyRecord(pub BTreeMap<String, f64>);

impl MonthlyRecord {
    /// Zero for every month in the index.
    pub fn zeroed(index: &[MonthDescriptor]) -> Self {
        Self(index.iter().map(|m| (m.key.clone(), 0.0)).collect())
    }

    pub fn get(&self, key: &str) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_for_year(&self, year: i32) -> f64 {
        self.0
            .iter()
            .filter(|(key, _)| key_in_year(key, year))
            .map(|(_, value)| *value)
            .sum()
    }

    pub fn totals_by_year(&self) -> BTreeMap<i32, f64> {
        let mut totals = BTreeMap::new();
        for (key, value) in &self.0 {
            if let Some(year) = year_of_key(key) {
                *totals.entry(year).or_insert(0.0) += *value;
            }
        }
        totals
    }
}

impl Aggregate for MonthlyRecord {
    fn accumulate(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            *self.0.entry(key.clone()).or_insert(0.0) += *value;
        }
    }
}

/// Memoized depth-first resolver. Each line is computed at most once, on demand.
///
/// Resolution recurses, so stack use grows with the deepest parent chain in the blueprint.
pub struct LineResolver<'a, V, F> {
    lines: &'a [LineItem],
    hierarchy: &'a Hierarchy,
    zero: V,
    leaf: F,
    memo: Vec<Option<V>>,
    in_progress: Vec<bool>,
}

impl<'a, V, F> LineResolver<'a, V, F>
where
    V: Aggregate,
    F: Fn(usize, &LineItem) -> V,
{
    /// `leaf` supplies the value of `manual` lines; `zero` seeds every sum.
    pub fn new(lines: &'a [LineItem], hierarchy: &'a Hierarchy, zero: V, leaf: F) -> Self {
        Self {
            lines,
            hierarchy,
            zero,
            leaf,
            memo: vec![None; lines.len()],
            in_progress: vec![false; lines.len()],
        }
    }

    pub fn resolve(&mut self, index: usize) -> V {
        let lines = self.lines;
        if let Some(value) = &self.memo[index] {
            return value.clone();
        }
        if self.in_progress[index] {
            debug!(
                "Line '{}' references itself while resolving; counting it as zero",
                lines[index].id
            );
            return self.zero.clone();
        }
        self.in_progress[index] = true;

        let line = &lines[index];
        let value = match line.computation {
            Computation::Manual => (self.leaf)(index, line),
            Computation::Children => {
                let mut sum = self.zero.clone();
                let children = self.hierarchy.children_of(index).to_vec();
                for child in children {
                    let child_value = self.resolve(child);
                    sum.accumulate(&child_value);
                }
                sum
            }
            Computation::Cumulative => {
                let mut sum = self.zero.clone();
                for preceding in 0..index {
                    if lines[preceding].is_cumulative() {
                        continue;
                    }
                    let preceding_value = self.resolve(preceding);
                    sum.accumulate(&preceding_value);
                }
                sum
            }
        };

        self.in_progress[index] = false;
        self.memo[index] = Some(value.clone());
        value
    }

    /// Resolves every line, returned in document order.
    pub fn resolve_all(mut self) -> Vec<V> {
        for index in 0..self.lines.len() {
            self.resolve(index);
        }
        self.memo
            .into_iter()
            .map(|value| value.unwrap_or_else(|| self.zero.clone()))
            .collect()
    }
}

/// Zero-filled manual record of a line over the month index. Keys outside the index are not
/// carried.
pub fn manual_record(line: &LineItem, index: &[MonthDescriptor]) -> MonthlyRecord {
    let mut record = MonthlyRecord::zeroed(index);
    for (key, amount) in &line.months {
        if let Ok(month) = parse_month_key(key) {
            if let Some(slot) = record.0.get_mut(&month.key) {
                *slot += if amount.is_finite() { *amount } else { 0.0 };
            }
        }
    }
    record
}

/// Base monthly values of every line, in document order.
pub fn resolve_base_values(
    lines: &[LineItem],
    hierarchy: &Hierarchy,
    index: &[MonthDescriptor],
) -> Vec<MonthlyRecord> {
    let manual: Vec<MonthlyRecord> = lines
        .iter()
        .map(|line| match line.computation {
            Computation::Manual => manual_record(line, index),
            _ => MonthlyRecord::default(),
        })
        .collect();

    LineResolver::new(lines, hierarchy, MonthlyRecord::zeroed(index), |i, _| {
        manual[i].clone()
    })
    .resolve_all()
}

/// Base values keyed by line id. The first line wins when ids repeat.
pub fn base_values_by_id(
    lines: &[LineItem],
    values: &[MonthlyRecord],
) -> BTreeMap<String, MonthlyRecord> {
    let mut map = BTreeMap::new();
    for (line, value) in lines.iter().zip(values) {
        map.entry(line.id.clone()).or_insert_with(|| value.clone());
    }
    map
}
