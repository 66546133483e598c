use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Month-keyed amounts as they arrive on the wire ("YYYY-MM" -> amount).
pub type MonthAmounts = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LineNature {
    #[schemars(description = "Income line (sales, other income)")]
    Revenue,

    #[schemars(description = "Expense line (cost of sales, operating expenses)")]
    Cost,

    #[schemars(description = "Subtotal or heading line")]
    Summary,
}

impl Default for LineNature {
    fn default() -> Self {
        Self::Summary
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Computation {
    #[schemars(description = "Leaf line. Values come directly from its own months map.")]
    Manual,

    #[schemars(
        description = "Each month is the sum of the line's children (lines nested under it by indentation)."
    )]
    Children,

    #[schemars(
        description = "Running subtotal: each month is the sum of every preceding line whose computation is not cumulative."
    )]
    Cumulative,
}

impl Default for Computation {
    fn default() -> Self {
        Self::Manual
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[schemars(description = "Stable identifier, unique within the blueprint")]
    pub id: String,

    #[schemars(
        description = "Short mnemonic (e.g. NET_PROFIT). Initiative entries target lines by this code."
    )]
    pub code: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    #[schemars(
        description = "Nesting depth. A line is a child of the nearest preceding line with a strictly smaller indent."
    )]
    pub indent: u32,

    #[serde(default)]
    pub nature: LineNature,

    #[serde(default)]
    pub computation: Computation,

    #[serde(default, deserialize_with = "lenient_amounts")]
    #[schemars(
        description = "Month key (YYYY-MM) to amount. Only read for manual lines. Unparseable amounts count as zero."
    )]
    pub months: MonthAmounts,
}

impl LineItem {
    pub fn new(id: &str, code: &str, indent: u32, computation: Computation) -> Self {
        Self {
            id: id.to_string(),
            code: code.to_string(),
            name: id.to_string(),
            indent,
            nature: LineNature::default(),
            computation,
            months: BTreeMap::new(),
        }
    }

    pub fn manual(id: &str, code: &str, indent: u32, months: &[(&str, f64)]) -> Self {
        let mut line = Self::new(id, code, indent, Computation::Manual);
        line.months = months
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect();
        line
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_nature(mut self, nature: LineNature) -> Self {
        self.nature = nature;
        self
    }

    pub fn is_cumulative(&self) -> bool {
        self.computation == Computation::Cumulative
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    #[schemars(description = "Line items in document order. Order defines both nesting and cumulative scope.")]
    pub lines: Vec<LineItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(
        description = "Id of the line to render as the tree root. When absent, the cumulative root whose code contains NET is used."
    )]
    pub root_line_id: Option<String>,
}

impl Blueprint {
    pub fn new(lines: Vec<LineItem>) -> Self {
        Self {
            lines,
            root_line_id: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// First line carrying `code`. Later duplicates are unreachable by code.
    pub fn line_by_code(&self, code: &str) -> Option<(usize, &LineItem)> {
        self.lines
            .iter()
            .enumerate()
            .find(|(_, line)| line.code == code)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Blueprint)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialEntry {
    #[schemars(description = "Code of the blueprint line this adjustment lands on")]
    pub line_code: String,

    #[serde(default, deserialize_with = "lenient_amounts")]
    #[schemars(description = "Month key (YYYY-MM) to delta amount")]
    pub distribution: MonthAmounts,
}

impl FinancialEntry {
    pub fn new(line_code: &str, distribution: &[(&str, f64)]) -> Self {
        Self {
            line_code: line_code.to_string(),
            distribution: distribution
                .iter()
                .map(|(key, value)| (key.to_string(), *value))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    #[serde(default)]
    #[schemars(
        description = "Entries grouped by financial kind (e.g. recurring_benefits, one_off_costs)"
    )]
    pub financials: BTreeMap<String, Vec<FinancialEntry>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Initiative {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[schemars(description = "Stage whose financial plan is currently in force")]
    pub active_stage: String,

    #[serde(default)]
    pub stages: BTreeMap<String, Stage>,
}

impl Initiative {
    pub fn new(id: &str, active_stage: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            active_stage: active_stage.to_string(),
            stages: BTreeMap::new(),
        }
    }

    /// Adds `entry` under `kind` of the active stage.
    pub fn with_entry(mut self, kind: &str, entry: FinancialEntry) -> Self {
        self.stages
            .entry(self.active_stage.clone())
            .or_default()
            .financials
            .entry(kind.to_string())
            .or_default()
            .push(entry);
        self
    }

    /// Entries of the active stage, kinds in key order. An active stage with no plan yields nothing.
    pub fn active_entries(&self) -> impl Iterator<Item = &FinancialEntry> {
        self.stages
            .get(&self.active_stage)
            .into_iter()
            .flat_map(|stage| stage.financials.values())
            .flatten()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Vec<Initiative>)
    }
}

/// Accepts numbers, numeric strings and nulls. Anything else becomes 0.0.
fn lenient_amounts<'de, D>(deserializer: D) -> Result<MonthAmounts, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, coerce_amount(&value)))
        .collect())
}

pub(crate) fn coerce_amount(value: &serde_json::Value) -> f64 {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}
