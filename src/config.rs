use crate::error::{BlueprintError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Which initiatives contribute to the overlay, judged by their active stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "mode", content = "stages")]
pub enum StageFilter {
    #[default]
    All,
    Only(BTreeSet<String>),
    Exclude(BTreeSet<String>),
}

impl StageFilter {
    pub fn only(stages: &[&str]) -> Self {
        Self::Only(stages.iter().map(|s| s.to_string()).collect())
    }

    pub fn exclude(stages: &[&str]) -> Self {
        Self::Exclude(stages.iter().map(|s| s.to_string()).collect())
    }

    pub fn accepts(&self, stage: &str) -> bool {
        match self {
            StageFilter::All => true,
            StageFilter::Only(stages) => stages.contains(stage),
            StageFilter::Exclude(stages) => !stages.contains(stage),
        }
    }
}

/// How initiative amounts are signed when they land on a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum SignConvention {
    /// Amounts are added exactly as recorded.
    #[default]
    AsRecorded,
    /// Amounts landing on a `cost` line are subtracted.
    CostNegated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub column_width: f64,
    pub column_gap: f64,
    pub node_height: f64,
    pub row_gap: f64,
    pub padding: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            column_width: 220.0,
            column_gap: 80.0,
            node_height: 64.0,
            row_gap: 24.0,
            padding: 16.0,
        }
    }
}

impl LayoutConfig {
    /// Vertical distance between two consecutive leaves.
    pub fn row_pitch(&self) -> f64 {
        self.node_height + self.row_gap
    }

    pub fn column_pitch(&self) -> f64 {
        self.column_width + self.column_gap
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("columnWidth", self.column_width),
            ("nodeHeight", self.node_height),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(BlueprintError::InvalidLayoutSetting { field, value });
            }
        }

        let non_negative = [
            ("columnGap", self.column_gap),
            ("rowGap", self.row_gap),
            ("padding", self.padding),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(BlueprintError::InvalidLayoutSetting { field, value });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    /// Year to analyse. Defaults to the latest year present in the blueprint.
    pub year: Option<i32>,
    pub stage_filter: StageFilter,
    pub sign_convention: SignConvention,
    pub layout: LayoutConfig,
}

impl EngineOptions {
    pub fn for_year(year: i32) -> Self {
        Self {
            year: Some(year),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: EngineOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(year) = self.year {
            if !(1900..=9999).contains(&year) {
                return Err(BlueprintError::InvalidYear(year));
            }
        }
        self.layout.validate()
    }
}
