use crate::error::{BlueprintError, Result};
use crate::schema::LineItem;
use chrono::{Datelike, NaiveDate};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A parsed calendar month. Ordering is `(year, month)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct MonthDescriptor {
    pub year: i32,
    pub month: u32,
    pub key: String,
}

impl MonthDescriptor {
    pub fn new(year: i32, month: u32) -> Self {
        Self {
            year,
            month,
            key: month_key(year, month),
        }
    }
}

pub fn month_key(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

/// Parses a key in the format "YYYY-MM".
pub fn parse_month_key(key: &str) -> Result<MonthDescriptor> {
    let trimmed = key.trim();
    let (year_part, month_part) = trimmed
        .split_once('-')
        .ok_or_else(|| BlueprintError::InvalidMonthKey(key.to_string()))?;

    if year_part.len() != 4 || month_part.len() != 2 {
        return Err(BlueprintError::InvalidMonthKey(key.to_string()));
    }

    let date = NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d")
        .map_err(|_| BlueprintError::InvalidMonthKey(key.to_string()))?;

    Ok(MonthDescriptor::new(date.year(), date.month()))
}

/// Year a key belongs to, or `None` when the key is malformed.
pub fn year_of_key(key: &str) -> Option<i32> {
    parse_month_key(key).ok().map(|m| m.year)
}

pub fn key_in_year(key: &str, year: i32) -> bool {
    year_of_key(key) == Some(year)
}

/// Every month recorded by any line, deduplicated and sorted ascending.
/// Unparseable keys are dropped.
pub fn build_month_index(lines: &[LineItem]) -> Vec<MonthDescriptor> {
    let mut index = BTreeSet::new();
    let mut dropped = 0usize;

    for line in lines {
        for key in line.months.keys() {
            match parse_month_key(key) {
                Ok(month) => {
                    index.insert(month);
                }
                Err(_) => dropped += 1,
            }
        }
    }

    if dropped > 0 {
        debug!("Dropped {} malformed month key(s) while building month index", dropped);
    }

    index.into_iter().collect()
}

pub fn years_in_index(index: &[MonthDescriptor]) -> Vec<i32> {
    let years: BTreeSet<i32> = index.iter().map(|m| m.year).collect();
    years.into_iter().collect()
}
