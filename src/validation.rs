use crate::error::{BlueprintError, Result};
use crate::schema::{Blueprint, Computation};
use crate::utils::parse_month_key;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// A structural problem in a blueprint. The engine tolerates all of these; validation exists
/// for editors that want to surface them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ValidationIssue {
    DuplicateId { id: String },
    ValuesOnDerivedLine { id: String },
    MalformedMonthKey { id: String, key: String },
    IndentJump { id: String, from: u32, to: u32 },
    UnknownRootLine { id: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::DuplicateId { id } => write!(f, "line id '{}' is used more than once", id),
            ValidationIssue::ValuesOnDerivedLine { id } => {
                write!(f, "line '{}' is derived but carries monthly values", id)
            }
            ValidationIssue::MalformedMonthKey { id, key } => {
                write!(f, "line '{}' has malformed month key '{}'", id, key)
            }
            ValidationIssue::IndentJump { id, from, to } => {
                write!(f, "line '{}' jumps from indent {} to {}", id, from, to)
            }
            ValidationIssue::UnknownRootLine { id } => {
                write!(f, "designated root line '{}' does not exist", id)
            }
        }
    }
}

/// Every issue found, in document order.
pub fn find_issues(blueprint: &Blueprint) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen = BTreeSet::new();
    let mut previous_indent = 0u32;

    for line in &blueprint.lines {
        if !seen.insert(line.id.as_str()) {
            issues.push(ValidationIssue::DuplicateId {
                id: line.id.clone(),
            });
        }

        if line.computation != Computation::Manual && !line.months.is_empty() {
            issues.push(ValidationIssue::ValuesOnDerivedLine {
                id: line.id.clone(),
            });
        }

        for key in line.months.keys() {
            if parse_month_key(key).is_err() {
                issues.push(ValidationIssue::MalformedMonthKey {
                    id: line.id.clone(),
                    key: key.clone(),
                });
            }
        }

        if line.indent > previous_indent.saturating_add(1) {
            issues.push(ValidationIssue::IndentJump {
                id: line.id.clone(),
                from: previous_indent,
                to: line.indent,
            });
        }
        previous_indent = line.indent;
    }

    if let Some(root_id) = &blueprint.root_line_id {
        if !seen.contains(root_id.as_str()) {
            issues.push(ValidationIssue::UnknownRootLine {
                id: root_id.clone(),
            });
        }
    }

    issues
}

pub fn validate_blueprint(blueprint: &Blueprint) -> Result<()> {
    let issues = find_issues(blueprint);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(BlueprintError::ValidationFailed(issues))
    }
}
