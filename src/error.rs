use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlueprintError {
    #[error("Invalid month key '{0}': expected YYYY-MM")]
    InvalidMonthKey(String),

    #[error("Invalid layout setting {field} = {value}: must be a finite number greater than zero")]
    InvalidLayoutSetting { field: &'static str, value: f64 },

    #[error("Invalid analysis year {0}: must be between 1900 and 9999")]
    InvalidYear(i32),

    #[error("Blueprint failed validation with {} issue(s): {}", .0.len(), join_issues(.0))]
    ValidationFailed(Vec<crate::validation::ValidationIssue>),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn join_issues(issues: &[crate::validation::ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, BlueprintError>;
