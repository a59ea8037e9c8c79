/// Errors raised by the pure parsing and resolution steps.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("[WG210] malformed wheel filename '{filename}': {reason}")]
    MalformedWheelName { filename: String, reason: String },
    #[error(
        "[WG211] wheels target conflicting platforms ({}): {}",
        .platforms.join(", "),
        .wheels.join(", ")
    )]
    ConflictingPlatforms {
        platforms: Vec<String>,
        wheels: Vec<String>,
    },
}

impl DomainError {
    pub(crate) fn malformed(filename: &str, reason: impl Into<String>) -> Self {
        Self::MalformedWheelName {
            filename: filename.to_string(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedWheelName { .. } => "WG210",
            Self::ConflictingPlatforms { .. } => "WG211",
        }
    }
}
