use thiserror::Error;

/// A range expression that could not be turned into candidate addresses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid range spec '{spec}': {reason}")]
pub struct InvalidRangeSpec {
    pub spec: String,
    pub reason: String,
}

impl InvalidRangeSpec {
    pub fn new(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            reason: reason.into(),
        }
    }
}
