//! Profile creation outcome

use crate::core_model::{Profile, Uid};
use std::fmt;

/// Non-critical step of profile creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SagaStep {
    /// Reserve the name in the display-name index
    ReserveDisplayName,
    /// Write the name onto the profile
    AssignDisplayName,
    VerificationEmail,
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SagaStep::ReserveDisplayName => "reserve display name",
            SagaStep::AssignDisplayName => "assign display name",
            SagaStep::VerificationEmail => "send verification email",
        };
        f.write_str(name)
    }
}

/// A step that failed without failing the saga
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaWarning {
    pub step: SagaStep,
    pub error: String,
}

impl fmt::Display for SagaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.step, self.error)
    }
}

/// Result of a completed profile creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaReport {
    pub uid: Uid,
    pub profile: Profile,
    pub warnings: Vec<SagaWarning>,
    /// Whether a verification email was requested
    pub verification_sent: bool,
}

impl SagaReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
