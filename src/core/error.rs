use thiserror::Error;

/// Failure taxonomy for the dispatcher.
///
/// Syntax errors come from the user's query and lead back to a re-prompt.
/// Resolution errors are internal inconsistencies and abort the current pass.
/// Catalog errors are fatal at load time. Persistence errors are surfaced as
/// warnings by callers and never undo an already-resolved outcome.
#[derive(Error, Debug)]
pub enum DorisError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("probability cutoff {0} is outside [0, 1]")]
    InvalidCutoff(f64),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("resolution defect: {0}")]
    Resolution(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl DorisError {
    pub fn syntax(msg: impl Into<String>) -> Self {
        DorisError::Syntax(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        DorisError::Catalog(msg.into())
    }

    pub fn resolution(msg: impl Into<String>) -> Self {
        DorisError::Resolution(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        DorisError::Persistence(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DorisError>;

/// Rejects cutoffs outside [0, 1]. Every function taking a cutoff calls this
/// before doing any work.
pub fn validate_cutoff(cutoff: f64) -> Result<()> {
    if cutoff.is_nan() || !(0.0..=1.0).contains(&cutoff) {
        return Err(DorisError::InvalidCutoff(cutoff));
    }
    Ok(())
}

/// Outcome of one resolution pass.
///
/// A user skip is a first-class result, not an error: the caller re-prompts
/// for a fresh query and nothing else happens.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ResolvedCommand),
    Skipped,
}

/// An action plus its positional argument slots, sized to the catalog's
/// declared argument count. Unset optional slots stay `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCommand {
    pub action: String,
    pub args: Vec<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_in_range_passes() {
        assert!(validate_cutoff(0.0).is_ok());
        assert!(validate_cutoff(0.75).is_ok());
        assert!(validate_cutoff(1.0).is_ok());
    }

    #[test]
    fn cutoff_out_of_range_fails() {
        assert!(matches!(
            validate_cutoff(-0.1),
            Err(DorisError::InvalidCutoff(_))
        ));
        assert!(matches!(
            validate_cutoff(1.5),
            Err(DorisError::InvalidCutoff(_))
        ));
        assert!(matches!(
            validate_cutoff(f64::NAN),
            Err(DorisError::InvalidCutoff(_))
        ));
    }
}
