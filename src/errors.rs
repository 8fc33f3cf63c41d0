/// Error kinds the dispatch and gateway layers make decisions on.
///
/// Constructed at the failure site and carried inside `anyhow::Error`;
/// callers that care about a particular kind `downcast_ref` for it.
#[derive(Debug)]
pub enum CoreError {
    /// User input failed validation; surfaced ephemerally, never published.
    Validation(String),
    /// Chat platform or bus hiccup worth retrying.
    Transient(String),
    /// The target message or channel no longer exists.
    NotFound(String),
    /// A payload is missing data the backend was expected to include.
    Consistency(String),
    /// Guild configuration cannot satisfy the request.
    Configuration(String),
    /// Per-guild admission window exhausted.
    RateLimited(String),
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use CoreError::*;
        match self {
            Validation(msg) => write!(f, "validation failed: {}", msg),
            Transient(msg) => write!(f, "transient error: {}", msg),
            NotFound(what) => write!(f, "{} not found", what),
            Consistency(msg) => write!(f, "inconsistent payload: {}", msg),
            Configuration(msg) => write!(f, "configuration error: {}", msg),
            RateLimited(msg) => write!(f, "rate limit exceeded: {}", msg),
        }
    }
}

impl std::error::Error for CoreError {}

impl CoreError {
    /// True when the underlying cause of `err` is a missing message or
    /// channel. Such errors are terminal for embed edits: the round was
    /// removed externally and there is nothing left to update.
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<CoreError>(), Some(CoreError::NotFound(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn not_found_detected_through_anyhow() {
        let err = anyhow::Error::new(CoreError::NotFound("message M1".into()));
        assert!(CoreError::is_not_found(&err));
        assert!(!CoreError::is_not_found(&anyhow!("something else")));
    }

    #[test]
    fn display_names_the_kind() {
        let err = CoreError::RateLimited("guild G1".into());
        assert_eq!(err.to_string(), "rate limit exceeded: guild G1");
    }
}
