//! Error kinds surfaced by the tutoring core.
//!
//! Unknown concepts are not errors: the session answers them with a guidance
//! message. Everything here is a failure the host loop must see.

/// A specialized `Result` type for tutoring operations.
pub type Result<T> = std::result::Result<T, TutorError>;

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    /// The completion service or the concept store failed or timed out.
    #[error("external call failed while {stage}: {source:#}")]
    ExternalCall {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
    /// A mastery update could not be made durable.
    #[error("could not record mastery of '{concept}': {source:#}")]
    Persistence {
        concept: String,
        #[source]
        source: anyhow::Error,
    },
    /// The extraction model produced output that holds no JSON records.
    #[error("malformed extraction output: {0}")]
    MalformedExtraction(String),
}

impl TutorError {
    pub(crate) fn external(stage: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::ExternalCall { stage, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_error_display() {
        let err = TutorError::external("classifying intent")(anyhow!("connection refused"));
        assert_eq!(
            err.to_string(),
            "external call failed while classifying intent: connection refused"
        );

        let err = TutorError::Persistence {
            concept: "Glucose".to_string(),
            source: anyhow!("disk full"),
        };
        assert_eq!(
            err.to_string(),
            "could not record mastery of 'Glucose': disk full"
        );
    }
}
