// 1.3: error taxonomy shared by the hedge path, the settlement saga and every collaborator.

pub type Result<T> = std::result::Result<T, HedgeError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HedgeError {
    /// Business-rule violation: wrong state, missing configuration, missing adapter.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("not enough funds: {0}")]
    NotEnoughFunds(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("entity already exists: {0}")]
    EntityAlreadyExists(String),

    /// Any other collaborator failure, timeouts included.
    #[error("service failure: {0}")]
    Service(String),
}

impl HedgeError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::Service(message.into())
    }

    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidOperation(_))
    }

    pub fn is_not_enough_funds(&self) -> bool {
        matches!(self, Self::NotEnoughFunds(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(HedgeError::invalid_operation("no adapter").is_invalid_operation());
        assert!(!HedgeError::service("timeout").is_invalid_operation());
        assert!(HedgeError::NotEnoughFunds("USD".into()).is_not_enough_funds());
    }

    #[test]
    fn display_includes_context() {
        let err = HedgeError::EntityNotFound("settlement 42".into());
        assert_eq!(err.to_string(), "entity not found: settlement 42");
    }
}
