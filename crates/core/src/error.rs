use crate::credentials::Role;

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("patient with health card number {0} was not found")]
    PatientNotFound(String),
    #[error("unknown username: {0}")]
    UnknownUser(String),

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("incorrect password")]
    IncorrectPassword,
    #[error("incorrect admin password")]
    IncorrectAdminPassword,
    #[error("registration is disabled: no admin password configured")]
    RegistrationDisabled,
    #[error("no user is logged in")]
    NotLoggedIn,
    #[error("a {role} is not permitted to {action}")]
    NotPermitted { role: Role, action: &'static str },

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize registry: {0}")]
    Serialization(serde_json::Error),
    #[error("malformed registry: {0}")]
    MalformedRegistry(String),

    #[error("store lock poisoned by a failed writer")]
    LockPoisoned,
}

impl TriageError {
    /// Shorthand for a field-level validation failure.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// The input field this error should be shown against, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidInput { field, .. } => Some(field),
            Self::UnknownUser(_) => Some("username"),
            Self::IncorrectPassword => Some("password"),
            Self::IncorrectAdminPassword => Some("admin_password"),
            _ => None,
        }
    }

    /// True for lookups by an unknown key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PatientNotFound(_) | Self::UnknownUser(_))
    }
}

pub type TriageResult<T> = std::result::Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_maps_session_errors_to_inputs() {
        assert_eq!(
            TriageError::UnknownUser("carol".into()).field(),
            Some("username")
        );
        assert_eq!(TriageError::IncorrectPassword.field(), Some("password"));
        assert_eq!(
            TriageError::invalid("name", "cannot be empty").field(),
            Some("name")
        );
        assert_eq!(TriageError::NotLoggedIn.field(), None);
    }

    #[test]
    fn not_found_covers_both_stores() {
        assert!(TriageError::PatientNotFound("QAZ".into()).is_not_found());
        assert!(TriageError::UnknownUser("carol".into()).is_not_found());
        assert!(!TriageError::IncorrectPassword.is_not_found());
    }

    #[test]
    fn messages_name_the_key() {
        let err = TriageError::PatientNotFound("QAZ".into());
        assert_eq!(
            err.to_string(),
            "patient with health card number QAZ was not found"
        );

        let err = TriageError::NotPermitted {
            role: Role::Physician,
            action: "record vital signs",
        };
        assert_eq!(
            err.to_string(),
            "a physician is not permitted to record vital signs"
        );
    }
}
