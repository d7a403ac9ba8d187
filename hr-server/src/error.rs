//! Lifecycle error → response mapping
//!
//! The same failure reads differently depending on the operation: a missing
//! row is `GET_DATA_FAIL` on a fetch but `NOT_ID_EXISTS` on a delete.

use shared::{AppError, MessageKey};

use crate::lifecycle::LifecycleError;

/// Resource operation an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
    Restore,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Restore => "restore",
        }
    }
}

impl LifecycleError {
    /// Message key for this error in `op`
    pub fn message_key(&self, op: Operation) -> MessageKey {
        use LifecycleError as E;
        use Operation as Op;

        match (op, self) {
            (_, E::Payload(_)) => MessageKey::ParamError,
            (_, E::Validation(_)) => MessageKey::MissingFields,
            (Op::List | Op::Get, _) => MessageKey::GetDataFail,

            (Op::Create, E::Hook(_)) => MessageKey::AfterCreateFail,
            (Op::Create, _) => MessageKey::CreateFail,

            (Op::Update, E::NotFound) => MessageKey::NotIdExists,
            (Op::Update, E::Referential(_) | E::Hook(_)) => MessageKey::ErrorBeforeUpdate,
            (Op::Update, E::VersionConflict { .. }) => MessageKey::DataNotChanged,
            (Op::Update, E::Storage(_)) => MessageKey::SystemError,

            (Op::Delete | Op::Restore, E::NotFound) => MessageKey::NotIdExists,
            (Op::Restore, _) => MessageKey::RestoreFail,
            (Op::Delete, _) => MessageKey::SystemError,
        }
    }

    /// Convert into the handler-boundary error, logging internal failures
    pub fn into_app_error(self, op: Operation) -> AppError {
        let key = self.message_key(op);
        match self {
            LifecycleError::Validation(errors) => AppError::missing_fields(errors),
            LifecycleError::Storage(ref e) => {
                tracing::error!(operation = op.as_str(), error = %e, "Storage failure");
                AppError::new(key)
            }
            other => {
                tracing::debug!(operation = op.as_str(), error = %other, "Request rejected");
                AppError::new(key)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{PayloadError, StoreError};

    fn storage() -> LifecycleError {
        LifecycleError::Storage(StoreError::ForeignKey("fk".into()))
    }

    #[test]
    fn test_fetch_failures_are_get_data_fail() {
        assert_eq!(
            LifecycleError::NotFound.message_key(Operation::Get),
            MessageKey::GetDataFail
        );
        assert_eq!(storage().message_key(Operation::List), MessageKey::GetDataFail);
    }

    #[test]
    fn test_create_keys() {
        assert_eq!(storage().message_key(Operation::Create), MessageKey::CreateFail);
        assert_eq!(
            LifecycleError::Hook("audit".into()).message_key(Operation::Create),
            MessageKey::AfterCreateFail
        );
    }

    #[test]
    fn test_update_keys() {
        assert_eq!(
            LifecycleError::NotFound.message_key(Operation::Update),
            MessageKey::NotIdExists
        );
        assert_eq!(
            LifecycleError::Referential("group 9".into()).message_key(Operation::Update),
            MessageKey::ErrorBeforeUpdate
        );
        assert_eq!(
            LifecycleError::VersionConflict {
                expected: 1,
                stored: 2
            }
            .message_key(Operation::Update),
            MessageKey::DataNotChanged
        );
        assert_eq!(storage().message_key(Operation::Update), MessageKey::SystemError);
    }

    #[test]
    fn test_delete_and_restore_keys() {
        assert_eq!(
            LifecycleError::NotFound.message_key(Operation::Delete),
            MessageKey::NotIdExists
        );
        assert_eq!(storage().message_key(Operation::Delete), MessageKey::SystemError);
        assert_eq!(
            LifecycleError::NotFound.message_key(Operation::Restore),
            MessageKey::NotIdExists
        );
        assert_eq!(storage().message_key(Operation::Restore), MessageKey::RestoreFail);
    }

    #[test]
    fn test_payload_and_validation_win_everywhere() {
        let payload = LifecycleError::Payload(PayloadError("bad".into()));
        assert_eq!(payload.message_key(Operation::Delete), MessageKey::ParamError);

        let mut errors = shared::ValidateErrors::new();
        errors.insert("team_name_vn".into(), "MSG_V0001".into());
        let app = LifecycleError::Validation(errors).into_app_error(Operation::Update);
        assert_eq!(app.key, MessageKey::MissingFields);
        assert!(app.validate_error.is_some());
    }
}
