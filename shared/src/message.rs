//! Message codes
//!
//! Every response envelope carries a symbolic key translated to a fixed
//! code through a static table. Keys missing from the table are returned
//! verbatim, so clients can still tell them apart.

use std::fmt;

/// Published key → code table. Clients match on the codes, keep them stable.
const MESSAGE_TABLE: &[(&str, &str)] = &[
    // ==================== Validation ====================
    ("PARAM_ERROR", "MSG_V0000"),
    ("MAX_LENGTH", "MSG_V0001"),
    ("FIX_LENGTH", "MSG_V0002"),
    ("FORMAT_NUMBER", "MSG_V0004"),
    ("FORMAT_DATE", "MSG_V0003"),
    ("REQUIRE", "MSG_V0001"),
    // ==================== System / Auth ====================
    ("KEY_NOT_FOUND", "MSG_S0000"),
    ("SYSTEM_ERROR", "MSG_S0001"),
    ("TOKEN_INCORRECT", "MSG_S0002"),
    // ==================== Data ====================
    ("GET_DATA_FAIL", "MSG_RE0001"),
    ("CREATE_SUCCESS", "MSG_CI0001"),
    ("NOT_ID_EXISTS", "MSG_RE0002"),
    ("GET_DATA_SUCCESS", "MSG_RI0001"),
    // ==================== Misc ====================
    ("USERNAME_PASSWORD_INCORRECT", "MSG_N0000"),
    ("MISSING_FIELDS", "MSG_V1000"),
    ("UPDATE_SUCCESS", "MSG_UI0001"),
    ("DELETE_SUCCESS", "MSG_DI0001"),
];

/// Translate a symbolic key to its message code.
///
/// Unknown keys pass through unchanged.
pub fn message_code(key: &str) -> String {
    MESSAGE_TABLE
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, code)| (*code).to_string())
        .unwrap_or_else(|| key.to_string())
}

/// Symbolic message keys used by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    // Validation
    ParamError,
    MaxLength,
    FixLength,
    FormatNumber,
    FormatDate,
    Require,
    MissingFields,

    // System / Auth
    KeyNotFound,
    SystemError,
    TokenIncorrect,
    UsernamePasswordIncorrect,
    LogoutSuccess,

    // Read
    GetDataFail,
    GetDataSuccess,
    NotIdExists,

    // Write
    CreateSuccess,
    CreateFail,
    AfterCreateFail,
    UpdateSuccess,
    ErrorBeforeUpdate,
    DataNotChanged,
    DeleteSuccess,
    RestoreSuccess,
    RestoreFail,
}

impl MessageKey {
    /// The symbolic key as it appears in the code table
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ParamError => "PARAM_ERROR",
            Self::MaxLength => "MAX_LENGTH",
            Self::FixLength => "FIX_LENGTH",
            Self::FormatNumber => "FORMAT_NUMBER",
            Self::FormatDate => "FORMAT_DATE",
            Self::Require => "REQUIRE",
            Self::MissingFields => "MISSING_FIELDS",
            Self::KeyNotFound => "KEY_NOT_FOUND",
            Self::SystemError => "SYSTEM_ERROR",
            Self::TokenIncorrect => "TOKEN_INCORRECT",
            Self::UsernamePasswordIncorrect => "USERNAME_PASSWORD_INCORRECT",
            Self::LogoutSuccess => "LOGOUT_SUCCESS",
            Self::GetDataFail => "GET_DATA_FAIL",
            Self::GetDataSuccess => "GET_DATA_SUCCESS",
            Self::NotIdExists => "NOT_ID_EXISTS",
            Self::CreateSuccess => "CREATE_SUCCESS",
            Self::CreateFail => "CREATE_FAIL",
            Self::AfterCreateFail => "AFTER_CREATE_FAIL",
            Self::UpdateSuccess => "UPDATE_SUCCESS",
            Self::ErrorBeforeUpdate => "ERROR_BEFORE_UPDATE",
            Self::DataNotChanged => "DATA_NOT_CHANGED",
            Self::DeleteSuccess => "DELETE_SUCCESS",
            Self::RestoreSuccess => "RESTORE_SUCCESS",
            Self::RestoreFail => "RESTORE_FAIL",
        }
    }

    /// Message code sent to clients
    pub fn code(&self) -> String {
        message_code(self.as_str())
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_keys() {
        assert_eq!(message_code("KEY_NOT_FOUND"), "MSG_S0000");
        assert_eq!(message_code("GET_DATA_SUCCESS"), "MSG_RI0001");
        assert_eq!(message_code("GET_DATA_FAIL"), "MSG_RE0001");
        assert_eq!(message_code("CREATE_SUCCESS"), "MSG_CI0001");
        assert_eq!(message_code("UPDATE_SUCCESS"), "MSG_UI0001");
        assert_eq!(message_code("DELETE_SUCCESS"), "MSG_DI0001");
        assert_eq!(message_code("MISSING_FIELDS"), "MSG_V1000");
    }

    #[test]
    fn test_shared_codes() {
        // MAX_LENGTH and REQUIRE share a code in the published table
        assert_eq!(message_code("MAX_LENGTH"), message_code("REQUIRE"));
        assert_eq!(message_code("FORMAT_DATE"), "MSG_V0003");
        assert_eq!(message_code("FORMAT_NUMBER"), "MSG_V0004");
    }

    #[test]
    fn test_unknown_key_passes_through() {
        assert_eq!(message_code("RESTORE_SUCCESS"), "RESTORE_SUCCESS");
        assert_eq!(message_code(""), "");
        assert_eq!(MessageKey::CreateFail.code(), "CREATE_FAIL");
    }

    #[test]
    fn test_key_codes() {
        assert_eq!(MessageKey::TokenIncorrect.code(), "MSG_S0002");
        assert_eq!(MessageKey::NotIdExists.code(), "MSG_RE0002");
        assert_eq!(MessageKey::ParamError.code(), "MSG_V0000");
        assert_eq!(MessageKey::SystemError.to_string(), "SYSTEM_ERROR");
    }
}
