//! Core decision and operation-code types

use serde::{Deserialize, Serialize};

/// Requested access, as carried on broker ACL checks.
///
/// The codes follow the broker plugin convention: read = 1, write = 2,
/// read/write = 3, superuser = 4. Codes outside that set are kept verbatim
/// and never granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Access {
    /// Subscribe/read, code 1
    Read,
    /// Publish/write, code 2
    Write,
    /// Combined read/write, code 3
    ReadWrite,
    /// Superuser check, code 4
    Superuser,
    /// Any other wire code
    Other(i32),
}

impl Access {
    /// Wire code for this access kind
    pub fn code(&self) -> i32 {
        match self {
            Access::Read => 1,
            Access::Write => 2,
            Access::ReadWrite => 3,
            Access::Superuser => 4,
            Access::Other(code) => *code,
        }
    }
}

impl From<i32> for Access {
    fn from(code: i32) -> Self {
        match code {
            1 => Access::Read,
            2 => Access::Write,
            3 => Access::ReadWrite,
            4 => Access::Superuser,
            other => Access::Other(other),
        }
    }
}

impl From<Access> for i32 {
    fn from(access: Access) -> Self {
        access.code()
    }
}

/// Three-valued access decision.
///
/// `Defer` means "no decision yet, verification pending" and is distinct
/// from `Deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    /// Request is granted
    Allow,
    /// Request is rejected
    Deny,
    /// No decision yet; verification pending
    Defer,
}

impl Decision {
    /// Whether this decision grants the request
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Decision::Allow => "ALLOW",
            Decision::Deny => "DENY",
            Decision::Defer => "DEFER",
        };
        f.write_str(s)
    }
}

/// Current time as epoch seconds
pub(crate) fn epoch_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_codes() {
        assert_eq!(Access::from(1), Access::Read);
        assert_eq!(Access::from(2), Access::Write);
        assert_eq!(Access::from(3), Access::ReadWrite);
        assert_eq!(Access::from(4), Access::Superuser);
        assert_eq!(Access::from(9), Access::Other(9));
        assert_eq!(Access::Other(9).code(), 9);
        assert_eq!(Access::ReadWrite.code(), 3);
    }

    #[test]
    fn test_decision_display() {
        assert_eq!(Decision::Allow.to_string(), "ALLOW");
        assert_eq!(Decision::Deny.to_string(), "DENY");
        assert_eq!(Decision::Defer.to_string(), "DEFER");
        assert!(Decision::Allow.is_allow());
        assert!(!Decision::Defer.is_allow());
    }
}
