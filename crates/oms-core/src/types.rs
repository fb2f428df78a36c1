//! Shared types used across OMS crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Liveness of an application, as returned by the status endpoint.
///
/// Peers decode this exact shape, so the field name is part of the wire
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStatus {
    pub status: bool,
}

impl AppStatus {
    pub fn up() -> Self {
        Self { status: true }
    }

    pub fn down() -> Self {
        Self { status: false }
    }
}

/// Service-manager action applied to an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Start,
    Stop,
    Restart,
}

impl Operation {
    /// Verb passed to the service manager (`start`, `stop`, `restart`).
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Restart => "restart",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Start => "START",
            Operation::Stop => "STOP",
            Operation::Restart => "RESTART",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown operation: {0:?} (expected START, STOP or RESTART)")]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "START" => Ok(Operation::Start),
            "STOP" => Ok(Operation::Stop),
            "RESTART" => Ok(Operation::Restart),
            _ => Err(UnknownOperation(s.to_string())),
        }
    }
}

/// Body of the operate endpoint. Both fields are optional on the wire so
/// that missing values surface as validation errors, not decode errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperateRequest {
    pub app_key: Option<String>,
    pub operate: Option<String>,
}

/// Which package records lose their active flag before a new one is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagScope {
    /// Only records sharing the upgraded record's type.
    #[default]
    Type,
    /// Every record regardless of type.
    All,
}

/// Maximum page size accepted by paginated reads.
pub const MAX_PAGE_SIZE: u64 = 500;

/// 1-based pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageParam {
    pub current: u64,
    pub size: u64,
}

impl Default for PageParam {
    fn default() -> Self {
        Self {
            current: 1,
            size: 10,
        }
    }
}

impl PageParam {
    /// Clamp out-of-range values: page 0 becomes 1, size is kept within
    /// `1..=MAX_PAGE_SIZE`.
    pub fn normalized(self) -> Self {
        Self {
            current: self.current.max(1),
            size: self.size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        (self.current.max(1) - 1).saturating_mul(self.size)
    }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: u64,
    pub records: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_parses_case_insensitively() {
        assert_eq!("restart".parse::<Operation>(), Ok(Operation::Restart));
        assert_eq!("Start".parse::<Operation>(), Ok(Operation::Start));
        assert_eq!(" STOP ".parse::<Operation>(), Ok(Operation::Stop));
        assert!("reload".parse::<Operation>().is_err());
    }

    #[test]
    fn operation_serializes_uppercase() {
        let json = serde_json::to_string(&Operation::Restart).unwrap();
        assert_eq!(json, "\"RESTART\"");
        assert_eq!(Operation::Restart.verb(), "restart");
    }

    #[test]
    fn operate_request_uses_camel_case() {
        let req: OperateRequest =
            serde_json::from_str(r#"{"appKey":"WCS","operate":"RESTART"}"#).unwrap();
        assert_eq!(req.app_key.as_deref(), Some("WCS"));
        assert_eq!(req.operate.as_deref(), Some("RESTART"));

        let empty: OperateRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, OperateRequest::default());
    }

    #[test]
    fn app_status_wire_shape() {
        let json = serde_json::to_string(&AppStatus::up()).unwrap();
        assert_eq!(json, r#"{"status":true}"#);
        let decoded: AppStatus = serde_json::from_str(r#"{"status":false}"#).unwrap();
        assert_eq!(decoded, AppStatus::down());
    }

    #[test]
    fn page_param_normalizes() {
        let p = PageParam { current: 0, size: 0 }.normalized();
        assert_eq!(p, PageParam { current: 1, size: 1 });

        let p = PageParam { current: 3, size: 10_000 }.normalized();
        assert_eq!(p.size, MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 2 * MAX_PAGE_SIZE);
    }

    #[test]
    fn tag_scope_defaults_to_type() {
        assert_eq!(TagScope::default(), TagScope::Type);
        let scope: TagScope = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(scope, TagScope::All);
    }
}
