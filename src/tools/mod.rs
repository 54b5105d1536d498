pub mod connection;
pub mod files;

use rmcp::{model::{CallToolResult, Content}, Error as McpError};
use serde::Serialize;
use serde_json::json;
use crate::service::ServiceError;

pub fn service_err(e: ServiceError) -> McpError {
    let data = Some(json!({ "kind": e.kind(), "status": e.status() }));
    match e {
        ServiceError::Validation(msg) => McpError::invalid_params(msg, data),
        other => McpError::internal_error(other.to_string(), data),
    }
}

pub fn result_json<T: Serialize>(v: &T) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(v).unwrap_or_default()
    )])
}
