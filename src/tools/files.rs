use rmcp::{model::CallToolResult, Error as McpError};
use serde_json::json;
use crate::service::SharePointService;
use super::{result_json, service_err};

pub async fn list_sharepoint_files(
    service: &SharePointService,
    max_files: Option<i64>,
    folder_id: Option<String>,
) -> Result<CallToolResult, McpError> {
    let listing = service
        .list_items(folder_id.as_deref(), max_files)
        .await
        .map_err(service_err)?;
    Ok(result_json(&json!({
        "items": listing.items,
        "count": listing.items.len(),
        "truncated": listing.truncated
    })))
}

pub async fn get_folder_contents(
    service: &SharePointService,
    folder_id: String,
    max_files: Option<i64>,
) -> Result<CallToolResult, McpError> {
    let listing = service
        .get_folder_contents(&folder_id, max_files)
        .await
        .map_err(service_err)?;
    Ok(result_json(&json!({
        "folder_id": folder_id,
        "items": listing.items,
        "count": listing.items.len(),
        "truncated": listing.truncated
    })))
}

pub async fn get_sharepoint_file_content(
    service: &SharePointService,
    file_id: String,
    max_size_kb: Option<i64>,
) -> Result<CallToolResult, McpError> {
    let result = service
        .get_file_content(&file_id, max_size_kb)
        .await
        .map_err(service_err)?;
    Ok(result_json(&result))
}
