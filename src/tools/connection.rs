use rmcp::{model::CallToolResult, Error as McpError};
use crate::service::SharePointService;
use super::result_json;

pub async fn test_sharepoint_connection(
    service: &SharePointService,
) -> Result<CallToolResult, McpError> {
    // A failed token request is reported in the payload, not as a tool error
    let status = service.test_connection().await;
    Ok(result_json(&status))
}
