use std::sync::Arc;
use rmcp::{
    ServerHandler,
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    schemars, tool, Error as McpError,
};
use crate::service::SharePointService;
use crate::tools::{connection, files};

#[derive(Clone)]
pub struct SharePointMcp {
    pub service: Arc<SharePointService>,
}

#[tool(tool_box)]
impl SharePointMcp {
    #[tool(description = "List files and folders in the SharePoint site's document library, or in one folder of it. Returns name, type, size, dates and URLs.")]
    async fn list_sharepoint_files(
        &self,
        #[tool(param)]
        #[schemars(description = "Maximum number of items to return (default 50, max 100)")]
        max_files: Option<i64>,
        #[tool(param)]
        #[schemars(description = "Folder ID to list instead of the library root")]
        folder_id: Option<String>,
    ) -> Result<CallToolResult, McpError> {
        files::list_sharepoint_files(&self.service, max_files, folder_id).await
    }

    #[tool(description = "List the files and subfolders of a specific SharePoint folder")]
    async fn get_folder_contents(
        &self,
        #[tool(param)]
        #[schemars(description = "ID of the folder to list")]
        folder_id: String,
        #[tool(param)]
        #[schemars(description = "Maximum number of items to return (default 50, max 100)")]
        max_files: Option<i64>,
    ) -> Result<CallToolResult, McpError> {
        files::get_folder_contents(&self.service, folder_id, max_files).await
    }

    #[tool(description = "Read a text file from SharePoint. Binary files are reported as unsupported; large files are truncated.")]
    async fn get_sharepoint_file_content(
        &self,
        #[tool(param)]
        #[schemars(description = "ID of the file to read")]
        file_id: String,
        #[tool(param)]
        #[schemars(description = "Maximum content size in KB (default 5, max 50)")]
        max_size_kb: Option<i64>,
    ) -> Result<CallToolResult, McpError> {
        files::get_sharepoint_file_content(&self.service, file_id, max_size_kb).await
    }

    #[tool(description = "Check that the configured app registration can obtain a Graph token")]
    async fn test_sharepoint_connection(&self) -> Result<CallToolResult, McpError> {
        connection::test_sharepoint_connection(&self.service).await
    }
}

#[tool(tool_box)]
impl ServerHandler for SharePointMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Read-only access to one SharePoint site's documents. Use list_sharepoint_files to browse, then get_sharepoint_file_content with an item id.".into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
