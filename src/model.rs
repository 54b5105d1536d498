use serde::{Deserialize, Serialize};

/// One page of a Graph collection response.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// `driveItem` as returned by Graph, limited to the fields we read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDriveItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub last_modified_date_time: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub folder: Option<FolderFacet>,
    #[serde(default)]
    pub file: Option<FileFacet>,
    #[serde(rename = "@microsoft.graph.downloadUrl", default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub parent_reference: Option<ParentReference>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    #[serde(default)]
    pub child_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ParentReference {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

/// Read-only projection of a drive item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "created")]
    pub created_at: String,
    #[serde(rename = "modified")]
    pub modified_at: String,
    #[serde(rename = "webUrl")]
    pub web_url: String,
    #[serde(rename = "parentPath")]
    pub parent_path: String,
    #[serde(rename = "childCount", skip_serializing_if = "Option::is_none")]
    pub child_count: Option<u64>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(rename = "downloadUrl", skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }
}

impl From<GraphDriveItem> for DriveItem {
    fn from(item: GraphDriveItem) -> Self {
        let is_folder = item.folder.is_some() && item.file.is_none();
        Self {
            id: item.id,
            name: item.name,
            kind: if is_folder { ItemKind::Folder } else { ItemKind::File },
            size_bytes: item.size.unwrap_or(0),
            created_at: item.created_date_time.unwrap_or_default(),
            modified_at: item.last_modified_date_time.unwrap_or_default(),
            web_url: item.web_url.unwrap_or_default(),
            parent_path: item.parent_reference.and_then(|p| p.path).unwrap_or_default(),
            child_count: item.folder.as_ref().and_then(|f| f.child_count),
            mime_type: item
                .file
                .and_then(|f| f.mime_type)
                .filter(|m| !m.is_empty()),
            download_url: if is_folder { None } else { item.download_url },
        }
    }
}
