use serde::Serialize;

/// Object classes that are converted into content records, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContentType {
    Page,
    Blogpost,
    CustomContentEntityObject,
}

impl ContentType {
    pub const ALL: [ContentType; 3] = [
        ContentType::Page,
        ContentType::Blogpost,
        ContentType::CustomContentEntityObject,
    ];

    /// The `class` attribute carried by objects of this type.
    pub fn class_name(self) -> &'static str {
        match self {
            ContentType::Page => "Page",
            ContentType::Blogpost => "Blogpost",
            ContentType::CustomContentEntityObject => "CustomContentEntityObject",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentRecord {
    pub id: String,
    pub filename: String,
    pub filesize: i64,
    pub content_type: String,
    pub author: Option<String>,
    pub created_at: String,
    /// Location of the restored copy; `None` unless the copy succeeded.
    pub filepath: Option<String>,
}

/// One page, blog post or custom content item with its references resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub title: String,
    pub creator: Option<String>,
    pub last_modifier: Option<String>,
    pub attachments: Vec<AttachmentRecord>,
    /// Comment entities are not converted; always empty.
    pub comments: Vec<serde_json::Value>,
    pub labels: Vec<String>,
    pub version: i64,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub content_raw: Option<String>,
    pub content_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}
