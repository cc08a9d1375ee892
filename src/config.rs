/// Output file name used when `--output` is not given
pub const DEFAULT_OUTPUT_FILE: &str = "confluence_data.json";

/// Confluence stores the latest version of an attachment under this file name
pub const LATEST_VERSION_FILENAME: &str = "1";

/// Name of the in-progress copy inside a restored attachment's directory
pub const RESTORE_TEMP_FILENAME: &str = ".restore.part";

/// Progress update interval (tick every N XML elements)
pub const PROGRESS_INTERVAL: u64 = 10_000;

/// Buffer size for reading the export document
pub const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Buffer size for writing the JSON output
pub const WRITE_BUFFER_SIZE: usize = 128 * 1024;

// Object classes read from the export
pub const CLASS_USER: &str = "ConfluenceUserImpl";
pub const CLASS_BODY_CONTENT: &str = "BodyContent";
pub const CLASS_LABEL: &str = "Label";
pub const CLASS_LABELLING: &str = "Labelling";
pub const CLASS_CONTENT_PROPERTY: &str = "ContentProperty";
pub const CLASS_ATTACHMENT: &str = "Attachment";

/// Property names under which an attachment references its owning page
pub const ATTACHMENT_CONTAINER_FIELDS: [&str; 3] = ["content", "container", "containerContent"];

/// Content property holding an attachment's size in bytes
pub const PROPERTY_FILESIZE: &str = "FILESIZE";

/// Content property holding an attachment's media type
pub const PROPERTY_MEDIA_TYPE: &str = "MEDIA_TYPE";
