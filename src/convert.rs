use crate::attachments::{assemble_attachments, RestoreConfig};
use crate::content::assemble_content;
use crate::index::{ExportIndex, IndexStats};
use crate::models::ContentRecord;
use crate::objects::ObjectBuckets;
use crate::parser::XmlDocument;
use crate::stats::ConversionStats;
use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// The export document, usually `entities.xml`
    pub input: PathBuf,
    /// Restore attachment binaries while converting
    pub restore: Option<RestoreConfig>,
    /// Show a spinner while the document is parsed
    pub show_progress: bool,
}

impl ConvertOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            restore: None,
            show_progress: false,
        }
    }

    pub fn with_restore(mut self, restore: RestoreConfig) -> Self {
        self.restore = Some(restore);
        self
    }
}

/// Result of converting one export.
#[derive(Debug)]
pub struct Conversion {
    pub records: Vec<ContentRecord>,
    pub index: IndexStats,
    pub stats: ConversionStats,
}

/// Runs the whole pipeline: load, classify, index, assemble attachments,
/// assemble content. Fails only when the input cannot be read or parsed;
/// problems with individual records are logged and skipped.
pub fn convert(options: &ConvertOptions) -> Result<Conversion> {
    let stats = ConversionStats::new();

    let doc = XmlDocument::open(&options.input, options.show_progress)?;

    let buckets = ObjectBuckets::classify(&doc);
    stats.set_objects_classified(buckets.total() as u64);
    info!(objects = buckets.total(), "Classification complete");

    let index = ExportIndex::build(&buckets);

    let attachments = assemble_attachments(&buckets, &index, options.restore.as_ref(), &stats);

    let records = assemble_content(&buckets, &index, &attachments);
    stats.set_content_records(records.len() as u64);

    Ok(Conversion {
        records,
        index: index.stats(),
        stats,
    })
}
