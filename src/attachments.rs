use crate::config::{
    ATTACHMENT_CONTAINER_FIELDS, CLASS_ATTACHMENT, LATEST_VERSION_FILENAME, PROPERTY_FILESIZE,
    PROPERTY_MEDIA_TYPE, RESTORE_TEMP_FILENAME,
};
use crate::index::ExportIndex;
use crate::models::AttachmentRecord;
use crate::objects::{ExportObject, ObjectBuckets};
use crate::stats::ConversionStats;
use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info};

/// Where attachment binaries are read from and restored to.
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    /// Export layout: `<attachments_dir>/<page-id>/<attachment-id>/1`
    pub attachments_dir: PathBuf,
    /// Restored layout: `<restore_dir>/<page-id>/<attachment-id>/<filename>`
    pub restore_dir: PathBuf,
}

impl RestoreConfig {
    pub fn new(attachments_dir: impl Into<PathBuf>, restore_dir: impl Into<PathBuf>) -> Self {
        Self {
            attachments_dir: attachments_dir.into(),
            restore_dir: restore_dir.into(),
        }
    }

    pub fn source_path(&self, page_id: &str, attachment_id: &str) -> PathBuf {
        self.attachments_dir
            .join(page_id)
            .join(attachment_id)
            .join(LATEST_VERSION_FILENAME)
    }
}

/// Attachment records grouped by the id of the page that owns them. Each
/// group keeps the order in which the attachments appear in the export.
#[derive(Debug, Clone, Default)]
pub struct AttachmentGroups {
    by_page: FxHashMap<String, Vec<AttachmentRecord>>,
}

impl AttachmentGroups {
    pub fn push(&mut self, page_id: impl Into<String>, record: AttachmentRecord) {
        self.by_page.entry(page_id.into()).or_default().push(record);
    }

    /// Attachments of a page; empty when it has none.
    pub fn for_page(&self, page_id: &str) -> &[AttachmentRecord] {
        self.by_page
            .get(page_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn page_count(&self) -> usize {
        self.by_page.len()
    }

    pub fn attachment_count(&self) -> usize {
        self.by_page.values().map(Vec::len).sum()
    }
}

struct PendingAttachment<'a> {
    page_id: &'a str,
    record: AttachmentRecord,
}

/// Resolves every `Attachment` object into a record and groups the records
/// by owning page. Attachments whose own id or owning page cannot be found
/// are dropped.
///
/// With a [`RestoreConfig`], each attachment's latest version is copied into
/// the restored layout. Copies run in parallel; a missing source or a failed
/// copy leaves `filepath` empty without affecting the rest of the batch.
pub fn assemble_attachments(
    buckets: &ObjectBuckets<'_>,
    index: &ExportIndex<'_>,
    restore: Option<&RestoreConfig>,
    stats: &ConversionStats,
) -> AttachmentGroups {
    let objects = buckets.get(CLASS_ATTACHMENT);

    let mut pending: Vec<PendingAttachment<'_>> = objects
        .iter()
        .filter_map(|obj| resolve_attachment(obj, index))
        .collect();

    let skipped = objects.len() - pending.len();
    stats.add_attachments_skipped(skipped as u64);
    debug!(found = objects.len(), skipped, "Resolved attachment records");

    if let Some(restore) = restore {
        // Each slot is filled in place, so completion order never affects
        // the per-page ordering.
        pending.par_iter_mut().for_each(|p| {
            if !p.record.filename.is_empty() {
                p.record.filepath = restore_attachment(restore, p.page_id, &p.record, stats);
            }
        });
        info!(
            restored = stats.attachments_restored(),
            missing = stats.attachments_missing(),
            failed = stats.restore_failures(),
            restore_dir = %restore.restore_dir.display(),
            "Attachment restore complete"
        );
    }

    let mut groups = AttachmentGroups::default();
    for p in pending {
        groups.push(p.page_id, p.record);
    }

    info!(
        pages = groups.page_count(),
        attachments = groups.attachment_count(),
        "Grouped attachments by page"
    );
    groups
}

fn resolve_attachment<'a>(
    obj: &ExportObject<'a>,
    index: &ExportIndex<'a>,
) -> Option<PendingAttachment<'a>> {
    let page_id = obj.container_id(&ATTACHMENT_CONTAINER_FIELDS);
    let attachment_id = obj.id("id");
    let (Some(page_id), Some(attachment_id)) = (page_id, attachment_id) else {
        debug!(
            ?page_id,
            ?attachment_id,
            "Skipping attachment: page id or attachment id not found"
        );
        return None;
    };

    let properties: FxHashMap<&str, &str> = obj
        .collection_element_ids("contentProperties")
        .filter_map(|property_id| index.property(property_id))
        .map(|p| (p.name, p.value))
        .collect();

    let filesize: i64 = properties
        .get(PROPERTY_FILESIZE)
        .and_then(|size| size.trim().parse().ok())
        .unwrap_or(0);
    let content_type = properties
        .get(PROPERTY_MEDIA_TYPE)
        .copied()
        .unwrap_or_default();

    let author = obj
        .nested_property_ref("creator", "key")
        .and_then(|key| index.user_name(key));

    Some(PendingAttachment {
        page_id,
        record: AttachmentRecord {
            id: attachment_id.to_string(),
            filename: obj.property("title").unwrap_or_default().to_string(),
            filesize,
            content_type: content_type.to_string(),
            author: author.map(str::to_string),
            created_at: obj.property("creationDate").unwrap_or_default().to_string(),
            filepath: None,
        },
    })
}

fn restore_attachment(
    restore: &RestoreConfig,
    page_id: &str,
    record: &AttachmentRecord,
    stats: &ConversionStats,
) -> Option<String> {
    let source = restore.source_path(page_id, &record.id);
    if !source.exists() {
        debug!(source = %source.display(), "Attachment source not found");
        stats.inc_attachments_missing();
        return None;
    }

    match copy_into(&source, &restore.restore_dir, page_id, &record.id, &record.filename) {
        Ok(dest) => {
            debug!(source = %source.display(), dest = %dest.display(), "Restored attachment");
            stats.inc_attachments_restored();
            Some(dest.to_string_lossy().into_owned())
        }
        Err(e) => {
            error!(
                attachment_id = %record.id,
                source = %source.display(),
                "Failed to restore attachment: {:#}",
                e
            );
            stats.inc_restore_failures();
            None
        }
    }
}

/// Copies `source` to `<restore_dir>/<page_id>/<attachment_id>/<filename>`,
/// keeping the source's modification time. The copy lands in a temporary
/// sibling first and is renamed into place, so the destination is either
/// complete or absent.
fn copy_into(
    source: &Path,
    restore_dir: &Path,
    page_id: &str,
    attachment_id: &str,
    filename: &str,
) -> Result<PathBuf> {
    if let Some(bad) = [page_id, attachment_id, filename]
        .into_iter()
        .find(|s| !is_plain_segment(s))
    {
        bail!("Refusing to restore to unsafe path segment {:?}", bad);
    }

    let dest_dir = restore_dir.join(page_id).join(attachment_id);
    fs::create_dir_all(&dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let dest = dest_dir.join(filename);
    // Unique per attachment directory.
    let tmp = dest_dir.join(RESTORE_TEMP_FILENAME);

    if let Err(e) = copy_with_mtime(source, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, &dest)
        .with_context(|| format!("Failed to move restored file to: {}", dest.display()))?;

    Ok(dest)
}

fn copy_with_mtime(source: &Path, dest: &Path) -> Result<()> {
    fs::copy(source, dest).with_context(|| format!("Failed to copy to: {}", dest.display()))?;

    let modified = fs::metadata(source)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to read modification time: {}", source.display()))?;
    File::options()
        .write(true)
        .open(dest)
        .and_then(|f| f.set_modified(modified))
        .with_context(|| format!("Failed to set modification time: {}", dest.display()))?;
    Ok(())
}

/// True for a single, ordinary path component (no separators, `.` or `..`).
fn is_plain_segment(segment: &str) -> bool {
    if segment.contains(std::path::is_separator) {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
