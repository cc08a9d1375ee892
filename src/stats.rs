use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected while converting an export. Attachment restores run
/// on several threads, so every counter is atomic.
#[derive(Debug, Default)]
pub struct ConversionStats {
    pub objects_classified: AtomicU64,
    pub content_records: AtomicU64,
    pub attachments_skipped: AtomicU64,
    pub attachments_restored: AtomicU64,
    pub attachments_missing: AtomicU64,
    pub restore_failures: AtomicU64,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_objects_classified(&self, count: u64) {
        self.objects_classified.store(count, Ordering::Relaxed);
    }

    pub fn set_content_records(&self, count: u64) {
        self.content_records.store(count, Ordering::Relaxed);
    }

    pub fn add_attachments_skipped(&self, count: u64) {
        self.attachments_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_attachments_restored(&self) {
        self.attachments_restored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_attachments_missing(&self) {
        self.attachments_missing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_restore_failures(&self) {
        self.restore_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn objects_classified(&self) -> u64 {
        self.objects_classified.load(Ordering::Relaxed)
    }

    pub fn content_records(&self) -> u64 {
        self.content_records.load(Ordering::Relaxed)
    }

    pub fn attachments_skipped(&self) -> u64 {
        self.attachments_skipped.load(Ordering::Relaxed)
    }

    pub fn attachments_restored(&self) -> u64 {
        self.attachments_restored.load(Ordering::Relaxed)
    }

    pub fn attachments_missing(&self) -> u64 {
        self.attachments_missing.load(Ordering::Relaxed)
    }

    pub fn restore_failures(&self) -> u64 {
        self.restore_failures.load(Ordering::Relaxed)
    }
}
