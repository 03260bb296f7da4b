//! Lightweight global metrics for VmSnap.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Snapshot build (crawl + encode)
//! - Parse
//! - Restore (touch/evict)
//! - OS hints (ошибки madvise/fadvise)

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- Build -----
static FILES_SNAPSHOTTED: AtomicU64 = AtomicU64::new(0);
static FILES_CRAWL_SKIPPED: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_BYTES_ENCODED: AtomicU64 = AtomicU64::new(0);
static PAGES_SCANNED: AtomicU64 = AtomicU64::new(0);
static PAGES_RESIDENT: AtomicU64 = AtomicU64::new(0);

// ----- Parse -----
static RECORDS_PARSED: AtomicU64 = AtomicU64::new(0);
static PARSE_ERRORS: AtomicU64 = AtomicU64::new(0);

// ----- Restore -----
static FILES_RESTORED: AtomicU64 = AtomicU64::new(0);
static FILES_RESTORE_SKIPPED: AtomicU64 = AtomicU64::new(0);
static TOUCH_CALLS: AtomicU64 = AtomicU64::new(0);
static TOUCH_BYTES: AtomicU64 = AtomicU64::new(0);
static EVICT_CALLS: AtomicU64 = AtomicU64::new(0);
static EVICT_BYTES: AtomicU64 = AtomicU64::new(0);

// ----- OS hints -----
static HINT_FAILURES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // Build
    pub files_snapshotted: u64,
    pub files_crawl_skipped: u64,
    pub snapshot_bytes_encoded: u64,
    pub pages_scanned: u64,
    pub pages_resident: u64,

    // Parse
    pub records_parsed: u64,
    pub parse_errors: u64,

    // Restore
    pub files_restored: u64,
    pub files_restore_skipped: u64,
    pub touch_calls: u64,
    pub touch_bytes: u64,
    pub evict_calls: u64,
    pub evict_bytes: u64,

    // OS hints
    pub hint_failures: u64,
}

impl MetricsSnapshot {
    pub fn resident_ratio(&self) -> f64 {
        if self.pages_scanned == 0 {
            0.0
        } else {
            self.pages_resident as f64 / self.pages_scanned as f64
        }
    }
}

// ----- Recorders (Build) -----
pub fn record_file_snapshotted(pages: u64, resident: u64) {
    FILES_SNAPSHOTTED.fetch_add(1, Ordering::Relaxed);
    PAGES_SCANNED.fetch_add(pages, Ordering::Relaxed);
    PAGES_RESIDENT.fetch_add(resident, Ordering::Relaxed);
}

pub fn record_crawl_skip() {
    FILES_CRAWL_SKIPPED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_bytes_encoded(bytes: usize) {
    SNAPSHOT_BYTES_ENCODED.fetch_add(bytes as u64, Ordering::Relaxed);
}

// ----- Recorders (Parse) -----
pub fn record_record_parsed() {
    RECORDS_PARSED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_parse_error() {
    PARSE_ERRORS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Restore) -----
pub fn record_file_restored() {
    FILES_RESTORED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_restore_skip() {
    FILES_RESTORE_SKIPPED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_touch(bytes: u64) {
    TOUCH_CALLS.fetch_add(1, Ordering::Relaxed);
    TOUCH_BYTES.fetch_add(bytes, Ordering::Relaxed);
}

pub fn record_evict(bytes: u64) {
    EVICT_CALLS.fetch_add(1, Ordering::Relaxed);
    EVICT_BYTES.fetch_add(bytes, Ordering::Relaxed);
}

// ----- Recorders (OS hints) -----
pub fn record_hint_failure() {
    HINT_FAILURES.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        files_snapshotted: FILES_SNAPSHOTTED.load(Ordering::Relaxed),
        files_crawl_skipped: FILES_CRAWL_SKIPPED.load(Ordering::Relaxed),
        snapshot_bytes_encoded: SNAPSHOT_BYTES_ENCODED.load(Ordering::Relaxed),
        pages_scanned: PAGES_SCANNED.load(Ordering::Relaxed),
        pages_resident: PAGES_RESIDENT.load(Ordering::Relaxed),

        records_parsed: RECORDS_PARSED.load(Ordering::Relaxed),
        parse_errors: PARSE_ERRORS.load(Ordering::Relaxed),

        files_restored: FILES_RESTORED.load(Ordering::Relaxed),
        files_restore_skipped: FILES_RESTORE_SKIPPED.load(Ordering::Relaxed),
        touch_calls: TOUCH_CALLS.load(Ordering::Relaxed),
        touch_bytes: TOUCH_BYTES.load(Ordering::Relaxed),
        evict_calls: EVICT_CALLS.load(Ordering::Relaxed),
        evict_bytes: EVICT_BYTES.load(Ordering::Relaxed),

        hint_failures: HINT_FAILURES.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    FILES_SNAPSHOTTED.store(0, Ordering::Relaxed);
    FILES_CRAWL_SKIPPED.store(0, Ordering::Relaxed);
    SNAPSHOT_BYTES_ENCODED.store(0, Ordering::Relaxed);
    PAGES_SCANNED.store(0, Ordering::Relaxed);
    PAGES_RESIDENT.store(0, Ordering::Relaxed);

    RECORDS_PARSED.store(0, Ordering::Relaxed);
    PARSE_ERRORS.store(0, Ordering::Relaxed);

    FILES_RESTORED.store(0, Ordering::Relaxed);
    FILES_RESTORE_SKIPPED.store(0, Ordering::Relaxed);
    TOUCH_CALLS.store(0, Ordering::Relaxed);
    TOUCH_BYTES.store(0, Ordering::Relaxed);
    EVICT_CALLS.store(0, Ordering::Relaxed);
    EVICT_BYTES.store(0, Ordering::Relaxed);

    HINT_FAILURES.store(0, Ordering::Relaxed);
}
