//! snapshot/summary — сводка и листинг содержимого снапшота (для inspect).

use anyhow::Result;
use serde::Serialize;

use super::element::Element;
use super::header::SnapshotHeader;
use super::parser::Parser;

#[derive(Clone, Debug, Default, Serialize)]
pub struct SnapshotSummary {
    pub format_type: u64,
    pub page_size: u64,
    pub snapshot_bytes: u64,
    pub files: u64,
    pub total_file_bytes: u64,
    pub total_pages: u64,
    pub resident_pages: u64,
    /// Оценка: resident_pages * stride, не больше размера файла.
    pub resident_bytes: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ElementInfo {
    pub filename: String,
    pub file_size: u64,
    pub resident_pages: u64,
    pub bucket_size: u64,
    pub num_buckets: u64,
    /// Число диапазонов touch/evict, которое даст восстановление без усечения.
    pub runs: u64,
}

impl From<&Element<'_>> for ElementInfo {
    fn from(e: &Element<'_>) -> Self {
        Self {
            filename: e.display_name(),
            file_size: e.file_size,
            resident_pages: e.resident_pages,
            bucket_size: e.bitfield.stride(),
            num_buckets: e.bitfield.num_buckets,
            runs: e.bitfield.runs(),
        }
    }
}

/// Полный проход по снапшоту с подсчётом итогов.
pub fn summarize(buf: &[u8]) -> Result<SnapshotSummary> {
    let (header, start) = SnapshotHeader::read(buf)?;
    let mut s = SnapshotSummary {
        format_type: header.format_type,
        page_size: header.page_size,
        snapshot_bytes: buf.len() as u64,
        ..Default::default()
    };
    Parser::at(buf, start).process(|e| {
        s.files += 1;
        s.total_file_bytes = s.total_file_bytes.saturating_add(e.file_size);
        s.total_pages = s.total_pages.saturating_add(e.bitfield.num_buckets);
        s.resident_pages = s.resident_pages.saturating_add(e.resident_pages);
        let est = e
            .resident_pages
            .saturating_mul(e.bitfield.stride())
            .min(e.file_size);
        s.resident_bytes = s.resident_bytes.saturating_add(est);
        Ok(())
    })?;
    Ok(s)
}

/// Листинг записей снапшота.
pub fn list_elements(buf: &[u8]) -> Result<Vec<ElementInfo>> {
    let (_header, start) = SnapshotHeader::read(buf)?;
    let mut out = Vec::new();
    Parser::at(buf, start).process(|e| {
        out.push(ElementInfo::from(e));
        Ok(())
    })?;
    Ok(out)
}
