//! snapshot — формат снапшота резидентности и его восстановление.
//!
//! Раскладка:
//! - header:  контейнерный заголовок ("VMP", тип, page size)
//! - element: Element<'a> — view одной записи
//! - builder: SnapshotBuilder — append-only сборка (crawl + mincore)
//! - parser:  Parser<'a> — итератор по записям с проверкой границ
//! - restore: restore_residency / restore_buffer
//! - paths:   политика путей при восстановлении
//! - file:    save/load с диска под fs2-локом
//! - summary: сводка для inspect

pub mod builder;
pub mod element;
pub mod file;
pub mod header;
pub mod parser;
pub mod paths;
pub mod restore;
pub mod summary;

use anyhow::Result;

pub use builder::SnapshotBuilder;
pub use element::Element;
pub use file::{default_snapshot_path, load_snapshot, save_snapshot};
pub use header::SnapshotHeader;
pub use parser::{LengthField, ParseError, ParseErrorKind, Parser};
pub use paths::{resolve_restore_path, PathRejection};
pub use restore::{restore, restore_buffer, restore_file, restore_residency, RangeStats, RestoreReport};
pub use summary::{list_elements, summarize, ElementInfo, SnapshotSummary};

/// Прочитать заголовок и вернуть parser, стоящий на первой записи.
pub fn open(buf: &[u8]) -> Result<(SnapshotHeader, Parser<'_>)> {
    let (header, start) = SnapshotHeader::read(buf)?;
    Ok((header, Parser::at(buf, start)))
}
