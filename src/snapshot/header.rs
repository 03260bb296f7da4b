//! snapshot/header — контейнерный заголовок снапшота.
//!
//! Формат: ["VMP"][format_type varint][page_size varint]
//! page_size == 4096 пишется как 0 (общий случай — один байт).

use anyhow::{anyhow, Result};

use crate::consts::{CANONICAL_PAGE_SIZE, FORMAT_SNAPSHOT_V1, SNAPSHOT_MAGIC};
use crate::varint;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub format_type: u64,
    /// Размер страницы по умолчанию (уже раскрытый: 0 в файле -> 4096).
    pub page_size: u64,
}

impl SnapshotHeader {
    pub fn new(page_size: u64) -> Self {
        Self {
            format_type: FORMAT_SNAPSHOT_V1,
            page_size,
        }
    }

    pub fn write_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(SNAPSHOT_MAGIC);
        varint::encode_into(self.format_type, out);
        let stored = if self.page_size == CANONICAL_PAGE_SIZE {
            0
        } else {
            self.page_size
        };
        varint::encode_into(stored, out);
    }

    /// Прочитать заголовок с начала buf. Возвращает (header, позиция первой записи).
    pub fn read(buf: &[u8]) -> Result<(Self, usize)> {
        let m = SNAPSHOT_MAGIC.len();
        if buf.len() < m || &buf[..m] != SNAPSHOT_MAGIC {
            return Err(anyhow!("snapshot parse error: bad magic (detected at byte 0)"));
        }

        let (format_type, pos) = varint::decode(buf, m, buf.len()).ok_or_else(|| {
            anyhow!("snapshot parse error: bad format type (detected at byte {})", m)
        })?;
        if format_type != FORMAT_SNAPSHOT_V1 {
            return Err(anyhow!(
                "snapshot parse error: unsupported format type {} (detected at byte {})",
                format_type,
                m
            ));
        }

        let (stored, pos2) = varint::decode(buf, pos, buf.len()).ok_or_else(|| {
            anyhow!("snapshot parse error: bad page size (detected at byte {})", pos)
        })?;
        let page_size = if stored == 0 {
            CANONICAL_PAGE_SIZE
        } else {
            stored
        };

        Ok((
            Self {
                format_type,
                page_size,
            },
            pos2,
        ))
    }
}
