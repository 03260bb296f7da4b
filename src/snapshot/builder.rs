//! snapshot/builder — сборка снапшота (append-only буфер).
//!
//! Запись одного элемента:
//!   [record_len varint]
//!   [filename_len varint][filename]
//!   [file_size varint][resident_pages varint]
//!   [bucket_size varint]   -- 0, если bucket_size == 4096
//!   [num_buckets varint][bitfield bytes]
//!
//! record_len считается заранее через varint::encoded_len, поэтому запись
//! пишется сразу в выходной буфер без промежуточной копии.

use anyhow::{Context, Result};
use log::{debug, info};
use std::path::Path;

use crate::cache::{page_size, CachedFile, ResidencyTarget};
use crate::config::VmSnapConfig;
use crate::consts::CANONICAL_PAGE_SIZE;
use crate::crawler::Crawler;
use crate::metrics::{record_bytes_encoded, record_file_snapshotted};
use crate::util::path_to_bytes;
use crate::varint;

use super::element::Element;
use super::header::SnapshotHeader;

pub struct SnapshotBuilder {
    buf: Vec<u8>,
    header: SnapshotHeader,
    elements: u64,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    /// Пустой снапшот с заголовком под системный размер страницы.
    pub fn new() -> Self {
        Self::with_page_size(page_size())
    }

    pub fn with_page_size(ps: u64) -> Self {
        let header = SnapshotHeader::new(ps);
        let mut buf = Vec::new();
        header.write_into(&mut buf);
        Self {
            buf,
            header,
            elements: 0,
        }
    }

    /// Построить снапшот по дереву root.
    pub fn from_path(root: &Path, cfg: &VmSnapConfig) -> Result<Self> {
        let mut b = Self::new();
        b.crawl(root, cfg)?;
        Ok(b)
    }

    /// Обойти root и добавить по записи на каждый обычный файл.
    /// Возвращает число добавленных файлов.
    pub fn crawl(&mut self, root: &Path, cfg: &VmSnapConfig) -> Result<u64> {
        let before = self.elements;
        let bytes_before = self.buf.len();
        for item in Crawler::new(root, cfg) {
            let (path, _md) = item?;
            self.add_file(&path)?;
        }
        let added = self.elements - before;
        info!(
            "snapshot: crawled {} -> {} file(s), {} B",
            root.display(),
            added,
            self.buf.len() - bytes_before
        );
        Ok(added)
    }

    /// Снять mincore с одного файла и дописать запись.
    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        let f = CachedFile::open(path)?;
        let r = f
            .mincore()
            .with_context(|| format!("residency of {}", path.display()))?;
        let name = path_to_bytes(path);

        let elem = Element {
            filename: &name,
            file_size: f.size(),
            resident_pages: r.resident_pages,
            bitfield: r.bitfield(),
        };
        self.add_element(&elem);

        record_file_snapshotted(r.num_pages, r.resident_pages);
        debug!(
            "snapshot: {} size={} pages={} resident={}",
            path.display(),
            elem.file_size,
            r.num_pages,
            r.resident_pages
        );
        Ok(())
    }

    /// Дописать готовый элемент. Вызывающий гарантирует
    /// data.len() == ceil(num_buckets / 8).
    pub fn add_element(&mut self, elem: &Element<'_>) {
        let bf = &elem.bitfield;
        let bucket_size = if bf.bucket_size == CANONICAL_PAGE_SIZE {
            0
        } else {
            bf.bucket_size
        };
        let name_len = elem.filename.len() as u64;

        let record_len = varint::encoded_len(name_len)
            + elem.filename.len()
            + varint::encoded_len(elem.file_size)
            + varint::encoded_len(elem.resident_pages)
            + varint::encoded_len(bucket_size)
            + varint::encoded_len(bf.num_buckets)
            + bf.data.len();

        let start = self.buf.len();
        self.buf.reserve(record_len + varint::encoded_len(record_len as u64));
        varint::encode_into(record_len as u64, &mut self.buf);
        varint::encode_into(name_len, &mut self.buf);
        self.buf.extend_from_slice(elem.filename);
        varint::encode_into(elem.file_size, &mut self.buf);
        varint::encode_into(elem.resident_pages, &mut self.buf);
        varint::encode_into(bucket_size, &mut self.buf);
        varint::encode_into(bf.num_buckets, &mut self.buf);
        self.buf.extend_from_slice(bf.data);

        self.elements += 1;
        record_bytes_encoded(self.buf.len() - start);
    }

    pub fn header(&self) -> &SnapshotHeader {
        &self.header
    }

    pub fn element_count(&self) -> u64 {
        self.elements
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
