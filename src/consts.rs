//! Общие константы формата снапшота (container header, records, page size).

// -------- Container header --------
// [magic "VMP"][format_type varint][default_page_size varint]
pub const SNAPSHOT_MAGIC: &[u8; 3] = b"VMP";

// Типы контейнера. Пока существует только снапшот v1.
pub const FORMAT_SNAPSHOT_V1: u64 = 1;

// -------- Page size --------
// Каноническая страница: в записи и заголовке хранится как 0.
pub const CANONICAL_PAGE_SIZE: u64 = 4096;

// -------- Varint (LEB128) --------
// u64 занимает максимум 10 байт (10 * 7 = 70 бит >= 64).
pub const VARINT_MAX_LEN: usize = 10;

// -------- Snapshot files --------
pub const SNAPSHOT_EXT: &str = "vmsnap";
pub const SNAPSHOT_TMP_SUFFIX: &str = ".tmp";
