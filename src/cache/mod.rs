//! cache — примитивы page cache: mincore, advise, touch, evict.
//!
//! - ResidencyTarget: узкий интерфейс, который нужен алгоритму восстановления.
//!   Реальная реализация — CachedFile (mmap + libc); в тестах — запись вызовов.
//! - pageutils: размер системной страницы.
//!
//! Все hint-вызовы — просьбы к ОС, а не гарантии. Их ошибки логируются и
//! считаются в metrics, но не прерывают восстановление.

pub mod file;
pub mod pageutils;

pub use file::{CachedFile, MincoreResult};
pub use pageutils::page_size;

/// Подсказка о шаблоне доступа к файлу.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advice {
    /// Отключить readahead на время восстановления.
    Random,
    /// Вернуть поведение по умолчанию.
    Normal,
}

/// Файл, резидентность страниц которого можно менять по диапазонам байт.
pub trait ResidencyTarget {
    /// Текущий размер файла в байтах.
    fn size(&self) -> u64;

    fn advise(&mut self, advice: Advice);

    /// Загрузить [offset, offset+len) в page cache.
    fn touch(&mut self, offset: u64, len: u64);

    /// Вытеснить [offset, offset+len) из page cache.
    fn evict(&mut self, offset: u64, len: u64);
}
