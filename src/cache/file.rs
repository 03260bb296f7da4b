//! cache/file — CachedFile: открытый и замапленный файл для работы с page cache.
//!
//! Операции:
//! - open(): RO-open + mmap всего файла (пустые файлы не мапятся).
//! - mincore(): побитовая карта резидентных страниц.
//! - advise(): madvise на весь map + posix_fadvise на fd (Linux).
//! - touch(): MADV_WILLNEED на диапазон и чтение одного байта с каждой страницы.
//! - evict(): POSIX_FADV_DONTNEED на диапазон. Только Linux: на других
//!   платформах вызов ничего не делает и учитывается как hint_failures.
//!
//! Ошибки open/mmap/mincore возвращаются вызывающему коду. Ошибки hint-вызовов
//! только логируются (warn!) и считаются в metrics.

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use memmap2::{Mmap, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

use crate::bitfield::{pack_bits, Bitfield};
use crate::metrics::record_hint_failure;

use super::pageutils::{page_size, pages_for};
use super::{Advice, ResidencyTarget};

/// Результат mincore по одному файлу.
#[derive(Debug, Clone, Default)]
pub struct MincoreResult {
    pub page_size: u64,
    pub num_pages: u64,
    pub resident_pages: u64,
    /// Упакованные биты (LSB first), ceil(num_pages / 8) байт.
    pub bitfield: Vec<u8>,
}

impl MincoreResult {
    pub fn bitfield(&self) -> Bitfield<'_> {
        Bitfield::new(self.page_size, self.num_pages, &self.bitfield)
    }
}

pub struct CachedFile {
    path: PathBuf,
    file: File,
    size: u64,
    map: Option<Mmap>,
}

impl CachedFile {
    /// Открыть файл на чтение и замапить его целиком.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .with_context(|| format!("open {}", path.display()))?;
        let size = file
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?
            .len();

        let map = if size == 0 {
            None
        } else {
            let len = usize::try_from(size)
                .map_err(|_| anyhow!("file too large to map: {} ({} B)", path.display(), size))?;
            // SAFETY: map только на чтение; содержимое читается лишь точечно (touch).
            // Усечение файла другим процессом во время работы даст SIGBUS — это
            // то же ограничение, что у любого mmap-чтения.
            let m = unsafe {
                MmapOptions::new()
                    .len(len)
                    .map(&file)
                    .with_context(|| format!("mmap {}", path.display()))?
            };
            Some(m)
        };

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
            map,
        })
    }

    /// Карта резидентности страниц файла.
    pub fn mincore(&self) -> Result<MincoreResult> {
        let ps = page_size();
        let map = match &self.map {
            Some(m) => m,
            None => {
                return Ok(MincoreResult {
                    page_size: ps,
                    ..Default::default()
                })
            }
        };

        let num_pages = pages_for(map.len() as u64, ps);
        let mut vec = vec![0u8; num_pages as usize];
        mincore_raw(map, &mut vec)
            .with_context(|| format!("mincore {}", self.path.display()))?;

        let resident_pages = vec.iter().filter(|b| **b & 1 == 1).count() as u64;
        let bitfield = pack_bits(vec.iter().map(|b| b & 1 == 1));

        Ok(MincoreResult {
            page_size: ps,
            num_pages,
            resident_pages,
            bitfield,
        })
    }

    /// Границы [offset, offset+len), обрезанные по размеру map.
    fn clip(&self, offset: u64, len: u64) -> Option<(usize, usize)> {
        let end = offset.saturating_add(len).min(self.size);
        if offset >= end {
            return None;
        }
        Some((offset as usize, (end - offset) as usize))
    }

    fn hint_failed(&self, what: &str, err: std::io::Error) {
        record_hint_failure();
        warn!("{} {}: {}", what, self.path.display(), err);
    }
}

impl ResidencyTarget for CachedFile {
    fn size(&self) -> u64 {
        self.size
    }

    fn advise(&mut self, advice: Advice) {
        let Some(map) = &self.map else { return };
        let mm_advice = match advice {
            Advice::Random => memmap2::Advice::Random,
            Advice::Normal => memmap2::Advice::Normal,
        };
        if let Err(e) = map.advise(mm_advice) {
            self.hint_failed("madvise", e);
        }

        #[cfg(target_os = "linux")]
        {
            let fadv = match advice {
                Advice::Random => libc::POSIX_FADV_RANDOM,
                Advice::Normal => libc::POSIX_FADV_NORMAL,
            };
            // SAFETY: fd валиден, пока жив self.file.
            let rc = unsafe { libc::posix_fadvise(self.file.as_raw_fd(), 0, 0, fadv) };
            if rc != 0 {
                self.hint_failed("posix_fadvise", std::io::Error::from_raw_os_error(rc));
            }
        }
    }

    fn touch(&mut self, offset: u64, len: u64) {
        let Some((off, n)) = self.clip(offset, len) else { return };
        let Some(map) = &self.map else { return };

        if let Err(e) = map.advise_range(memmap2::Advice::WillNeed, off, n) {
            self.hint_failed("madvise(WILLNEED)", e);
        }

        // WILLNEED асинхронный; чтение по байту со страницы гарантирует загрузку.
        for pos in page_starts(off, off + n, page_size() as usize) {
            std::hint::black_box(map[pos]);
        }
        debug!("touch {} [{}, +{})", self.path.display(), off, n);
    }

    fn evict(&mut self, offset: u64, len: u64) {
        let Some((off, n)) = self.clip(offset, len) else { return };

        #[cfg(target_os = "linux")]
        {
            // SAFETY: fd валиден; off/n обрезаны по размеру файла.
            let rc = unsafe {
                libc::posix_fadvise(
                    self.file.as_raw_fd(),
                    off as libc::off_t,
                    n as libc::off_t,
                    libc::POSIX_FADV_DONTNEED,
                )
            };
            if rc != 0 {
                self.hint_failed("posix_fadvise(DONTNEED)", std::io::Error::from_raw_os_error(rc));
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            // Без posix_fadvise вытеснить страницы нечем: считаем как несработавший hint.
            record_hint_failure();
            debug!("evict unsupported on this platform: {}", self.path.display());
        }
        debug!("evict {} [{}, +{})", self.path.display(), off, n);
    }
}

/// Начала всех страниц, пересекающихся с [off, end). off не обязан быть выровнен:
/// страница с off тоже входит.
fn page_starts(off: usize, end: usize, ps: usize) -> impl Iterator<Item = usize> {
    let start = if off < end { off - off % ps } else { end };
    (start..end).step_by(ps)
}

#[cfg(unix)]
fn mincore_raw(map: &Mmap, vec: &mut [u8]) -> Result<()> {
    // SAFETY: map.as_ptr() выровнен по странице (mmap с offset=0), vec имеет
    // ровно ceil(len / page_size) элементов, как требует mincore(2).
    let rc = unsafe {
        libc::mincore(
            map.as_ptr() as *mut libc::c_void,
            map.len(),
            vec.as_mut_ptr() as *mut _,
        )
    };
    if rc != 0 {
        return Err(anyhow!("{}", std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn mincore_raw(_map: &Mmap, _vec: &mut [u8]) -> Result<()> {
    Err(anyhow!("mincore is not supported on this platform"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn unique_path(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("vmsnap-{}-{}-{}", prefix, pid, t))
    }

    #[test]
    fn empty_file_has_no_pages() -> Result<()> {
        let p = unique_path("cf-empty");
        File::create(&p)?;
        let f = CachedFile::open(&p)?;
        assert_eq!(f.size(), 0);
        let r = f.mincore()?;
        assert_eq!(r.num_pages, 0);
        assert_eq!(r.resident_pages, 0);
        assert!(r.bitfield.is_empty());
        std::fs::remove_file(&p)?;
        Ok(())
    }

    #[test]
    fn touched_file_reports_resident_pages() -> Result<()> {
        let p = unique_path("cf-touch");
        let ps = page_size() as usize;
        {
            let mut f = File::create(&p)?;
            f.write_all(&vec![0x5Au8; ps * 3 + 100])?;
            f.sync_all()?;
        }
        let mut f = CachedFile::open(&p)?;
        f.advise(Advice::Random);
        f.touch(0, f.size());
        f.advise(Advice::Normal);

        let r = f.mincore()?;
        assert_eq!(r.num_pages, 4);
        assert_eq!(r.bitfield.len(), 1);
        assert_eq!(r.bitfield().num_buckets, 4);
        // После touch все страницы только что прочитаны и должны быть в кэше.
        assert_eq!(r.resident_pages, 4);
        std::fs::remove_file(&p)?;
        Ok(())
    }

    #[test]
    fn page_starts_cover_unaligned_ranges() {
        // 4096-bucket диапазон на хосте с 16K-страницами: задеты обе страницы.
        let v: Vec<usize> = page_starts(12288, 20480, 16384).collect();
        assert_eq!(v, vec![0, 16384]);

        let v: Vec<usize> = page_starts(100, 4096 * 2 + 1, 4096).collect();
        assert_eq!(v, vec![0, 4096, 8192]);

        let v: Vec<usize> = page_starts(16384, 32768, 16384).collect();
        assert_eq!(v, vec![16384]);

        assert_eq!(page_starts(5, 5, 4096).count(), 0);
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn evict_without_fadvise_counts_hint_failure() -> Result<()> {
        let p = unique_path("cf-evict");
        std::fs::write(&p, vec![1u8; 8192])?;
        let mut f = CachedFile::open(&p)?;
        let before = crate::metrics::snapshot().hint_failures;
        f.evict(0, 8192);
        assert!(crate::metrics::snapshot().hint_failures > before);
        std::fs::remove_file(&p)?;
        Ok(())
    }

    #[test]
    fn ranges_past_eof_are_ignored() -> Result<()> {
        let p = unique_path("cf-clip");
        std::fs::write(&p, b"abc")?;
        let mut f = CachedFile::open(&p)?;
        f.touch(10, 4096);
        f.evict(3, 1);
        assert_eq!(f.clip(0, 4096), Some((0, 3)));
        assert_eq!(f.clip(3, 10), None);
        std::fs::remove_file(&p)?;
        Ok(())
    }
}
