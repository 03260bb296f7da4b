//! Размер системной страницы (sysconf), кэшируется на процесс.

use std::sync::OnceLock;

use crate::consts::CANONICAL_PAGE_SIZE;

static PAGE_SIZE: OnceLock<u64> = OnceLock::new();

/// Системный размер страницы в байтах. При ошибке sysconf — 4096.
pub fn page_size() -> u64 {
    *PAGE_SIZE.get_or_init(|| {
        #[cfg(unix)]
        {
            // SAFETY: sysconf не имеет предусловий.
            let ps = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
            if ps > 0 {
                return ps as u64;
            }
        }
        CANONICAL_PAGE_SIZE
    })
}

/// Число страниц размера ps, покрывающих len байт.
#[inline]
pub fn pages_for(len: u64, ps: u64) -> u64 {
    if ps == 0 {
        return 0;
    }
    len / ps + u64::from(len % ps != 0)
}
