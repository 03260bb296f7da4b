//! snapshot/file — сохранение и загрузка снапшота с диска.
//!
//! save_snapshot(): запись в "<path>.tmp", fsync, rename поверх <path>.
//! Пока идёт запись, держится эксклюзивный lock "<path>.lock"; load_snapshot()
//! берёт shared lock, поэтому никогда не видит недописанный файл.
//! default_snapshot_path(): имя по умолчанию "<имя корня>.vmsnap" в текущем каталоге.

use anyhow::{anyhow, Context, Result};
use log::debug;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::consts::{SNAPSHOT_EXT, SNAPSHOT_MAGIC, SNAPSHOT_TMP_SUFFIX};
use crate::lock::{acquire_lock, LockMode};

fn tmp_path_of(path: &Path) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(SNAPSHOT_TMP_SUFFIX);
    PathBuf::from(s)
}

/// Куда писать снапшот, если --out не задан: "<последний компонент root>.vmsnap".
/// Расширение дописывается, а не заменяется ("data.db" -> "data.db.vmsnap").
pub fn default_snapshot_path(root: &Path) -> PathBuf {
    let mut name: OsString = match root.file_name() {
        Some(n) => n.to_owned(),
        None => OsString::from("root"),
    };
    name.push(".");
    name.push(SNAPSHOT_EXT);
    PathBuf::from(name)
}

/// Атомарно записать снапшот в path.
pub fn save_snapshot(path: &Path, bytes: &[u8]) -> Result<()> {
    if bytes.len() < SNAPSHOT_MAGIC.len() || &bytes[..SNAPSHOT_MAGIC.len()] != SNAPSHOT_MAGIC {
        return Err(anyhow!("refusing to save buffer without snapshot header"));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }

    let _guard = acquire_lock(path, LockMode::Exclusive)?;

    let tmp = tmp_path_of(path);
    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .with_context(|| format!("open {}", tmp.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("write {}", tmp.display()))?;
        f.sync_all()
            .with_context(|| format!("fsync {}", tmp.display()))?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;

    debug!("snapshot saved: {} ({} B)", path.display(), bytes.len());
    Ok(())
}

/// Прочитать снапшот целиком.
pub fn load_snapshot(path: &Path) -> Result<Vec<u8>> {
    let _guard = acquire_lock(path, LockMode::Shared)?;
    let mut f = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("open snapshot {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)
        .with_context(|| format!("read snapshot {}", path.display()))?;
    debug!("snapshot loaded: {} ({} B)", path.display(), buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() -> Result<()> {
        let pid = std::process::id();
        let dir = std::env::temp_dir().join(format!("vmsnap-file-{}", pid));
        let path = dir.join("a.vmsnap");
        let bytes = b"VMP\x01\x00payload".to_vec();

        save_snapshot(&path, &bytes)?;
        assert!(!tmp_path_of(&path).exists());
        assert_eq!(load_snapshot(&path)?, bytes);

        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn default_path_appends_extension() {
        assert_eq!(
            default_snapshot_path(Path::new("/var/lib/pg")),
            Path::new("pg.vmsnap")
        );
        assert_eq!(
            default_snapshot_path(Path::new("data.db")),
            Path::new("data.db.vmsnap")
        );
        assert_eq!(default_snapshot_path(Path::new("/")), Path::new("root.vmsnap"));
    }

    #[test]
    fn refuses_headerless_buffer() {
        let path = std::env::temp_dir().join("vmsnap-never-written.vmsnap");
        assert!(save_snapshot(&path, b"nope").is_err());
        assert!(!path.exists());
    }
}
