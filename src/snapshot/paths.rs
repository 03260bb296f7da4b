//! snapshot/paths — политика путей при восстановлении.
//!
//! Имена в снапшоте — произвольные байты. Перед открытием файла:
//! - пустое имя и имя с NUL отклоняются;
//! - путь нормализуется лексически ("." и повторные "/" убираются);
//! - ".." отклоняется, если не разрешено allow_unsafe_paths;
//! - при restore_root путь переносится под него (ведущий "/" отбрасывается).
//!
//! Отклонённая запись пропускается (warn), восстановление продолжается.

use std::fmt;
use std::path::{Component, PathBuf};

use crate::config::VmSnapConfig;
use crate::util::bytes_to_path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathRejection {
    Empty,
    NulByte,
    ParentComponent,
}

impl fmt::Display for PathRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRejection::Empty => write!(f, "empty path"),
            PathRejection::NulByte => write!(f, "path contains NUL byte"),
            PathRejection::ParentComponent => write!(f, "path contains '..' component"),
        }
    }
}

/// Превратить имя из снапшота в путь для открытия.
pub fn resolve_restore_path(name: &[u8], cfg: &VmSnapConfig) -> Result<PathBuf, PathRejection> {
    if name.contains(&0) {
        return Err(PathRejection::NulByte);
    }
    let raw = bytes_to_path(name);

    let mut out = PathBuf::new();
    let mut has_name = false;
    for c in raw.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cfg.allow_unsafe_paths {
                    return Err(PathRejection::ParentComponent);
                }
                out.push("..");
            }
            Component::RootDir | Component::Prefix(_) => {
                if cfg.restore_root.is_none() {
                    out.push(c.as_os_str());
                }
            }
            Component::Normal(part) => {
                has_name = true;
                out.push(part);
            }
        }
    }
    if !has_name {
        return Err(PathRejection::Empty);
    }

    Ok(match &cfg.restore_root {
        Some(root) => root.join(out),
        None => out,
    })
}
