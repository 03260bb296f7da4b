//! crawler — обход дерева файлов для снапшота.
//!
//! Crawler — итератор по обычным файлам под корнем:
//! - корень-файл отдаёт сам себя;
//! - каталоги обходятся в глубину, имена внутри каталога — в отсортированном порядке
//!   (снапшот одного и того же дерева детерминирован);
//! - symlink'и не разыменовываются, если не включён follow_symlinks
//!   (и даже тогда symlink на каталог не обходится — без циклов);
//! - прочие типы (fifo, socket, device) пропускаются.
//!
//! Ошибки ввода-вывода отдаются как Err-элементы; при crawl_skip_errors —
//! логируются и пропускаются.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use crate::config::VmSnapConfig;
use crate::metrics::record_crawl_skip;

pub struct Crawler {
    stack: Vec<PathBuf>,
    root_pending: bool,
    follow_symlinks: bool,
    skip_errors: bool,
}

impl Crawler {
    pub fn new(root: &Path, cfg: &VmSnapConfig) -> Self {
        Self {
            stack: vec![root.to_path_buf()],
            root_pending: true,
            follow_symlinks: cfg.follow_symlinks,
            skip_errors: cfg.crawl_skip_errors,
        }
    }

    /// Обработать один путь со стека: Some(item) — отдать наружу, None — идти дальше.
    fn visit(&mut self, path: PathBuf) -> Option<Result<(PathBuf, Metadata)>> {
        // Корень, названный явно, всегда разыменовываем.
        let is_root = std::mem::replace(&mut self.root_pending, false);
        let md = if is_root {
            fs::metadata(&path)
        } else {
            fs::symlink_metadata(&path)
        };
        let md = match md.with_context(|| format!("stat {}", path.display())) {
            Ok(m) => m,
            Err(e) => return self.fail(e),
        };

        let ft = md.file_type();
        if ft.is_symlink() {
            if !self.follow_symlinks {
                debug!("crawl: skip symlink {}", path.display());
                return None;
            }
            return match fs::metadata(&path) {
                Ok(target) if target.is_file() => Some(Ok((path, target))),
                Ok(_) => None,
                Err(e) => self.fail(anyhow::Error::new(e).context(format!("stat {}", path.display()))),
            };
        }

        if ft.is_dir() {
            match read_sorted(&path) {
                Ok(children) => self.stack.extend(children.into_iter().rev()),
                Err(e) => return self.fail(e),
            }
            return None;
        }

        if ft.is_file() {
            return Some(Ok((path, md)));
        }

        debug!("crawl: skip special file {}", path.display());
        None
    }

    fn fail(&self, e: anyhow::Error) -> Option<Result<(PathBuf, Metadata)>> {
        if self.skip_errors {
            record_crawl_skip();
            warn!("crawl: {:#}", e);
            None
        } else {
            Some(Err(e))
        }
    }
}

impl Iterator for Crawler {
    type Item = Result<(PathBuf, Metadata)>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(path) = self.stack.pop() {
            if let Some(item) = self.visit(path) {
                return Some(item);
            }
        }
        None
    }
}

fn read_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read_dir entry in {}", dir.display()))?;
        out.push(entry.path());
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_root(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("vmsnap-{}-{}-{}", prefix, pid, t))
    }

    #[test]
    fn walks_sorted_depth_first() -> Result<()> {
        let root = unique_root("crawl");
        fs::create_dir_all(root.join("b/inner"))?;
        fs::write(root.join("c.txt"), b"c")?;
        fs::write(root.join("a.txt"), b"a")?;
        fs::write(root.join("b/inner/x.bin"), b"x")?;
        fs::write(root.join("b/y.bin"), b"y")?;

        let cfg = VmSnapConfig::default();
        let got: Vec<PathBuf> = Crawler::new(&root, &cfg)
            .map(|r| r.map(|(p, _)| p))
            .collect::<Result<_>>()?;

        assert_eq!(
            got,
            vec![
                root.join("a.txt"),
                root.join("b/inner/x.bin"),
                root.join("b/y.bin"),
                root.join("c.txt"),
            ]
        );
        fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn file_root_yields_itself() -> Result<()> {
        let root = unique_root("crawl-file");
        fs::write(&root, b"data")?;
        let items: Vec<_> = Crawler::new(&root, &VmSnapConfig::default()).collect::<Result<_>>()?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0, root);
        assert_eq!(items[0].1.len(), 4);
        fs::remove_file(&root)?;
        Ok(())
    }

    #[test]
    fn missing_root_is_error_unless_skipped() {
        let root = unique_root("crawl-missing");
        let mut strict = Crawler::new(&root, &VmSnapConfig::default());
        assert!(matches!(strict.next(), Some(Err(_))));

        let cfg = VmSnapConfig::default().with_crawl_skip_errors(true);
        assert!(Crawler::new(&root, &cfg).next().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_skipped_by_default() -> Result<()> {
        let root = unique_root("crawl-link");
        fs::create_dir_all(&root)?;
        fs::write(root.join("real"), b"r")?;
        std::os::unix::fs::symlink(root.join("real"), root.join("link"))?;

        let n_default = Crawler::new(&root, &VmSnapConfig::default()).count();
        assert_eq!(n_default, 1);

        let cfg = VmSnapConfig::default().with_follow_symlinks(true);
        let n_follow = Crawler::new(&root, &cfg).count();
        assert_eq!(n_follow, 2);

        fs::remove_dir_all(&root)?;
        Ok(())
    }
}
