//! Centralized configuration and builder for VmSnap.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - VmSnapConfig::from_env() reads VMSNAP_* variables.
//! - ConfigBuilder returns a VmSnapConfig which crawl/restore consume.
//!
//! Crawl:
//! - follow_symlinks (ENV VMSNAP_FOLLOW_SYMLINKS)
//! - crawl_skip_errors (ENV VMSNAP_CRAWL_SKIP_ERRORS)
//!
//! Restore:
//! - skip_missing (ENV VMSNAP_SKIP_MISSING)
//! - allow_unsafe_paths (ENV VMSNAP_ALLOW_UNSAFE_PATHS)
//! - restore_root (ENV VMSNAP_RESTORE_ROOT)

use std::fmt;
use std::path::PathBuf;

/// Top-level configuration for snapshot build and restore.
#[derive(Clone, Debug, Default)]
pub struct VmSnapConfig {
    /// Follow symlinks to regular files while crawling.
    /// Env: VMSNAP_FOLLOW_SYMLINKS (default false)
    pub follow_symlinks: bool,

    /// Log and skip unreadable entries during crawl instead of failing.
    /// Env: VMSNAP_CRAWL_SKIP_ERRORS (default false)
    pub crawl_skip_errors: bool,

    /// Skip records whose file no longer exists at restore time.
    /// Env: VMSNAP_SKIP_MISSING (default false)
    pub skip_missing: bool,

    /// Disable the restore path policy (allow ".." components).
    /// Env: VMSNAP_ALLOW_UNSAFE_PATHS (default false)
    pub allow_unsafe_paths: bool,

    /// Rebase stored paths under this directory at restore time.
    /// Env: VMSNAP_RESTORE_ROOT (default None)
    pub restore_root: Option<PathBuf>,
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        let s = v.trim().to_ascii_lowercase();
        s == "1" || s == "true" || s == "yes" || s == "on"
    })
}

impl VmSnapConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        // ----- crawl -----
        if let Some(on) = env_flag("VMSNAP_FOLLOW_SYMLINKS") {
            cfg.follow_symlinks = on;
        }
        if let Some(on) = env_flag("VMSNAP_CRAWL_SKIP_ERRORS") {
            cfg.crawl_skip_errors = on;
        }

        // ----- restore -----
        if let Some(on) = env_flag("VMSNAP_SKIP_MISSING") {
            cfg.skip_missing = on;
        }
        if let Some(on) = env_flag("VMSNAP_ALLOW_UNSAFE_PATHS") {
            cfg.allow_unsafe_paths = on;
        }
        if let Ok(v) = std::env::var("VMSNAP_RESTORE_ROOT") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.restore_root = Some(PathBuf::from(s));
            }
        }

        cfg
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_follow_symlinks(mut self, on: bool) -> Self {
        self.follow_symlinks = on;
        self
    }

    pub fn with_crawl_skip_errors(mut self, on: bool) -> Self {
        self.crawl_skip_errors = on;
        self
    }

    pub fn with_skip_missing(mut self, on: bool) -> Self {
        self.skip_missing = on;
        self
    }

    pub fn with_allow_unsafe_paths(mut self, on: bool) -> Self {
        self.allow_unsafe_paths = on;
        self
    }

    pub fn with_restore_root<P: Into<PathBuf>>(mut self, root: Option<P>) -> Self {
        self.restore_root = root.map(Into::into);
        self
    }
}

impl fmt::Display for VmSnapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VmSnapConfig {{ \
             follow_symlinks: {}, \
             crawl_skip_errors: {}, \
             skip_missing: {}, \
             allow_unsafe_paths: {}, \
             restore_root: {} \
             }}",
            self.follow_symlinks,
            self.crawl_skip_errors,
            self.skip_missing,
            self.allow_unsafe_paths,
            self.restore_root
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(stored paths)".to_string()),
        )
    }
}

/// Lightweight builder that produces a VmSnapConfig.
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    cfg: VmSnapConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: VmSnapConfig::from_env(),
        }
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: VmSnapConfig::default(),
        }
    }

    pub fn follow_symlinks(mut self, on: bool) -> Self {
        self.cfg.follow_symlinks = on;
        self
    }

    pub fn crawl_skip_errors(mut self, on: bool) -> Self {
        self.cfg.crawl_skip_errors = on;
        self
    }

    pub fn skip_missing(mut self, on: bool) -> Self {
        self.cfg.skip_missing = on;
        self
    }

    pub fn allow_unsafe_paths(mut self, on: bool) -> Self {
        self.cfg.allow_unsafe_paths = on;
        self
    }

    pub fn restore_root<P: Into<PathBuf>>(mut self, root: Option<P>) -> Self {
        self.cfg.restore_root = root.map(Into::into);
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> VmSnapConfig {
        self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_strict() {
        let cfg = ConfigBuilder::from_default().build();
        assert!(!cfg.follow_symlinks);
        assert!(!cfg.crawl_skip_errors);
        assert!(!cfg.skip_missing);
        assert!(!cfg.allow_unsafe_paths);
        assert!(cfg.restore_root.is_none());
        assert!(cfg.to_string().contains("(stored paths)"));
    }

    #[test]
    fn builder_overrides() {
        let cfg = ConfigBuilder::from_default()
            .skip_missing(true)
            .restore_root(Some("/mnt/restore"))
            .build();
        assert!(cfg.skip_missing);
        assert_eq!(cfg.restore_root, Some(PathBuf::from("/mnt/restore")));

        let cfg2 = VmSnapConfig::default().with_allow_unsafe_paths(true);
        assert!(cfg2.allow_unsafe_paths);
    }
}
