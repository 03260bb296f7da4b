use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::bitfield::Bitfield;
use crate::cache::{CachedFile, ResidencyTarget};
use crate::config::VmSnapConfig;
use crate::metrics;
use crate::snapshot::{
    default_snapshot_path, list_elements, load_snapshot, restore_buffer, save_snapshot, summarize,
    SnapshotBuilder,
};
use crate::util::human_bytes;

#[derive(Parser, Debug)]
#[command(
    name = "vmsnap",
    version,
    about = "Freeze and thaw page-cache residency of files",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Crawl paths and save their page-cache residency into a snapshot file
    ///
    /// Пример:
    ///   vmsnap snapshot --path /var/lib/pg --path /srv/index --out hot.vmsnap
    ///   vmsnap snapshot --path /var/lib/pg          (пишет ./pg.vmsnap)
    Snapshot {
        /// File or directory to crawl (repeatable)
        #[arg(long, required = true)]
        path: Vec<PathBuf>,
        /// Output snapshot file (default: "<first path name>.vmsnap" in cwd)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Follow symlinks to regular files
        #[arg(long, default_value_t = false)]
        follow_symlinks: bool,
        /// Log and skip unreadable entries instead of failing
        #[arg(long, default_value_t = false)]
        skip_errors: bool,
        /// Print metrics counters when done
        #[arg(long, default_value_t = false)]
        stats: bool,
    },
    /// Restore residency recorded in a snapshot (touch resident, evict the rest)
    ///
    /// Примечания:
    /// - пути с ".." отклоняются, если не задан --allow-unsafe-paths;
    /// - --root переносит сохранённые пути под другой каталог.
    Restore {
        #[arg(long)]
        from: PathBuf,
        /// Rebase stored paths under this directory
        #[arg(long)]
        root: Option<PathBuf>,
        /// Skip files that no longer exist
        #[arg(long, default_value_t = false)]
        skip_missing: bool,
        /// Allow ".." components in stored paths
        #[arg(long, default_value_t = false)]
        allow_unsafe_paths: bool,
        /// JSON output (single object)
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Print metrics counters when done
        #[arg(long, default_value_t = false)]
        stats: bool,
    },
    /// Print snapshot summary (and per-file listing with --files)
    Inspect {
        #[arg(long)]
        from: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
        #[arg(long, default_value_t = false)]
        files: bool,
    },
    /// Show live page-cache residency of one file
    Residency {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Cli as Parser>::parse()
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Snapshot {
            path,
            out,
            follow_symlinks,
            skip_errors,
            stats,
        } => {
            let mut cfg = VmSnapConfig::from_env();
            cfg.follow_symlinks |= follow_symlinks;
            cfg.crawl_skip_errors |= skip_errors;

            let mut b = SnapshotBuilder::new();
            for root in &path {
                // Абсолютные пути в снапшоте: restore не зависит от cwd.
                let abs = std::fs::canonicalize(root)
                    .with_context(|| format!("canonicalize {}", root.display()))?;
                b.crawl(&abs, &cfg)?;
            }
            let out = match out {
                Some(p) => p,
                None => default_snapshot_path(&path[0]),
            };
            save_snapshot(&out, b.as_bytes())?;
            println!(
                "snapshot: {} file(s), {} -> {}",
                b.element_count(),
                human_bytes(b.len() as u64),
                out.display()
            );
            if stats {
                print_metrics()?;
            }
        }

        Cmd::Restore {
            from,
            root,
            skip_missing,
            allow_unsafe_paths,
            json,
            stats,
        } => {
            let mut cfg = VmSnapConfig::from_env();
            cfg.skip_missing |= skip_missing;
            cfg.allow_unsafe_paths |= allow_unsafe_paths;
            if root.is_some() {
                cfg.restore_root = root;
            }

            let buf = load_snapshot(&from)?;
            let report = restore_buffer(&buf, &cfg)
                .with_context(|| format!("restore from {}", from.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("restore: {}", from.display());
                println!("  records        = {}", report.records);
                println!("  files_restored = {}", report.files_restored);
                println!("  files_missing  = {}", report.files_missing);
                println!("  paths_rejected = {}", report.paths_rejected);
                println!(
                    "  touched        = {} in {} range(s)",
                    human_bytes(report.ranges.touch_bytes),
                    report.ranges.touch_calls
                );
                println!(
                    "  evicted        = {} in {} range(s)",
                    human_bytes(report.ranges.evict_bytes),
                    report.ranges.evict_calls
                );
            }
            if stats {
                print_metrics()?;
            }
        }

        Cmd::Inspect { from, json, files } => {
            let buf = load_snapshot(&from)?;
            let s = summarize(&buf)?;
            let list = if files { Some(list_elements(&buf)?) } else { None };

            if json {
                #[derive(Serialize)]
                struct Out<'a> {
                    summary: &'a crate::snapshot::SnapshotSummary,
                    #[serde(skip_serializing_if = "Option::is_none")]
                    files: Option<&'a Vec<crate::snapshot::ElementInfo>>,
                }
                let out = Out {
                    summary: &s,
                    files: list.as_ref(),
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            println!("Snapshot {}", from.display());
            println!("  format         = {}", s.format_type);
            println!("  page_size      = {}", s.page_size);
            println!("  size           = {}", human_bytes(s.snapshot_bytes));
            println!("  files          = {}", s.files);
            println!("  file_bytes     = {}", human_bytes(s.total_file_bytes));
            println!("  pages          = {}", s.total_pages);
            println!(
                "  resident       = {} page(s), ~{}",
                s.resident_pages,
                human_bytes(s.resident_bytes)
            );
            if let Some(list) = list {
                for e in list {
                    println!(
                        "  - {}  {}  {}/{} pages  {} run(s)",
                        e.filename,
                        human_bytes(e.file_size),
                        e.resident_pages,
                        e.num_buckets,
                        e.runs
                    );
                }
            }
        }

        Cmd::Residency { path, json } => {
            let f = CachedFile::open(&path)?;
            let r = f.mincore()?;
            let bf: Bitfield<'_> = r.bitfield();

            #[derive(Serialize)]
            struct Out {
                path: String,
                file_size: u64,
                page_size: u64,
                pages: u64,
                resident_pages: u64,
                runs: u64,
            }
            let out = Out {
                path: path.display().to_string(),
                file_size: f.size(),
                page_size: r.page_size,
                pages: r.num_pages,
                resident_pages: r.resident_pages,
                runs: bf.runs(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", out.path);
                println!("  size     = {}", human_bytes(out.file_size));
                println!("  pages    = {} x {} B", out.pages, out.page_size);
                println!("  resident = {} page(s)", out.resident_pages);
                println!("  runs     = {}", out.runs);
            }
        }
    }
    Ok(())
}

fn print_metrics() -> Result<()> {
    let m = metrics::snapshot();
    println!("metrics: {}", serde_json::to_string(&m)?);
    if m.pages_scanned > 0 {
        println!("resident ratio: {:.1}%", m.resident_ratio() * 100.0);
    }
    Ok(())
}
