//! snapshot/restore — воспроизведение резидентности по снапшоту.
//!
//! restore_residency(): bitfield -> минимальная последовательность touch/evict.
//! Соседние bucket'ы с одинаковым битом склеиваются в один диапазон; диапазон
//! сбрасывается при смене бита и в конце. Выход за размер файла обрезается
//! по размеру, оставшиеся bucket'ы игнорируются. На время прохода ставится
//! Advice::Random, чтобы readahead не подтягивал лишние страницы.
//!
//! restore_buffer(): полный сценарий — заголовок, разбор записей, политика путей,
//! открытие файлов, restore_residency по каждому. Ошибка формата прерывает
//! восстановление; уже обработанные файлы остаются в новом состоянии.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::Path;

use crate::bitfield::Bitfield;
use crate::cache::{Advice, CachedFile, ResidencyTarget};
use crate::config::VmSnapConfig;
use crate::metrics::{record_evict, record_file_restored, record_restore_skip, record_touch};

use super::element::Element;
use super::header::SnapshotHeader;
use super::parser::Parser;
use super::paths::resolve_restore_path;

/// Сколько диапазонов и байт выдано одним восстановлением.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RangeStats {
    pub touch_calls: u64,
    pub touch_bytes: u64,
    pub evict_calls: u64,
    pub evict_bytes: u64,
}

impl RangeStats {
    pub fn ranges(&self) -> u64 {
        self.touch_calls + self.evict_calls
    }

    fn merge(&mut self, o: &RangeStats) {
        self.touch_calls += o.touch_calls;
        self.touch_bytes += o.touch_bytes;
        self.evict_calls += o.evict_calls;
        self.evict_bytes += o.evict_bytes;
    }
}

fn flush<T: ResidencyTarget + ?Sized>(
    target: &mut T,
    resident: bool,
    start: u64,
    end: u64,
    stats: &mut RangeStats,
) {
    let len = end - start;
    if resident {
        target.touch(start, len);
        stats.touch_calls += 1;
        stats.touch_bytes += len;
        record_touch(len);
    } else {
        target.evict(start, len);
        stats.evict_calls += 1;
        stats.evict_bytes += len;
        record_evict(len);
    }
}

/// Привести резидентность target к состоянию из bitfield.
pub fn restore_residency<T: ResidencyTarget + ?Sized>(
    target: &mut T,
    bf: &Bitfield<'_>,
) -> RangeStats {
    let mut stats = RangeStats::default();
    let stride = bf.stride();
    let file_len = target.size();

    let mut range_start: u64 = 0;
    let mut range_end: u64 = 0;
    let mut state: Option<bool> = None;

    target.advise(Advice::Random);

    for i in 0..bf.num_buckets {
        let bit = bf.get_bit(i);
        let cur = *state.get_or_insert(bit);

        if bit != cur {
            flush(target, cur, range_start, range_end, &mut stats);
            range_start = range_end;
            state = Some(bit);
        }

        range_end = range_end.saturating_add(stride);

        if range_end > file_len {
            range_end = file_len;
            break;
        }
    }

    if range_start != range_end {
        if let Some(resident) = state {
            flush(target, resident, range_start, range_end, &mut stats);
        }
    }

    target.advise(Advice::Normal);
    stats
}

/// Итог восстановления снапшота целиком.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RestoreReport {
    pub records: u64,
    pub files_restored: u64,
    pub files_missing: u64,
    pub paths_rejected: u64,
    pub ranges: RangeStats,
}

/// Открыть файл и восстановить его резидентность.
pub fn restore_file(path: &Path, bf: &Bitfield<'_>) -> Result<RangeStats> {
    let mut f = CachedFile::open(path)?;
    Ok(restore_residency(&mut f, bf))
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}

fn restore_element(elem: &Element<'_>, cfg: &VmSnapConfig, report: &mut RestoreReport) -> Result<()> {
    report.records += 1;

    let path = match resolve_restore_path(elem.filename, cfg) {
        Ok(p) => p,
        Err(why) => {
            warn!("restore: skip '{}': {}", elem.display_name(), why);
            report.paths_rejected += 1;
            record_restore_skip();
            return Ok(());
        }
    };

    match restore_file(&path, &elem.bitfield) {
        Ok(stats) => {
            debug!(
                "restore: {} touch={} evict={}",
                path.display(),
                stats.touch_calls,
                stats.evict_calls
            );
            report.files_restored += 1;
            report.ranges.merge(&stats);
            record_file_restored();
            Ok(())
        }
        Err(e) if cfg.skip_missing && is_not_found(&e) => {
            warn!("restore: skip missing {}", path.display());
            report.files_missing += 1;
            record_restore_skip();
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("restore {}", path.display())),
    }
}

/// Восстановить резидентность по всему снапшоту (заголовок + записи).
pub fn restore_buffer(buf: &[u8], cfg: &VmSnapConfig) -> Result<RestoreReport> {
    let (header, start) = SnapshotHeader::read(buf)?;
    debug!(
        "restore: snapshot format={} page_size={} records at {}",
        header.format_type, header.page_size, start
    );

    let mut report = RestoreReport::default();
    Parser::at(buf, start).process(|elem| restore_element(elem, cfg, &mut report))?;

    info!(
        "restore: {} file(s) restored, {} missing, {} rejected, touch {} B / evict {} B",
        report.files_restored,
        report.files_missing,
        report.paths_rejected,
        report.ranges.touch_bytes,
        report.ranges.evict_bytes
    );
    Ok(report)
}

/// Восстановление с конфигурацией из окружения.
pub fn restore(buf: &[u8]) -> Result<RestoreReport> {
    restore_buffer(buf, &VmSnapConfig::from_env())
}
