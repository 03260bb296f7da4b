// tests/freeze_thaw.rs
//
// Сквозной сценарий на реальных файлах: crawl -> snapshot -> save/load ->
// summary -> restore (включая политику путей и пропуск отсутствующих файлов).

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use VmSnap::cache::page_size;
use VmSnap::snapshot::{list_elements, summarize};
use VmSnap::util::path_to_bytes;
use VmSnap::{
    load_snapshot, restore_buffer, save_snapshot, Bitfield, CachedFile, ConfigBuilder, Element,
    ParseError, SnapshotBuilder, SnapshotHeader, VmSnapConfig,
};

#[test]
fn crawl_save_load_restore() -> Result<()> {
    let root = unique_root("freeze");
    fs::create_dir_all(root.join("sub"))?;
    let ps = page_size() as usize;
    write_file(&root.join("a.bin"), ps * 3 + 17)?;
    write_file(&root.join("sub/b.bin"), ps)?;
    write_file(&root.join("empty"), 0)?;

    let cfg = ConfigBuilder::from_default().build();
    let b = SnapshotBuilder::from_path(&root, &cfg)?;
    assert_eq!(b.element_count(), 3);
    assert_eq!(b.header().page_size, page_size());

    let snap_path = root.with_extension("vmsnap");
    save_snapshot(&snap_path, b.as_bytes())?;
    let buf = load_snapshot(&snap_path)?;
    assert_eq!(buf, b.as_bytes());

    // Содержимое: имена в порядке обхода, размеры, число bucket'ов.
    let list = list_elements(&buf)?;
    let names: Vec<&str> = list.iter().map(|e| e.filename.as_str()).collect();
    let expect: Vec<String> = ["a.bin", "empty", "sub/b.bin"]
        .iter()
        .map(|n| root.join(n).display().to_string())
        .collect();
    assert_eq!(names, expect);
    assert_eq!(list[0].file_size, (ps * 3 + 17) as u64);
    assert_eq!(list[0].num_buckets, 4);
    assert_eq!(list[1].num_buckets, 0);
    assert_eq!(list[2].num_buckets, 1);

    let s = summarize(&buf)?;
    assert_eq!(s.files, 3);
    assert_eq!(s.total_pages, 5);

    // Восстановление по тем же файлам.
    let report = restore_buffer(&buf, &cfg)?;
    assert_eq!(report.records, 3);
    assert_eq!(report.files_restored, 3);
    assert_eq!(report.files_missing, 0);
    // Каждый непустой файл даёт хотя бы один диапазон, пустой — ни одного.
    assert!(report.ranges.ranges() >= 2);
    let covered = report.ranges.touch_bytes + report.ranges.evict_bytes;
    assert_eq!(covered, (ps * 4 + 17) as u64);

    fs::remove_dir_all(&root)?;
    fs::remove_file(&snap_path)?;
    let _ = fs::remove_file(VmSnap::lock::lock_file_path(&snap_path));
    Ok(())
}

#[test]
fn restore_touches_resident_ranges() -> Result<()> {
    let root = unique_root("thaw-touch");
    fs::create_dir_all(&root)?;
    let ps = page_size();
    let file = root.join("hot.bin");
    write_file(&file, (ps * 4) as usize)?;

    // Снапшот "всё резидентно", собранный вручную.
    let name = path_to_bytes(&file);
    let mut b = SnapshotBuilder::new();
    b.add_element(&Element {
        filename: &name,
        file_size: ps * 4,
        resident_pages: 4,
        bitfield: Bitfield::new(ps, 4, &[0b1111]),
    });

    let report = restore_buffer(b.as_bytes(), &VmSnapConfig::default())?;
    assert_eq!(report.files_restored, 1);
    assert_eq!(report.ranges.touch_calls, 1);
    assert_eq!(report.ranges.touch_bytes, ps * 4);
    assert_eq!(report.ranges.evict_calls, 0);

    let r = CachedFile::open(&file)?.mincore()?;
    assert_eq!(r.resident_pages, 4);

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn missing_files_fail_or_skip() -> Result<()> {
    let root = unique_root("thaw-missing");
    let gone = root.join("gone.bin");
    let name = path_to_bytes(&gone);

    let mut b = SnapshotBuilder::new();
    b.add_element(&Element {
        filename: &name,
        file_size: 4096,
        resident_pages: 1,
        bitfield: Bitfield::new(4096, 1, &[1]),
    });

    // По умолчанию ошибка файловой системы пробрасывается.
    let strict = restore_buffer(b.as_bytes(), &VmSnapConfig::default());
    assert!(strict.is_err());

    let cfg = VmSnapConfig::default().with_skip_missing(true);
    let report = restore_buffer(b.as_bytes(), &cfg)?;
    assert_eq!(report.records, 1);
    assert_eq!(report.files_missing, 1);
    assert_eq!(report.files_restored, 0);
    Ok(())
}

#[test]
fn traversal_paths_are_rejected_and_root_rebases() -> Result<()> {
    let root = unique_root("thaw-policy");
    fs::create_dir_all(root.join("data"))?;
    write_file(&root.join("data/seg"), 100)?;

    let mut b = SnapshotBuilder::new();
    b.add_element(&Element {
        filename: b"../../etc/passwd",
        file_size: 100,
        resident_pages: 0,
        bitfield: Bitfield::new(4096, 1, &[0]),
    });
    // Относительное имя, которое найдётся только под restore_root.
    b.add_element(&Element {
        filename: b"./data//seg",
        file_size: 100,
        resident_pages: 1,
        bitfield: Bitfield::new(4096, 1, &[1]),
    });

    let cfg = VmSnapConfig::default().with_restore_root(Some(&root));
    let report = restore_buffer(b.as_bytes(), &cfg)?;
    assert_eq!(report.records, 2);
    assert_eq!(report.paths_rejected, 1);
    assert_eq!(report.files_restored, 1);
    assert_eq!(report.ranges.touch_bytes, 100);

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn corrupt_snapshot_stops_restore() -> Result<()> {
    let root = unique_root("thaw-corrupt");
    fs::create_dir_all(&root)?;
    let file = root.join("one.bin");
    write_file(&file, 4096)?;
    let name = path_to_bytes(&file);

    let mut b = SnapshotBuilder::new();
    for _ in 0..2 {
        b.add_element(&Element {
            filename: &name,
            file_size: 4096,
            resident_pages: 1,
            bitfield: Bitfield::new(4096, 1, &[1]),
        });
    }
    let mut bytes = b.into_bytes();
    bytes.truncate(bytes.len() - 1);

    let err = restore_buffer(&bytes, &VmSnapConfig::default()).unwrap_err();
    let pe = err.downcast_ref::<ParseError>().expect("parse error");
    let hdr_len = SnapshotHeader::read(&bytes)?.1;
    assert!(pe.offset > hdr_len);

    fs::remove_dir_all(&root)?;
    Ok(())
}

// ---------- helpers ----------

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("vmsnap-{}-{}-{}", prefix, pid, t))
}

fn write_file(path: &Path, len: usize) -> Result<()> {
    let mut v = vec![0xA5u8; len];
    if len >= 3 {
        v[len / 2] = 0x11;
    }
    fs::write(path, v)?;
    Ok(())
}
