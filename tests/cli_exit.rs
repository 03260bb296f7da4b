// tests/cli_exit.rs
//
// Бинарник vmsnap: коды выхода 0 / 1 (I/O) / 2 (битый снапшот).

use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("vmsnap-{}-{}-{}", prefix, pid, t))
}

fn vmsnap() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vmsnap"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn exit_codes_distinguish_corrupt_snapshots() {
    let root = unique_root("cli-exit");
    fs::create_dir_all(root.join("data")).unwrap();
    fs::write(root.join("data/f.bin"), vec![7u8; 5000]).unwrap();
    let snap = root.join("ok.vmsnap");

    let out = vmsnap()
        .arg("snapshot")
        .arg("--path")
        .arg(root.join("data"))
        .arg("--out")
        .arg(&snap)
        .output()
        .expect("run vmsnap snapshot");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let out = vmsnap()
        .args(["inspect", "--json", "--from"])
        .arg(&snap)
        .output()
        .expect("run vmsnap inspect");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["summary"]["files"], 1);

    // Запись объявляет 5 байт, а в файле только 1.
    let bad = root.join("bad.vmsnap");
    fs::write(&bad, b"VMP\x01\x00\x05\x01").unwrap();
    let out = vmsnap()
        .args(["inspect", "--from"])
        .arg(&bad)
        .output()
        .expect("run vmsnap inspect");
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("corrupt snapshot"));

    let out = vmsnap()
        .args(["inspect", "--from"])
        .arg(root.join("absent.vmsnap"))
        .output()
        .expect("run vmsnap inspect");
    assert_eq!(out.status.code(), Some(1));

    fs::remove_dir_all(&root).unwrap();
}
