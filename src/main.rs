use env_logger::{Builder, Env};
use log::error;

use VmSnap::ParseError;

// Коды выхода: 1 — прочие ошибки (I/O, отклонённые аргументы), 2 — битый снапшот.
const EXIT_FAILURE: i32 = 1;
const EXIT_CORRUPT_SNAPSHOT: i32 = 2;

fn init_logger() {
    // RUST_LOG=debug покажет каждый touch/evict диапазон:
    //   RUST_LOG=debug VMSNAP_SKIP_MISSING=1 vmsnap restore --from pg.vmsnap
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = VmSnap::cli::run() {
        if let Some(pe) = e.downcast_ref::<ParseError>() {
            error!("vmsnap: corrupt snapshot at byte {}: {:#}", pe.offset, e);
            std::process::exit(EXIT_CORRUPT_SNAPSHOT);
        }
        error!("vmsnap: {:#}", e);
        std::process::exit(EXIT_FAILURE);
    }
}
