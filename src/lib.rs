#![allow(non_snake_case)]

// Базовые модули
pub mod consts;
pub mod config;
pub mod metrics;
pub mod lock;
pub mod util;

// Кодеки формата
pub mod varint;
pub mod bitfield;

// Page cache и обход файлов
pub mod cache;   // src/cache/{mod,file,pageutils}.rs
pub mod crawler;

// Снапшот: build / parse / restore
pub mod snapshot; // src/snapshot/{mod,header,element,builder,parser,restore,paths,file,summary}.rs

// CLI (используется бинарником vmsnap)
pub mod cli;

// Удобные реэкспорты
pub use bitfield::Bitfield;
pub use cache::{Advice, CachedFile, ResidencyTarget};
pub use config::{ConfigBuilder, VmSnapConfig};
pub use snapshot::{
    load_snapshot, restore, restore_buffer, restore_residency, save_snapshot, summarize, Element,
    ParseError, ParseErrorKind, Parser, RangeStats, RestoreReport, SnapshotBuilder,
    SnapshotHeader,
};
