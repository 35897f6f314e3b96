//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use protobag::{
    ArchiveFormat, ArchiveSpec, ArchiveStore, BagReader, BagWriter, MemoryArchive, ReaderConfig,
    Timestamp, WriterConfig,
};
use std::sync::Once;
use tempfile::TempDir;

pub use protobag_engine::testing::{self, Point, Reading};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output to the test harness; `RUST_LOG` is not consulted.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Backends
// ============================================================================

/// Every archive backend a bag can live in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Directory,
    Tar,
    TarZstd,
}

impl Backend {
    pub const ALL: [Backend; 4] = [
        Backend::Memory,
        Backend::Directory,
        Backend::Tar,
        Backend::TarZstd,
    ];

    fn file_name(self) -> &'static str {
        match self {
            Backend::Memory => "",
            Backend::Directory => "bag",
            Backend::Tar => "bag.tar",
            Backend::TarZstd => "bag.tar.zst",
        }
    }
}

/// A bag location that can be written once and read back many times
pub struct TestBag {
    pub backend: Backend,
    dir: TempDir,
    memory: MemoryArchive,
}

impl TestBag {
    pub fn new(backend: Backend) -> Self {
        init_tracing();
        TestBag {
            backend,
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
            memory: MemoryArchive::new(),
        }
    }

    pub fn spec(&self) -> ArchiveSpec {
        match self.backend {
            Backend::Memory => ArchiveSpec::memory(),
            other => ArchiveSpec::write(self.dir.path().join(other.file_name())),
        }
    }

    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig::default().with_archive(self.spec())
    }

    pub fn writer(&self) -> BagWriter {
        self.writer_with(self.writer_config())
    }

    pub fn writer_with(&self, config: WriterConfig) -> BagWriter {
        let config = config.with_archive(self.spec());
        match self.backend {
            Backend::Memory => BagWriter::with_store(Box::new(self.memory.clone()), config),
            _ => BagWriter::create(config),
        }
        .expect("Failed to open bag for writing")
    }

    pub fn reader(&self) -> BagReader {
        self.reader_with(ReaderConfig::default())
    }

    pub fn reader_with(&self, config: ReaderConfig) -> BagReader {
        let config = config.with_archive(self.spec().for_reading());
        match self.backend {
            Backend::Memory => BagReader::from_store(Box::new(self.memory.clone()), config),
            _ => BagReader::open(config),
        }
        .expect("Failed to open bag for reading")
    }

    /// Raw store view, bypassing the engine
    pub fn store(&self) -> Box<dyn ArchiveStore> {
        match self.backend {
            Backend::Memory => Box::new(self.memory.clone()),
            _ => protobag_archive::open(&self.spec().for_reading()).expect("Failed to open store"),
        }
    }

    pub fn format(&self) -> ArchiveFormat {
        self.spec().format
    }
}

// ============================================================================
// Data
// ============================================================================

pub fn secs(s: i64) -> Timestamp {
    Timestamp::from_secs(s)
}

pub fn ts(s: i64, nanos: i32) -> Timestamp {
    Timestamp::new(s, nanos).expect("valid timestamp")
}

/// Write `/a` at seconds {0,1,2} then `/b` at seconds {1,2,3}, all `Reading`s
pub fn write_two_topics(writer: &mut BagWriter) {
    for s in 0..3 {
        writer
            .write_stamped_typed("/a", secs(s), &testing::dynamic_reading("a", s as f64))
            .expect("write /a");
    }
    for s in 1..4 {
        writer
            .write_stamped_typed("/b", secs(s), &testing::dynamic_reading("b", s as f64))
            .expect("write /b");
    }
}
