//! Common test utilities and fixtures for integration tests.

use std::sync::{Arc, Once};

use cowtree_dir::{DirService, DirServiceConfig, EncryptionKey, MemoryBlobStore};

static TRACING: Once = Once::new();

/// Install a test subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A service over its own in-memory store, with a master key for the sealing packings.
pub struct Fixture {
    pub store: Arc<MemoryBlobStore>,
    pub service: DirService,
}

impl Fixture {
    pub fn new() -> Self {
        init_tracing();
        let store = Arc::new(MemoryBlobStore::new());
        let service = DirService::new(store.clone(), DirServiceConfig::default())
            .with_master_key(EncryptionKey([0x5a; 32]));
        Self { store, service }
    }

    /// A fixture with `alice@example.com` already holding a root.
    pub fn with_alice() -> Self {
        let fixture = Self::new();
        fixture.service.make_directory(ALICE).unwrap();
        fixture
    }
}

pub const ALICE: &str = "alice@example.com/";
