use crate::config::FjallConfig;
use crate::store::FjallStore;
use fjall::CompressionType;
use nestdb::errors::NestResult;
use nestdb::store::{NestStore, StoreModule};

/// Store module opening a durable [`FjallStore`].
///
/// # Examples
///
/// ```rust,no_run
/// use nestdb::nest::Nest;
/// use nestdb_fjall_adapter::FjallModule;
///
/// let db = Nest::builder()
///     .load_module(
///         FjallModule::with_config()
///             .production_preset()
///             .db_path("/var/lib/app/nest")
///             .build(),
///     )
///     .open_or_create()
///     .unwrap();
/// db.close().unwrap();
/// ```
pub struct FjallModule {
    store_config: FjallConfig,
}

impl FjallModule {
    pub fn with_config() -> FjallModuleBuilder {
        FjallModuleBuilder::new()
    }

    pub fn config(&self) -> FjallConfig {
        self.store_config.clone()
    }
}

impl StoreModule for FjallModule {
    fn get_store(&self) -> NestResult<NestStore> {
        Ok(NestStore::new(FjallStore::new(self.store_config.clone())))
    }
}

/// Fluent configuration of a [`FjallModule`].
pub struct FjallModuleBuilder {
    store_config: FjallConfig,
}

impl Default for FjallModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FjallModuleBuilder {
    pub fn new() -> FjallModuleBuilder {
        FjallModuleBuilder {
            store_config: FjallConfig::new(),
        }
    }

    /// 256 MB cache, a 32 MB memtable per partition, bloom filters and LZ4,
    /// with every batch synced to disk.
    pub fn production_preset(self) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(4);

        self.cache_size(256 * 1_024 * 1_024)
            .max_write_buffer_size(128 * 1_024 * 1_024)
            .max_memtable_size(32 * 1_024 * 1_024)
            .flush_workers(cpus)
            .compaction_workers(cpus / 2)
            .bloom_filter_bits(10)
            .compression_type(CompressionType::Lz4)
            .sync_on_commit(true)
    }

    /// Small caches and buffers with a single worker of each kind, for
    /// embedded targets and tests.
    pub fn low_memory_preset(self) -> Self {
        self.cache_size(16 * 1_024 * 1_024)
            .max_write_buffer_size(32 * 1_024 * 1_024)
            .max_memtable_size(8 * 1_024 * 1_024)
            .flush_workers(1)
            .compaction_workers(1)
            .bloom_filter_bits(10)
    }

    pub fn db_path(self, db_path: &str) -> Self {
        self.store_config.set_db_path(db_path);
        self
    }

    /// Fsyncs the journal after every applied batch. Without it a write is
    /// atomic but may be lost on power failure until the next
    /// [`commit`](nestdb::nest::Nest::commit).
    pub fn sync_on_commit(self, value: bool) -> Self {
        self.store_config.set_sync_on_commit(value);
        self
    }

    pub fn manual_journal_persist(self, value: bool) -> Self {
        self.store_config.set_manual_journal_persist(value);
        self
    }

    pub fn flush_workers(self, count: usize) -> Self {
        self.store_config.set_flush_workers(count);
        self
    }

    pub fn compaction_workers(self, count: usize) -> Self {
        self.store_config.set_compaction_workers(count);
        self
    }

    pub fn cache_size(self, bytes: u64) -> Self {
        self.store_config.set_cache_size(bytes);
        self
    }

    pub fn max_journaling_size(self, bytes: u64) -> Self {
        self.store_config.set_max_journaling_size(bytes);
        self
    }

    pub fn max_write_buffer_size(self, bytes: u64) -> Self {
        self.store_config.set_max_write_buffer_size(bytes);
        self
    }

    pub fn fsync_ms(self, ms: u16) -> Self {
        self.store_config.set_fsync_ms(ms);
        self
    }

    pub fn bloom_filter_bits(self, bits: u8) -> Self {
        self.store_config.set_bloom_filter_bits(bits.min(i8::MAX as u8) as i8);
        self
    }

    pub fn disable_bloom_filter(self) -> Self {
        self.store_config.set_bloom_filter_bits(-1);
        self
    }

    pub fn compression_type(self, compression: CompressionType) -> Self {
        self.store_config.set_compression_type(compression);
        self
    }

    pub fn max_memtable_size(self, bytes: u32) -> Self {
        self.store_config.set_max_memtable_size(bytes);
        self
    }

    pub fn block_size(self, bytes: u32) -> Self {
        self.store_config.set_block_size(bytes);
        self
    }

    pub fn kv_separated(self, value: bool) -> Self {
        self.store_config.set_kv_separated(value);
        self
    }

    pub fn build(self) -> FjallModule {
        FjallModule {
            store_config: self.store_config,
        }
    }
}
