use fjall::{CompressionType, Config, KvSeparationOptions, PartitionCreateOptions};
use nestdb::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU16, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

const MB: u64 = 1_024 * 1_024;

/// Tuning of a fjall-backed store.
///
/// Cheap to clone; clones share one set of settings. The settings are read when
/// the store opens its keyspace and its partitions, so changes made after that
/// only reach partitions opened later.
#[derive(Clone)]
pub struct FjallConfig {
    inner: Arc<FjallConfigInner>,
}

impl Default for FjallConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FjallConfig {
    /// Defaults: 64 MB block cache, 128 MB write buffer, 512 MB journal, LZ4
    /// compressed partitions with 10 bit bloom filters, one flush worker per
    /// core and every applied batch synced to disk.
    pub fn new() -> FjallConfig {
        FjallConfig {
            inner: Arc::new(FjallConfigInner::new()),
        }
    }

    pub(crate) fn keyspace_config(&self) -> Config {
        let inner = &self.inner;
        let mut config = Config::new(self.db_path())
            .manual_journal_persist(inner.manual_journal_persist.load(Ordering::Relaxed))
            .flush_workers(inner.flush_workers.load(Ordering::Relaxed))
            .compaction_workers(inner.compaction_workers.load(Ordering::Relaxed))
            .cache_size(inner.cache_size.load(Ordering::Relaxed))
            .max_journaling_size(inner.max_journaling_size.load(Ordering::Relaxed))
            .max_write_buffer_size(inner.max_write_buffer_size.load(Ordering::Relaxed));

        let fsync_ms = inner.fsync_ms.load(Ordering::Relaxed);
        if fsync_ms > 0 {
            config = config.fsync_ms(Some(fsync_ms));
        }
        config
    }

    pub(crate) fn partition_config(&self) -> PartitionCreateOptions {
        let inner = &self.inner;
        let bloom_bits = inner.bloom_filter_bits.load(Ordering::Relaxed);
        let mut options = PartitionCreateOptions::default()
            .bloom_filter_bits(if bloom_bits < 0 { None } else { Some(bloom_bits as u8) })
            .compression(inner.compression_type.read_with(|it| *it))
            .max_memtable_size(inner.max_memtable_size.load(Ordering::Relaxed))
            .block_size(inner.block_size.load(Ordering::Relaxed));

        if inner.kv_separated.load(Ordering::Relaxed) {
            options = options.with_kv_separation(KvSeparationOptions::default());
        }
        options
    }

    pub fn db_path(&self) -> String {
        self.inner.db_path.read_with(|it| it.clone())
    }

    pub(crate) fn set_db_path(&self, db_path: &str) {
        self.inner.db_path.write_with(|it| *it = db_path.to_string());
    }

    /// Whether every applied batch is fsynced before the write returns.
    pub fn sync_on_commit(&self) -> bool {
        self.inner.sync_on_commit.load(Ordering::Relaxed)
    }

    pub(crate) fn set_sync_on_commit(&self, value: bool) {
        self.inner.sync_on_commit.store(value, Ordering::Relaxed);
    }

    pub fn manual_journal_persist(&self) -> bool {
        self.inner.manual_journal_persist.load(Ordering::Relaxed)
    }

    pub(crate) fn set_manual_journal_persist(&self, value: bool) {
        self.inner.manual_journal_persist.store(value, Ordering::Relaxed);
    }

    pub fn flush_workers(&self) -> usize {
        self.inner.flush_workers.load(Ordering::Relaxed)
    }

    pub(crate) fn set_flush_workers(&self, count: usize) {
        self.inner.flush_workers.store(count.max(1), Ordering::Relaxed);
    }

    pub fn compaction_workers(&self) -> usize {
        self.inner.compaction_workers.load(Ordering::Relaxed)
    }

    pub(crate) fn set_compaction_workers(&self, count: usize) {
        self.inner.compaction_workers.store(count.max(1), Ordering::Relaxed);
    }

    /// Block cache capacity in bytes.
    pub fn cache_size(&self) -> u64 {
        self.inner.cache_size.load(Ordering::Relaxed)
    }

    pub(crate) fn set_cache_size(&self, bytes: u64) {
        self.inner.cache_size.store(bytes, Ordering::Relaxed);
    }

    pub fn max_journaling_size(&self) -> u64 {
        self.inner.max_journaling_size.load(Ordering::Relaxed)
    }

    pub(crate) fn set_max_journaling_size(&self, bytes: u64) {
        self.inner.max_journaling_size.store(bytes, Ordering::Relaxed);
    }

    pub fn max_write_buffer_size(&self) -> u64 {
        self.inner.max_write_buffer_size.load(Ordering::Relaxed)
    }

    pub(crate) fn set_max_write_buffer_size(&self, bytes: u64) {
        self.inner.max_write_buffer_size.store(bytes, Ordering::Relaxed);
    }

    /// Interval of the background fsync in milliseconds, 0 when disabled.
    pub fn fsync_ms(&self) -> u16 {
        self.inner.fsync_ms.load(Ordering::Relaxed)
    }

    pub(crate) fn set_fsync_ms(&self, ms: u16) {
        self.inner.fsync_ms.store(ms, Ordering::Relaxed);
    }

    /// Bits per key of partition bloom filters, negative when disabled.
    pub fn bloom_filter_bits(&self) -> i8 {
        self.inner.bloom_filter_bits.load(Ordering::Relaxed)
    }

    pub(crate) fn set_bloom_filter_bits(&self, bits: i8) {
        self.inner.bloom_filter_bits.store(bits, Ordering::Relaxed);
    }

    pub fn compression_type(&self) -> CompressionType {
        self.inner.compression_type.read_with(|it| *it)
    }

    pub(crate) fn set_compression_type(&self, compression: CompressionType) {
        self.inner.compression_type.write_with(|it| *it = compression);
    }

    pub fn max_memtable_size(&self) -> u32 {
        self.inner.max_memtable_size.load(Ordering::Relaxed)
    }

    pub(crate) fn set_max_memtable_size(&self, bytes: u32) {
        self.inner.max_memtable_size.store(bytes, Ordering::Relaxed);
    }

    pub fn block_size(&self) -> u32 {
        self.inner.block_size.load(Ordering::Relaxed)
    }

    pub(crate) fn set_block_size(&self, bytes: u32) {
        self.inner.block_size.store(bytes, Ordering::Relaxed);
    }

    /// Whether large values are kept apart from the keys in blob files.
    pub fn kv_separated(&self) -> bool {
        self.inner.kv_separated.load(Ordering::Relaxed)
    }

    pub(crate) fn set_kv_separated(&self, value: bool) {
        self.inner.kv_separated.store(value, Ordering::Relaxed);
    }
}

struct FjallConfigInner {
    db_path: Atomic<String>,
    sync_on_commit: AtomicBool,
    manual_journal_persist: AtomicBool,
    flush_workers: AtomicUsize,
    compaction_workers: AtomicUsize,
    cache_size: AtomicU64,
    max_journaling_size: AtomicU64,
    max_write_buffer_size: AtomicU64,
    fsync_ms: AtomicU16,
    bloom_filter_bits: AtomicI8,
    compression_type: Atomic<CompressionType>,
    max_memtable_size: AtomicU32,
    block_size: AtomicU32,
    kv_separated: AtomicBool,
}

impl FjallConfigInner {
    fn new() -> FjallConfigInner {
        let cpus = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(4);

        FjallConfigInner {
            db_path: atomic(String::new()),
            sync_on_commit: AtomicBool::new(true),
            manual_journal_persist: AtomicBool::new(false),
            flush_workers: AtomicUsize::new(cpus.max(1)),
            compaction_workers: AtomicUsize::new((cpus / 2).max(1)),
            cache_size: AtomicU64::new(64 * MB),
            max_journaling_size: AtomicU64::new(512 * MB),
            max_write_buffer_size: AtomicU64::new(128 * MB),
            fsync_ms: AtomicU16::new(0),
            bloom_filter_bits: AtomicI8::new(10),
            compression_type: atomic(CompressionType::Lz4),
            max_memtable_size: AtomicU32::new(32 * MB as u32),
            block_size: AtomicU32::new(4 * 1_024),
            kv_separated: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FjallConfig::new();
        assert_eq!(config.db_path(), "");
        assert!(config.sync_on_commit());
        assert!(!config.manual_journal_persist());
        assert!(config.flush_workers() >= 1);
        assert!(config.compaction_workers() >= 1);
        assert_eq!(config.cache_size(), 64 * MB);
        assert_eq!(config.bloom_filter_bits(), 10);
        assert_eq!(config.compression_type(), CompressionType::Lz4);
        assert_eq!(config.block_size(), 4_096);
        assert!(!config.kv_separated());
    }

    #[test]
    fn clones_share_settings() {
        let config = FjallConfig::new();
        let other = config.clone();
        other.set_db_path("/tmp/nest");
        other.set_sync_on_commit(false);
        other.set_flush_workers(0);

        assert_eq!(config.db_path(), "/tmp/nest");
        assert!(!config.sync_on_commit());
        // at least one worker is kept
        assert_eq!(config.flush_workers(), 1);
    }

    #[test]
    fn builds_engine_configs() {
        let config = FjallConfig::new();
        config.set_db_path("/tmp/nest");
        config.set_fsync_ms(100);
        config.set_bloom_filter_bits(-1);
        config.set_kv_separated(true);

        // both conversions accept every combination of settings
        let _ = config.keyspace_config();
        let _ = config.partition_config();
    }
}
