use crate::config::FjallConfig;
use crate::map::FjallMap;
use crate::version::fjall_version;
use crate::wrapper::{to_nest_error, FjallAdapterError, MAX_PARTITION_NAME_LEN};
use dashmap::DashMap;
use fjall::{Keyspace, PersistMode};
use nestdb::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use nestdb::errors::{NestError, NestResult};
use nestdb::store::{NestMap, NestMapProvider, NestStoreProvider, WriteBatch};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Durable store keeping every map in its own partition of one fjall keyspace.
///
/// A [`WriteBatch`] is written as one fjall batch, so all maps it touches
/// change together or not at all, also across a crash. With
/// [`sync_on_commit`](FjallConfig::sync_on_commit) the journal is fsynced
/// before `apply` returns.
#[derive(Clone)]
pub struct FjallStore {
    inner: Arc<FjallStoreInner>,
}

impl FjallStore {
    pub fn new(config: FjallConfig) -> FjallStore {
        FjallStore {
            inner: Arc::new(FjallStoreInner::new(config)),
        }
    }

    /// Maps a store map name onto the characters fjall allows in partition
    /// names. Alphanumerics, `-`, `#` and `$` are kept, every other byte
    /// (`_` included) becomes `_` followed by two hex digits.
    pub(crate) fn encode_name(name: &str) -> NestResult<String> {
        if name.is_empty() {
            log::error!("Map name must not be empty");
            return Err(FjallAdapterError::EmptyName.into());
        }

        let mut encoded = String::with_capacity(name.len());
        for byte in name.bytes() {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'#' | b'$' => {
                    encoded.push(byte as char)
                }
                _ => encoded.push_str(&format!("_{:02X}", byte)),
            }
        }

        if encoded.len() > MAX_PARTITION_NAME_LEN {
            log::error!("Map name {} is too long for a partition", name);
            return Err(FjallAdapterError::NameTooLong(name.to_string(), encoded.len()).into());
        }
        Ok(encoded)
    }

    pub(crate) fn decode_name(encoded: &str) -> NestResult<String> {
        let malformed = |reason: &str| -> NestError {
            log::error!("Partition name {} is malformed: {}", encoded, reason);
            FjallAdapterError::MalformedName(encoded.to_string(), reason.to_string()).into()
        };

        let bytes = encoded.as_bytes();
        let mut decoded = Vec::with_capacity(bytes.len());
        let mut index = 0;
        while index < bytes.len() {
            if bytes[index] == b'_' {
                let hex = encoded
                    .get(index + 1..index + 3)
                    .ok_or_else(|| malformed("truncated escape"))?;
                let byte = u8::from_str_radix(hex, 16).map_err(|_| malformed("bad escape"))?;
                decoded.push(byte);
                index += 3;
            } else {
                decoded.push(bytes[index]);
                index += 1;
            }
        }
        String::from_utf8(decoded).map_err(|_| malformed("not utf-8"))
    }
}

impl NestStoreProvider for FjallStore {
    fn open_or_create(&self) -> NestResult<()> {
        self.inner.open_or_create()
    }

    fn is_closed(&self) -> NestResult<bool> {
        Ok(self.inner.closed.load(Ordering::Acquire))
    }

    fn commit(&self) -> NestResult<()> {
        let keyspace = self.inner.keyspace()?;
        keyspace
            .persist(PersistMode::SyncAll)
            .map_err(|e| to_nest_error("Failed to persist keyspace", e))
    }

    fn close(&self) -> NestResult<()> {
        self.inner.close()
    }

    fn has_map(&self, name: &str) -> NestResult<bool> {
        let keyspace = match self.inner.keyspace.read_with(|it| it.clone()) {
            Some(keyspace) => keyspace,
            None => return Ok(false),
        };
        let encoded = FjallStore::encode_name(name)?;
        Ok(keyspace.partition_exists(&encoded))
    }

    fn open_map(&self, name: &str) -> NestResult<NestMap> {
        Ok(NestMap::new(self.inner.open_map(name)?))
    }

    fn remove_map(&self, name: &str) -> NestResult<()> {
        self.inner.remove_map(name)
    }

    fn map_names(&self) -> NestResult<Vec<String>> {
        let keyspace = self.inner.keyspace()?;
        let mut names = keyspace
            .list_partitions()
            .iter()
            .map(|partition| FjallStore::decode_name(partition))
            .collect::<NestResult<Vec<String>>>()?;
        names.sort();
        Ok(names)
    }

    fn apply(&self, batch: WriteBatch) -> NestResult<()> {
        self.inner.apply(batch)
    }

    fn store_version(&self) -> NestResult<String> {
        Ok(format!("Fjall/{}", fjall_version()?))
    }
}

struct FjallStoreInner {
    keyspace: Atomic<Option<Keyspace>>,
    closed: AtomicBool,
    config: FjallConfig,
    map_registry: DashMap<String, FjallMap>,
}

impl FjallStoreInner {
    fn new(config: FjallConfig) -> FjallStoreInner {
        FjallStoreInner {
            keyspace: atomic(None),
            closed: AtomicBool::new(true),
            config,
            map_registry: DashMap::new(),
        }
    }

    fn keyspace(&self) -> NestResult<Keyspace> {
        match self.keyspace.read_with(|it| it.clone()) {
            Some(keyspace) => Ok(keyspace),
            None => {
                log::error!("Fjall keyspace is not open");
                Err(FjallAdapterError::KeyspaceNotOpen.into())
            }
        }
    }

    fn open_or_create(&self) -> NestResult<()> {
        if self.keyspace.read_with(|it| it.is_some()) {
            self.closed.store(false, Ordering::Release);
            return Ok(());
        }

        let path = self.config.db_path();
        if path.is_empty() {
            log::error!("Cannot open a fjall store without a database path");
            return Err(FjallAdapterError::MissingPath.into());
        }

        let keyspace = Keyspace::open(self.config.keyspace_config())
            .map_err(|e| to_nest_error(&format!("Failed to open keyspace at {}", path), e))?;
        self.keyspace.write_with(|it| *it = Some(keyspace));
        self.closed.store(false, Ordering::Release);
        log::info!("Opened fjall keyspace at {}", path);
        Ok(())
    }

    fn open_map(&self, name: &str) -> NestResult<FjallMap> {
        if let Some(map) = self.map_registry.get(name) {
            if !map.is_closed()? {
                return Ok(map.clone());
            }
        }

        let keyspace = self.keyspace()?;
        let encoded = FjallStore::encode_name(name)?;
        let partition = keyspace
            .open_partition(&encoded, self.config.partition_config())
            .map_err(|e| to_nest_error(&format!("Failed to open partition for {}", name), e))?;

        let map = FjallMap::new(name, partition, keyspace);
        self.map_registry.insert(name.to_string(), map.clone());
        Ok(map)
    }

    fn remove_map(&self, name: &str) -> NestResult<()> {
        let keyspace = self.keyspace()?;
        if let Some((_, map)) = self.map_registry.remove(name) {
            map.close()?;
        }

        let encoded = FjallStore::encode_name(name)?;
        if !keyspace.partition_exists(&encoded) {
            return Ok(());
        }

        let partition = keyspace
            .open_partition(&encoded, self.config.partition_config())
            .map_err(|e| to_nest_error(&format!("Failed to open partition for {}", name), e))?;
        keyspace
            .delete_partition(partition)
            .map_err(|e| to_nest_error(&format!("Failed to delete partition for {}", name), e))?;
        log::debug!("Removed map {}", name);
        Ok(())
    }

    fn apply(&self, batch: WriteBatch) -> NestResult<()> {
        let keyspace = self.keyspace()?;
        let mut fjall_batch = keyspace.batch();
        for (name, operations) in batch.iter() {
            let map = self.open_map(name)?;
            for (key, value) in operations.iter() {
                match value {
                    Some(value) => fjall_batch.insert(map.partition(), key.clone(), value.clone()),
                    None => fjall_batch.remove(map.partition(), key.clone()),
                }
            }
        }

        fjall_batch
            .commit()
            .map_err(|e| to_nest_error("Failed to commit write batch", e))?;

        if self.config.sync_on_commit() {
            keyspace
                .persist(PersistMode::SyncAll)
                .map_err(|e| to_nest_error("Failed to sync write batch", e))?;
        }
        Ok(())
    }

    fn close(&self) -> NestResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            log::warn!("Fjall store is already closed");
            return Ok(());
        }

        for entry in self.map_registry.iter() {
            entry.value().close()?;
        }
        self.map_registry.clear();

        if let Some(keyspace) = self.keyspace.write_with(|it| it.take()) {
            keyspace
                .persist(PersistMode::SyncAll)
                .map_err(|e| to_nest_error("Failed to persist keyspace on close", e))?;
        }
        log::info!("Closed fjall store at {}", self.config.db_path());
        Ok(())
    }
}

impl Drop for FjallStoreInner {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Err(e) = self.close() {
            log::error!("Failed to close fjall store on drop: {}", e);
        }
    }
}
