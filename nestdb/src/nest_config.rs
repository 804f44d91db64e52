//! Configuration of a database handle.

use crate::common::{atomic, Atomic, FieldValue, ReadExecutor, WriteExecutor, DEFAULT_LANGUAGE_TAG};
use crate::errors::{ErrorKind, NestError, NestResult};
use crate::index::text::{Language, LanguageRegistry, Tokenizer};
use crate::mapper::{Convertible, LeafFamily, MapperRegistry, NestMapper};
use crate::store::memory::InMemoryStoreModule;
use crate::store::{NestStore, StoreModule};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Settings shared by every part of one database.
///
/// All registrations happen before [`initialize`](Self::initialize), which
/// freezes them: the mapper registries become an immutable [`NestMapper`], the
/// active language turns into a [`Tokenizer`] and the store module opens its
/// store. Any change attempted afterwards fails with
/// [`ErrorKind::InvalidOperation`].
#[derive(Clone)]
pub struct NestConfig {
    inner: Arc<NestConfigInner>,
}

impl Default for NestConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl NestConfig {
    pub fn new() -> Self {
        NestConfig {
            inner: Arc::new(NestConfigInner::new()),
        }
    }

    /// Uses `module` as the source of the store. Without one, data is kept in
    /// memory.
    pub fn load_module<T: StoreModule + 'static>(&self, module: T) -> NestResult<()> {
        self.inner.check_mutable("load a store module")?;
        let module: Arc<dyn StoreModule> = Arc::new(module);
        self.inner.store_module.write_with(|it| *it = Some(module));
        Ok(())
    }

    pub fn register_leaf_type<T: FieldValue + 'static>(&self) -> NestResult<()> {
        self.inner.check_mutable("register a leaf type")?;
        self.inner
            .mapper_registry
            .write_with(|it| it.register_leaf_type::<T>());
        Ok(())
    }

    pub fn register_leaf_family(&self, family: LeafFamily) -> NestResult<()> {
        self.inner.check_mutable("register a leaf family")?;
        self.inner
            .mapper_registry
            .write_with(|it| it.register_leaf_family(family));
        Ok(())
    }

    pub fn register_convertible<T: Convertible>(&self) -> NestResult<()> {
        self.inner.check_mutable("register a convertible type")?;
        self.inner
            .mapper_registry
            .write_with(|it| it.register_convertible::<T>());
        Ok(())
    }

    pub fn register_factory<T, F>(&self, factory: F) -> NestResult<()>
    where
        T: Convertible,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.inner.check_mutable("register a factory")?;
        self.inner
            .mapper_registry
            .write_with(|it| it.register_factory::<T, F>(factory));
        Ok(())
    }

    pub fn register_language<L: Language + 'static>(&self, language: L) -> NestResult<()> {
        self.inner.check_mutable("register a language")?;
        self.inner.languages.write_with(|it| it.register(language));
        Ok(())
    }

    /// Selects the language whose stop words full-text indices drop.
    pub fn set_language(&self, tag: &str) -> NestResult<()> {
        self.inner.check_mutable("change the language")?;
        self.inner.language_tag.write_with(|it| *it = tag.to_string());
        Ok(())
    }

    pub fn language(&self) -> String {
        self.inner.language_tag.read_with(|it| it.clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.configured.load(Ordering::Acquire)
    }

    /// The store, once the configuration is initialized.
    pub fn nest_store(&self) -> NestResult<NestStore> {
        self.inner.store.get().cloned().ok_or_else(|| {
            log::error!("Store requested before the configuration was initialized");
            NestError::new(
                "Store is not initialized",
                ErrorKind::StoreNotInitialized,
            )
        })
    }

    /// The frozen mapper, once the configuration is initialized.
    pub fn mapper(&self) -> NestResult<NestMapper> {
        self.inner.frozen().map(|frozen| frozen.mapper.clone())
    }

    pub(crate) fn tokenizer(&self) -> NestResult<Tokenizer> {
        self.inner.frozen().map(|frozen| frozen.tokenizer.clone())
    }

    /// Freezes the registrations and opens the store. Runs once; later calls
    /// are rejected.
    pub(crate) fn initialize(&self) -> NestResult<NestStore> {
        self.inner.initialize()
    }
}

struct Frozen {
    mapper: NestMapper,
    tokenizer: Tokenizer,
}

struct NestConfigInner {
    configured: AtomicBool,
    store_module: Atomic<Option<Arc<dyn StoreModule>>>,
    mapper_registry: Atomic<MapperRegistry>,
    languages: Atomic<LanguageRegistry>,
    language_tag: Atomic<String>,
    frozen: OnceLock<Frozen>,
    store: OnceLock<NestStore>,
}

impl NestConfigInner {
    fn new() -> Self {
        NestConfigInner {
            configured: AtomicBool::new(false),
            store_module: atomic(None),
            mapper_registry: atomic(MapperRegistry::default()),
            languages: atomic(LanguageRegistry::new()),
            language_tag: atomic(DEFAULT_LANGUAGE_TAG.to_string()),
            frozen: OnceLock::new(),
            store: OnceLock::new(),
        }
    }

    fn check_mutable(&self, action: &str) -> NestResult<()> {
        if self.configured.load(Ordering::Acquire) {
            log::error!("Cannot {} after initialization", action);
            return Err(NestError::new(
                &format!("Cannot {} after initialization", action),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn frozen(&self) -> NestResult<&Frozen> {
        self.frozen.get().ok_or_else(|| {
            log::error!("Configuration is not initialized");
            NestError::new(
                "Configuration is not initialized",
                ErrorKind::InvalidOperation,
            )
        })
    }

    fn initialize(&self) -> NestResult<NestStore> {
        if self
            .configured
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::error!("Configuration is already initialized");
            return Err(NestError::new(
                "Configuration is already initialized",
                ErrorKind::InvalidOperation,
            ));
        }

        let tag = self.language_tag.read_with(|it| it.clone());
        let stop_words = self.languages.read_with(|it| it.stop_words(&tag))?;
        let mapper = NestMapper::new(self.mapper_registry.read_with(|it| it.clone()));
        let _ = self.frozen.set(Frozen {
            mapper,
            tokenizer: Tokenizer::new(stop_words),
        });

        let module = self
            .store_module
            .read_with(|it| it.clone())
            .unwrap_or_else(|| Arc::new(InMemoryStoreModule::new()) as Arc<dyn StoreModule>);
        let store = module.get_store()?;
        store.open_or_create()?;
        log::info!("Opened store {}", store.store_version()?);

        let _ = self.store.set(store.clone());
        Ok(store)
    }
}
