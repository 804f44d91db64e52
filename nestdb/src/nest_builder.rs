use crate::common::FieldValue;
use crate::errors::{NestError, NestResult};
use crate::index::text::Language;
use crate::mapper::{Convertible, LeafFamily};
use crate::nest::Nest;
use crate::nest_config::NestConfig;
use crate::store::StoreModule;

/// Fluent configuration of a [`Nest`] database.
///
/// A failing call does not stop the chain. The first error is kept and
/// returned by [`open_or_create`](Self::open_or_create).
///
/// # Examples
///
/// ```rust
/// use nestdb::nest::Nest;
///
/// let db = Nest::builder()
///     .language("en")
///     .open_or_create()
///     .unwrap();
/// assert!(!db.is_closed().unwrap());
/// ```
#[derive(Default)]
pub struct NestBuilder {
    error: Option<NestError>,
    config: NestConfig,
}

impl NestBuilder {
    pub fn new() -> Self {
        NestBuilder {
            error: None,
            config: NestConfig::new(),
        }
    }

    /// Loads the store module the database opens its store from.
    pub fn load_module<T: StoreModule + 'static>(self, module: T) -> Self {
        self.apply(|config| config.load_module(module))
    }

    /// Treats `T` as an atomic value in documents.
    pub fn register_leaf_type<T: FieldValue + 'static>(self) -> Self {
        self.apply(|config| config.register_leaf_type::<T>())
    }

    pub fn register_leaf_family(self, family: LeafFamily) -> Self {
        self.apply(|config| config.register_leaf_family(family))
    }

    pub fn register_convertible<T: Convertible>(self) -> Self {
        self.apply(|config| config.register_convertible::<T>())
    }

    /// Registers how blank instances of `T` are created when reading it back.
    pub fn register_factory<T, F>(self, factory: F) -> Self
    where
        T: Convertible,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.apply(|config| config.register_factory::<T, F>(factory))
    }

    pub fn register_language<L: Language + 'static>(self, language: L) -> Self {
        self.apply(|config| config.register_language(language))
    }

    /// Selects the stop-word language of full-text indices by tag.
    pub fn language(self, tag: &str) -> Self {
        self.apply(|config| config.set_language(tag))
    }

    /// Opens the database, or reports the first configuration error.
    pub fn open_or_create(self) -> NestResult<Nest> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Nest::open(self.config)
    }

    fn apply<F>(mut self, action: F) -> Self
    where
        F: FnOnce(&NestConfig) -> NestResult<()>,
    {
        if self.error.is_none() {
            if let Err(e) = action(&self.config) {
                self.error = Some(e);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::index::text::CustomLanguage;
    use crate::store::memory::InMemoryStoreModule;

    #[test]
    fn opens_with_defaults() {
        let db = NestBuilder::new().open_or_create().unwrap();
        assert!(!db.is_closed().unwrap());
        assert_eq!(db.config().language(), "en");
    }

    #[test]
    fn first_error_is_reported() {
        let builder = NestBuilder::new().load_module(InMemoryStoreModule::new());
        builder.config.initialize().unwrap();

        let err = builder
            .language("en")
            .register_language(CustomLanguage::new("xx", ["a"]))
            .open_or_create()
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        assert!(err.message().contains("change the language"));
    }

    #[test]
    fn custom_language_can_be_selected() {
        let db = NestBuilder::new()
            .register_language(CustomLanguage::new("xx", ["a"]))
            .language("xx")
            .open_or_create()
            .unwrap();
        assert_eq!(db.config().language(), "xx");
    }

    #[test]
    fn unknown_language_fails_open() {
        let err = NestBuilder::new().language("zz").open_or_create().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }
}
