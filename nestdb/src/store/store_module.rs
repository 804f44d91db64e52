use crate::errors::NestResult;
use crate::store::NestStore;

/// Supplies the storage engine a database runs on.
pub trait StoreModule: Send + Sync {
    fn get_store(&self) -> NestResult<NestStore>;
}
