// document constants
pub const DOC_ID: &str = "_id";
pub const RESERVED_FIELDS: [&str; 1] = [DOC_ID];
pub const FIELD_SEPARATOR: char = '.';

// store constants
pub const CATALOG_MAP_NAME: &str = "$nest_catalog";
pub const SYSTEM_NAME_PREFIX: &str = "$";
pub const NAME_SEPARATOR: &str = "|";

// index constants
pub const UNIQUE_INDEX: &str = "unique";
pub const NON_UNIQUE_INDEX: &str = "non-unique";
pub const FULL_TEXT_INDEX: &str = "full-text";
pub const INDEX_PREFIX: &str = "$nest_index";

// full-text constants
pub const DEFAULT_LANGUAGE_TAG: &str = "en";

pub const NEST_VERSION: &str = env!("CARGO_PKG_VERSION");
