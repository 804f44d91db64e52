use std::fmt::{Debug, Display};

/// Identifier of a stored document, kept in the reserved `_id` field.
///
/// Ids are assigned by the database's [`SnowflakeIdGenerator`](super::snowflake::SnowflakeIdGenerator)
/// on first insertion and never change afterwards. Callers may also supply
/// their own ids, in which case any `u64` is accepted.
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy, serde::Deserialize, serde::Serialize)]
pub struct NestId {
    id_value: u64,
}

impl NestId {
    #[inline]
    pub fn value(&self) -> u64 {
        self.id_value
    }
}

impl From<u64> for NestId {
    #[inline]
    fn from(id_value: u64) -> Self {
        NestId { id_value }
    }
}

impl From<NestId> for u64 {
    #[inline]
    fn from(id: NestId) -> Self {
        id.id_value
    }
}

impl Debug for NestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NestId({})", self.id_value)
    }
}

impl Display for NestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id_value)
    }
}
