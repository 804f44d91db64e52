use crate::collection::NestId;
use crate::errors::{ErrorKind, NestError, NestResult};
use log::{debug, info};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::Rng;

const NODE_ID_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_NODE_ID: u64 = (1 << NODE_ID_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const TIMESTAMP_LEFT_SHIFT: u64 = SEQUENCE_BITS + NODE_ID_BITS;
const EPOCH: u64 = 1288834974657;

struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
    last_id: u64,
}

/// Snowflake style id source: millisecond timestamp, random node id and a
/// per-millisecond sequence.
///
/// Ids handed out by one generator are strictly increasing, even when the wall
/// clock steps backwards or the sequence of one millisecond runs out. Calling
/// [`advance_past`](Self::advance_past) with the largest id already stored keeps
/// that guarantee across restarts.
pub struct SnowflakeIdGenerator {
    node_id: u64,
    state: Mutex<GeneratorState>,
}

impl SnowflakeIdGenerator {
    pub fn new() -> Self {
        let node_id = Self::random_node_id();
        info!("Initialized id generator with node id: {}", node_id);
        SnowflakeIdGenerator {
            node_id,
            state: Mutex::new(GeneratorState {
                last_timestamp: 0,
                sequence: 0,
                last_id: 0,
            }),
        }
    }

    /// Fails with [`ErrorKind::InvalidId`] once the id space is used up, which
    /// only happens after an explicit id near `u64::MAX` was stored.
    pub fn next_id(&self) -> NestResult<NestId> {
        let mut state = self.state.lock();

        let mut timestamp = Self::current_millis().max(state.last_timestamp);
        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // sequence exhausted, borrow the next millisecond
                timestamp += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = timestamp;

        let mut id = (timestamp.saturating_sub(EPOCH) << TIMESTAMP_LEFT_SHIFT)
            | (self.node_id << SEQUENCE_BITS)
            | state.sequence;
        if id <= state.last_id {
            id = match state.last_id.checked_add(1) {
                Some(next) => next,
                None => {
                    log::error!("Id space exhausted after {}", state.last_id);
                    return Err(NestError::new(
                        &format!("No id left after {}", state.last_id),
                        ErrorKind::InvalidId,
                    ));
                }
            };
        }
        state.last_id = id;
        Ok(NestId::from(id))
    }

    /// Makes every later id larger than `id`.
    pub fn advance_past(&self, id: &NestId) {
        let mut state = self.state.lock();
        if id.value() > state.last_id {
            debug!("Advancing id generator past {}", id);
            state.last_id = id.value();
        }
    }

    fn current_millis() -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }

    fn random_node_id() -> u64 {
        let uuid = uuid::Uuid::new_v4();
        let uid = uuid.as_bytes();
        let rnd_byte = OsRng.gen::<u64>() & 0xFF;
        ((uid[uid.len() - 1] as u64) | (rnd_byte << 8)) & MAX_NODE_ID
    }
}

impl Default for SnowflakeIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
