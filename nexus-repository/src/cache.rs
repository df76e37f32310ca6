//! A ~100 ms TTL read cache fronting the store. Absorbs
//! tick-loop hot-path lookups without the store ever observing that
//! traffic. The externally observable
//! contract is all that matters: a successful `save` followed by a `load`
//! returns the saved value, and repeated saves of unchanged data don't
//! amplify store traffic.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use nexus_core::ids::CharacterId;

use crate::record::PlayerRecord;

pub const CACHE_TTL: Duration = Duration::from_millis(100);

struct Entry {
    record: PlayerRecord,
    cached_at: Instant,
}

#[derive(Default)]
pub struct ReadCache {
    entries: DashMap<CharacterId, Entry>,
}

impl ReadCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: CharacterId) -> Option<PlayerRecord> {
        let entry = self.entries.get(&id)?;
        if entry.cached_at.elapsed() > CACHE_TTL {
            return None;
        }
        Some(entry.record.clone())
    }

    /// Updated synchronously on every write (write-behind: the cache never
    /// waits on the store).
    pub fn put(&self, record: PlayerRecord) {
        self.entries.insert(
            record.character_id,
            Entry {
                record,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, id: CharacterId) {
        self.entries.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::ids::AccountId;
    use std::thread::sleep;

    #[test]
    fn entries_expire_after_ttl() {
        let cache = ReadCache::new();
        let record = PlayerRecord::new(AccountId::new(), "Alice".into(), "human".into());
        let id = record.character_id;
        cache.put(record);
        assert!(cache.get(id).is_some());
        sleep(CACHE_TTL + Duration::from_millis(20));
        assert!(cache.get(id).is_none());
    }
}
