use std::net::SocketAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Bookkeeping for one live handler unit.
#[derive(Debug, Clone)]
pub struct UnitRecord {
    pub peer: SocketAddr,
    pub started: Instant,
}

impl UnitRecord {
    pub fn new(peer: SocketAddr) -> Self {
        UnitRecord {
            peer,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Handler units that were spawned but whose termination has not been reaped yet.
///
/// The dispatcher inserts, the reaper releases; nothing else touches it.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: DashMap<u64, UnitRecord>,
}

impl UnitRegistry {
    pub fn track(&self, unit_id: u64, record: UnitRecord) {
        self.units.insert(unit_id, record);
    }

    pub fn release(&self, unit_id: u64) -> Option<UnitRecord> {
        self.units.remove(&unit_id).map(|(_, record)| record)
    }

    pub fn outstanding(&self) -> usize {
        self.units.len()
    }

    pub fn is_tracked(&self, unit_id: u64) -> bool {
        self.units.contains_key(&unit_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_and_release() {
        let registry = UnitRegistry::default();
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        registry.track(1, UnitRecord::new(peer));
        registry.track(2, UnitRecord::new(peer));
        assert_eq!(registry.outstanding(), 2);

        let record = registry.release(1).unwrap();
        assert_eq!(record.peer, peer);
        assert!(!registry.is_tracked(1));
        assert!(registry.release(1).is_none());
        assert_eq!(registry.outstanding(), 1);
    }
}
