//! Publish boundary

use crate::model::RaceEvent;
use anyhow::Result;
use std::sync::{Arc, Mutex};

/// Sink for events produced by the engine
///
/// Delivery is best-effort and at-most-once. Implementations must not block:
/// a slow or disconnected observer is the transport's problem, and the engine
/// ignores any error returned here.
pub trait Publisher: Send + Sync {
    /// Get the name of this publisher (e.g., "broadcast")
    fn name(&self) -> &str;

    /// Hand one event to the transport
    fn publish(&self, event: RaceEvent) -> Result<()>;
}

/// Publisher that keeps every event in memory, for tests and replays
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    events: Arc<Mutex<Vec<RaceEvent>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RaceEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Type names of the recorded events, in publish order
    pub fn type_names(&self) -> Vec<&'static str> {
        self.events().iter().map(RaceEvent::type_name).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Publisher for MemoryPublisher {
    fn name(&self) -> &str {
        "memory"
    }

    fn publish(&self, event: RaceEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("memory publisher poisoned"))?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventPayload, FlagKind, RaceFlag};
    use chrono::Utc;

    #[test]
    fn test_memory_publisher_records_in_order() {
        let publisher = MemoryPublisher::new();
        let flag = RaceFlag {
            kind: FlagKind::Yellow,
            sector: Some(2),
            timestamp: Utc::now(),
            active: true,
        };
        publisher
            .publish(RaceEvent::new(Utc::now(), EventPayload::FlagChange(flag)))
            .unwrap();
        publisher
            .publish(RaceEvent::new(Utc::now(), EventPayload::WeatherUpdate(vec![])))
            .unwrap();

        assert_eq!(publisher.type_names(), vec!["flag_change", "weather_update"]);

        let clone = publisher.clone();
        clone.clear();
        assert!(publisher.events().is_empty());
    }
}
