use crate::types::{Event, EventSeverity, EventType};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use switchyard_core::SwitchyardResult;
use tracing::{debug, error};
use uuid::Uuid;

/// Callback invoked synchronously for every recorded event of a subscribed type.
pub type EventCallback = Arc<dyn Fn(&Event) -> SwitchyardResult<()> + Send + Sync>;

struct EventHandler {
    id: Uuid,
    name: String,
    event_types: Vec<EventType>,
    callback: EventCallback,
}

/// Filters for [`EventStore::query`]. Empty vectors and `None` mean "no filter".
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub event_types: Vec<EventType>,
    pub sources: Vec<String>,
    pub severity: Option<EventSeverity>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(mut self, event_type: EventType) -> Self {
        self.event_types.push(event_type);
        self
    }

    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, event: &Event) -> bool {
        (self.event_types.is_empty() || self.event_types.contains(&event.event_type))
            && (self.sources.is_empty() || self.sources.iter().any(|s| *s == event.source))
            && self.severity.map_or(true, |sev| sev == event.severity)
            && self.start_time.map_or(true, |start| event.timestamp >= start)
            && self.end_time.map_or(true, |end| event.timestamp <= end)
    }
}

/// Bounded ring buffer of events with typed handler dispatch.
///
/// Once `capacity` events are stored, each append silently evicts the oldest.
pub struct EventStore {
    capacity: usize,
    events: Mutex<VecDeque<Event>>,
    handlers: RwLock<Vec<EventHandler>>,
}

impl EventStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event, then run every handler subscribed to its type.
    ///
    /// Handler errors and panics are logged and swallowed; the append has
    /// already happened by the time handlers run.
    pub fn record(&self, event: Event) -> Event {
        {
            let mut events = self.events.lock();
            if self.capacity == 0 {
                debug!(event_id = %event.id, "Event store has zero capacity, dropping event");
            } else {
                while events.len() >= self.capacity {
                    events.pop_front();
                }
                events.push_back(event.clone());
            }
        }

        // Handlers may record further events, so they run outside the buffer lock.
        let subscribed: Vec<(String, EventCallback)> = self
            .handlers
            .read()
            .iter()
            .filter(|h| h.event_types.contains(&event.event_type))
            .map(|h| (h.name.clone(), Arc::clone(&h.callback)))
            .collect();

        for (name, callback) in subscribed {
            match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(handler = %name, event_id = %event.id, error = %e, "Event handler failed");
                }
                Err(_) => {
                    error!(handler = %name, event_id = %event.id, "Event handler panicked");
                }
            }
        }

        event
    }

    /// Subscribe `callback` to the given event types. Returns the handler id.
    pub fn register_handler(
        &self,
        name: impl Into<String>,
        event_types: Vec<EventType>,
        callback: EventCallback,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.handlers.write().push(EventHandler {
            id,
            name: name.into(),
            event_types,
            callback,
        });
        id
    }

    pub fn unregister_handler(&self, id: Uuid) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|h| h.id != id);
        handlers.len() != before
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Filtered read, newest timestamp first. Equal timestamps keep the
    /// latest recorded first.
    pub fn query(&self, query: &EventQuery) -> Vec<Event> {
        let mut matching: Vec<Event> = {
            let events = self.events.lock();
            events.iter().rev().filter(|e| query.matches(e)).cloned().collect()
        };
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        matching
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
