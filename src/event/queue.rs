use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::Event;

/// FIFO shared between the loop thread (producer) and any number of
/// polling threads. Each lock is held for a single push or pop.
pub struct EventQueue {
    events: Mutex<VecDeque<Event>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, event: Event) {
        if event.is_none() {
            log::debug!("Ignoring attempt to queue an empty event");
            return;
        }
        self.lock().push_back(event);
    }

    /// Removes the oldest event, or returns `Event::None` without waiting.
    pub fn pop(&self) -> Event {
        self.lock().pop_front().unwrap_or(Event::None)
    }

    pub fn drain(&self) -> Vec<Event> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
