//! Sliding window over an entity stream.
//!
//! To answer "what is the valid_to date of this version" or "is this the last version of the
//! entity" the importer has to look one entity ahead; to answer "was this an area before it got
//! deleted" it has to look one behind. [`EntityTracker`] keeps exactly those three snapshots.

use thiserror::Error;

use crate::data::osm::{Entity, OsmId, Timestamp};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// `feed` was called while a next entity was still staged. Always a driver bug.
    #[error("protocol violation: fed entity {fed} while entity {pending} is still staged as next, swap() first")]
    ProtocolViolation { pending: OsmId, fed: OsmId },
}

/// Previous, current and next version seen in an entity stream.
///
/// The tracker owns clones of what it is fed, so the driver is free to reuse its buffers.
#[derive(Debug, Clone)]
pub struct EntityTracker<T> {
    previous: Option<T>,
    current: Option<T>,
    next: Option<T>,
}

impl<T> Default for EntityTracker<T> {
    fn default() -> Self {
        EntityTracker {
            previous: None,
            current: None,
            next: None,
        }
    }
}

impl<T: Entity + Clone> EntityTracker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `entity` as the next one.
    ///
    /// Fails without touching the window if a next entity is already staged.
    pub fn feed(&mut self, entity: &T) -> Result<(), TrackerError> {
        if let Some(pending) = &self.next {
            return Err(TrackerError::ProtocolViolation {
                pending: pending.id(),
                fed: entity.id(),
            });
        }
        self.next = Some(entity.clone());
        Ok(())
    }

    /// Shift the window: current becomes previous, next becomes current, next is emptied.
    pub fn swap(&mut self) {
        self.previous = self.current.take();
        self.current = self.next.take();
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    pub fn previous(&self) -> Option<&T> {
        self.previous.as_ref()
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn next(&self) -> Option<&T> {
        self.next.as_ref()
    }

    /// Current is not the first version of its entity.
    pub fn previous_is_same_entity(&self) -> bool {
        match (&self.previous, &self.current) {
            (Some(previous), Some(current)) => previous.id() == current.id(),
            _ => false,
        }
    }

    /// Current is not the last version of its entity.
    pub fn next_is_same_entity(&self) -> bool {
        match (&self.current, &self.next) {
            (Some(current), Some(next)) => current.id() == next.id(),
            _ => false,
        }
    }

    /// End of the validity of the current version, `None` while it is the latest one.
    pub fn valid_to(&self) -> Option<Timestamp> {
        if self.next_is_same_entity() {
            self.next.as_ref().map(Entity::timestamp)
        } else {
            None
        }
    }
}
