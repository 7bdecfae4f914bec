//! Cross-thread change notifications.
//!
//! Store watchers run on background threads and only append to a queue; the
//! owner of an aggregate drains that queue on its own thread before touching
//! its state.

use std::sync::{Arc, Mutex, Weak};

use core_types::TagId;
use tracing::trace;

/// Album a deletion event refers to. Only tag albums matter to aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlbumRef {
    Physical(i64),
    Tag(TagId),
    Search(i64),
    Date(i64),
}

impl AlbumRef {
    pub fn as_tag(self) -> Option<TagId> {
        match self {
            Self::Tag(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingChanges {
    pub deleted_tags: Vec<TagId>,
    pub invalidated: bool,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.deleted_tags.is_empty() && !self.invalidated
    }
}

/// Per-aggregate inbox for notifications.
#[derive(Debug, Clone, Default)]
pub struct ChangeQueue {
    inner: Arc<Mutex<PendingChanges>>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag_deleted(&self, id: TagId) {
        self.inner
            .lock()
            .expect("change queue poisoned")
            .deleted_tags
            .push(id);
    }

    pub fn invalidate(&self) {
        self.inner.lock().expect("change queue poisoned").invalidated = true;
    }

    /// Takes everything queued so far, leaving the queue empty.
    pub fn take(&self) -> PendingChanges {
        std::mem::take(&mut *self.inner.lock().expect("change queue poisoned"))
    }

    fn downgrade(&self) -> Weak<Mutex<PendingChanges>> {
        Arc::downgrade(&self.inner)
    }
}

/// Fan-out point for store notifications. Clones share the subscriber list.
#[derive(Debug, Clone, Default)]
pub struct NotificationHub {
    subscribers: Arc<Mutex<Vec<Weak<Mutex<PendingChanges>>>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh queue that receives every later notification.
    pub fn subscribe(&self) -> ChangeQueue {
        let queue = ChangeQueue::new();
        self.subscribers
            .lock()
            .expect("notification hub poisoned")
            .push(queue.downgrade());
        queue
    }

    pub fn tag_deleted(&self, id: TagId) {
        trace!(tag = id.0, "broadcasting tag deletion");
        self.broadcast(|pending| pending.deleted_tags.push(id));
    }

    /// Forwards tag albums as tag deletions and ignores every other kind.
    pub fn album_deleted(&self, album: AlbumRef) {
        if let Some(id) = album.as_tag() {
            self.tag_deleted(id);
        }
    }

    pub fn invalidate(&self) {
        trace!("broadcasting store invalidation");
        self.broadcast(|pending| pending.invalidated = true);
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().expect("notification hub poisoned");
        subscribers.retain(|weak| weak.strong_count() > 0);
        subscribers.len()
    }

    fn broadcast(&self, apply: impl Fn(&mut PendingChanges)) {
        let mut subscribers = self.subscribers.lock().expect("notification hub poisoned");
        subscribers.retain(|weak| match weak.upgrade() {
            Some(queue) => {
                apply(&mut queue.lock().expect("change queue poisoned"));
                true
            }
            None => false,
        });
    }
}
