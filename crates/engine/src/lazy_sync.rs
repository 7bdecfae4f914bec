//! Deferred file metadata writes.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use app_settings::MetadataSettings;
use core_types::{ImageId, WriteComponents};
use tracing::{debug, info, warn};

use crate::collaborators::{FileMetadataSink, ItemSource, TagRegistry};
use crate::hub::MetadataHub;
use crate::Result;

/// Items whose file metadata still has to be synchronized. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct PendingWrites {
    items: Arc<Mutex<BTreeSet<ImageId>>>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pending(&self, id: ImageId) {
        let mut items = self.items.lock().expect("pending writes poisoned");
        if items.insert(id) {
            debug!(image = id.0, queued = items.len(), "queued file metadata write");
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("pending writes poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns every queued item in id order.
    pub fn take_all(&self) -> Vec<ImageId> {
        let items = std::mem::take(&mut *self.items.lock().expect("pending writes poisoned"));
        items.into_iter().collect()
    }

    /// Writes every queued item with all components. Returns how many files
    /// were actually changed. Items whose file could not be written stay queued.
    pub fn flush<S, F>(
        &self,
        source: &dyn ItemSource,
        registry: Arc<dyn TagRegistry>,
        settings: &MetadataSettings,
        mut open_sink: F,
    ) -> usize
    where
        S: FileMetadataSink,
        F: FnMut(ImageId) -> Result<S>,
    {
        let pending = self.take_all();
        if pending.is_empty() {
            return 0;
        }

        let mut written = 0;
        let mut retained = 0;
        for id in &pending {
            let mut hub = MetadataHub::new(Arc::clone(&registry));
            if !hub.load(source, *id) {
                continue;
            }
            if !hub.will_write_metadata(WriteComponents::ALL, settings) {
                continue;
            }
            match hub.write_file(*id, &mut open_sink, WriteComponents::ALL, settings) {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(image = id.0, error = %err, "file metadata write failed, kept queued");
                    self.add_pending(*id);
                    retained += 1;
                }
            }
        }

        info!(
            pending = pending.len(),
            written,
            retained,
            "flushed lazy metadata writes"
        );
        written
    }
}
