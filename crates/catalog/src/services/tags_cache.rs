//! Thread-safe in-memory copy of the tag hierarchy.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

use core_types::TagId;
use engine::TagRegistry;

use crate::db::Tag;

#[derive(Debug, Clone)]
struct TagEntry {
    parent: Option<TagId>,
    name: String,
    internal: bool,
    person: bool,
    excluded_from_writing: bool,
}

impl From<&Tag> for TagEntry {
    fn from(tag: &Tag) -> Self {
        Self {
            parent: tag.parent_id.map(TagId),
            name: tag.name.clone(),
            internal: tag.internal,
            person: tag.person,
            excluded_from_writing: tag.excluded_from_writing,
        }
    }
}

/// Answers registry queries without touching the database, so it can be
/// shared with aggregates on any thread.
#[derive(Debug, Default)]
pub struct TagsCache {
    entries: RwLock<HashMap<TagId, TagEntry>>,
}

impl TagsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tags(tags: &[Tag]) -> Self {
        let cache = Self::new();
        cache.reload(tags);
        cache
    }

    pub fn reload(&self, tags: &[Tag]) {
        let entries = tags
            .iter()
            .map(|tag| (TagId(tag.id), TagEntry::from(tag)))
            .collect();
        *self.entries.write().expect("tags cache poisoned") = entries;
    }

    pub fn insert(&self, tag: &Tag) {
        self.entries
            .write()
            .expect("tags cache poisoned")
            .insert(TagId(tag.id), TagEntry::from(tag));
    }

    /// Drops `id` and all of its descendants. Returns every removed id.
    pub fn remove(&self, id: TagId) -> Vec<TagId> {
        let mut entries = self.entries.write().expect("tags cache poisoned");
        if !entries.contains_key(&id) {
            return Vec::new();
        }

        let mut removed = vec![id];
        let mut cursor = 0;
        while cursor < removed.len() {
            let parent = removed[cursor];
            removed.extend(
                entries
                    .iter()
                    .filter(|(_, entry)| entry.parent == Some(parent))
                    .map(|(child, _)| *child),
            );
            cursor += 1;
        }
        for tag in &removed {
            entries.remove(tag);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: TagId) -> bool {
        self.read().contains_key(&id)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TagId, TagEntry>> {
        self.entries.read().expect("tags cache poisoned")
    }
}

impl TagRegistry for TagsCache {
    fn tag_path(&self, id: TagId) -> Option<String> {
        let entries = self.read();
        let mut segments = Vec::new();
        let mut current = Some(id);

        while let Some(tag) = current {
            let entry = entries.get(&tag)?;
            segments.push(entry.name.as_str());
            if segments.len() > entries.len() {
                return None;
            }
            current = entry.parent;
        }

        segments.reverse();
        Some(segments.join("/"))
    }

    fn tag_for_path(&self, path: &str) -> Option<TagId> {
        let entries = self.read();
        let mut parent: Option<TagId> = None;

        for name in path.split('/').filter(|segment| !segment.is_empty()) {
            let (id, _) = entries
                .iter()
                .find(|(_, entry)| entry.parent == parent && entry.name == name)?;
            parent = Some(*id);
        }
        parent
    }

    fn is_internal(&self, id: TagId) -> bool {
        self.read().get(&id).map_or(false, |entry| entry.internal)
    }

    fn is_person(&self, id: TagId) -> bool {
        self.read().get(&id).map_or(false, |entry| entry.person)
    }

    fn can_be_written_to_metadata(&self, id: TagId) -> bool {
        self.read()
            .get(&id)
            .map_or(false, |entry| !entry.internal && !entry.excluded_from_writing)
    }
}
