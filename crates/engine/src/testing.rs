//! In-memory collaborators for unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use core_types::{
    CaptionsMap, FaceRegion, ImageId, ImageSize, ItemPosition, MetadataTemplate, TagId,
};

use crate::collaborators::{
    FacesMap, FileMetadataSink, ItemSink, ItemSnapshot, ItemSource, TagRegistry,
};
use crate::{EngineError, Result};

#[derive(Debug, Default)]
pub struct FakeRegistry {
    paths: BTreeMap<TagId, String>,
    internal: HashSet<TagId>,
    persons: HashSet<TagId>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, id: i64, path: &str) -> Self {
        self.paths.insert(TagId(id), path.to_string());
        self
    }

    pub fn with_person(mut self, id: i64, path: &str) -> Self {
        self.persons.insert(TagId(id));
        self.with_tag(id, path)
    }

    pub fn with_internal(mut self, id: i64, path: &str) -> Self {
        self.internal.insert(TagId(id));
        self.with_tag(id, path)
    }
}

impl TagRegistry for FakeRegistry {
    fn tag_path(&self, id: TagId) -> Option<String> {
        self.paths.get(&id).cloned()
    }

    fn tag_for_path(&self, path: &str) -> Option<TagId> {
        self.paths
            .iter()
            .find(|(_, candidate)| candidate.as_str() == path)
            .map(|(id, _)| *id)
    }

    fn is_internal(&self, id: TagId) -> bool {
        self.internal.contains(&id)
    }

    fn is_person(&self, id: TagId) -> bool {
        self.persons.contains(&id)
    }
}

/// Item store counting every write it receives.
#[derive(Debug, Default)]
pub struct FakeStore {
    items: RefCell<BTreeMap<ImageId, ItemSnapshot>>,
    calls: RefCell<HashMap<&'static str, usize>>,
    rejects_all: bool,
    rejected: HashSet<&'static str>,
}

impl FakeStore {
    pub const UNKNOWN_PERSON: TagId = TagId(-1);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, snapshot: ItemSnapshot) -> Self {
        self.items.borrow_mut().insert(snapshot.id, snapshot);
        self
    }

    /// Every write is rejected.
    pub fn failing(mut self) -> Self {
        self.rejects_all = true;
        self
    }

    /// Only calls named `name` are rejected.
    pub fn failing_on(mut self, name: &'static str) -> Self {
        self.rejected.insert(name);
        self
    }

    pub fn item(&self, id: ImageId) -> ItemSnapshot {
        self.items.borrow()[&id].clone()
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.borrow().get(name).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.borrow().values().sum()
    }

    fn update(
        &self,
        name: &'static str,
        id: ImageId,
        apply: impl FnOnce(&mut ItemSnapshot),
    ) -> Result<()> {
        *self.calls.borrow_mut().entry(name).or_default() += 1;
        if self.rejects_all || self.rejected.contains(name) {
            return Err(EngineError::Store(format!("{name} rejected")));
        }
        let mut items = self.items.borrow_mut();
        let item = items
            .get_mut(&id)
            .ok_or_else(|| EngineError::Store(format!("no item {}", id.0)))?;
        apply(item);
        Ok(())
    }
}

impl ItemSource for FakeStore {
    fn read_item(&self, id: ImageId) -> Result<Option<ItemSnapshot>> {
        Ok(self.items.borrow().get(&id).cloned())
    }
}

impl ItemSink for FakeStore {
    fn replace_titles(&self, id: ImageId, titles: &CaptionsMap) -> Result<()> {
        self.update("replace_titles", id, |item| item.titles = titles.clone())
    }

    fn replace_comments(&self, id: ImageId, comments: &CaptionsMap) -> Result<()> {
        self.update("replace_comments", id, |item| {
            item.comments = comments.clone()
        })
    }

    fn set_date_time(&self, id: ImageId, date_time: DateTime<Utc>) -> Result<()> {
        self.update("set_date_time", id, |item| {
            item.date_time = Some(date_time)
        })
    }

    fn set_pick_label(&self, id: ImageId, pick_label: i32) -> Result<()> {
        self.update("set_pick_label", id, |item| item.pick_label = pick_label)
    }

    fn set_color_label(&self, id: ImageId, color_label: i32) -> Result<()> {
        self.update("set_color_label", id, |item| {
            item.color_label = color_label
        })
    }

    fn set_rating(&self, id: ImageId, rating: i32) -> Result<()> {
        self.update("set_rating", id, |item| item.rating = rating)
    }

    fn set_template(&self, id: ImageId, template: &MetadataTemplate) -> Result<()> {
        self.update("set_template", id, |item| item.template = template.clone())
    }

    fn remove_template(&self, id: ImageId) -> Result<()> {
        self.update("remove_template", id, |item| {
            item.template = MetadataTemplate::default()
        })
    }

    fn add_tag(&self, id: ImageId, tag: TagId) -> Result<()> {
        self.update("add_tag", id, |item| {
            if !item.tag_ids.contains(&tag) {
                item.tag_ids.push(tag);
                item.tag_ids.sort();
            }
        })
    }

    fn remove_tag(&self, id: ImageId, tag: TagId) -> Result<()> {
        self.update("remove_tag", id, |item| item.tag_ids.retain(|t| *t != tag))
    }

    fn face_regions(&self, id: ImageId) -> Result<Vec<FaceRegion>> {
        let mut faces = Vec::new();
        self.update("face_regions", id, |item| faces = item.faces.clone())?;
        Ok(faces)
    }

    fn clear_face_tag(&self, id: ImageId, region: &FaceRegion) -> Result<()> {
        self.update("clear_face_tag", id, |item| {
            for face in item.faces.iter_mut().filter(|face| *face == region) {
                face.tag_id = Self::UNKNOWN_PERSON;
            }
        })
    }
}

/// File metadata document recording the last value of every setter.
#[derive(Debug, Default)]
pub struct FakeFileSink {
    pub titles: Option<CaptionsMap>,
    pub comments: Option<CaptionsMap>,
    pub date_time: Option<DateTime<Utc>>,
    pub pick_label: Option<i32>,
    pub color_label: Option<i32>,
    pub rating: Option<i32>,
    pub template: Option<MetadataTemplate>,
    pub template_removed: bool,
    pub position: Option<ItemPosition>,
    pub position_removed: bool,
    pub tag_paths: Option<Vec<String>>,
    pub faces: Option<(FacesMap, ImageSize)>,
    pub applied: usize,
}

impl FileMetadataSink for FakeFileSink {
    fn set_item_titles(&mut self, titles: &CaptionsMap) -> Result<bool> {
        self.titles = Some(titles.clone());
        Ok(true)
    }

    fn set_item_comments(&mut self, comments: &CaptionsMap) -> Result<bool> {
        self.comments = Some(comments.clone());
        Ok(true)
    }

    fn set_image_date_time(&mut self, date_time: DateTime<Utc>) -> Result<bool> {
        self.date_time = Some(date_time);
        Ok(true)
    }

    fn set_item_pick_label(&mut self, pick_label: i32) -> Result<bool> {
        self.pick_label = Some(pick_label);
        Ok(true)
    }

    fn set_item_color_label(&mut self, color_label: i32) -> Result<bool> {
        self.color_label = Some(color_label);
        Ok(true)
    }

    fn set_item_rating(&mut self, rating: i32) -> Result<bool> {
        self.rating = Some(rating);
        Ok(true)
    }

    fn set_metadata_template(&mut self, template: &MetadataTemplate) -> Result<bool> {
        self.template = Some(template.clone());
        Ok(true)
    }

    fn remove_metadata_template(&mut self) -> Result<bool> {
        self.template_removed = true;
        Ok(true)
    }

    fn set_gps_info(&mut self, position: &ItemPosition) -> Result<bool> {
        self.position = Some(*position);
        Ok(true)
    }

    fn remove_gps_info(&mut self) -> Result<bool> {
        self.position_removed = true;
        Ok(true)
    }

    fn set_item_tags_path(&mut self, paths: &[String]) -> Result<bool> {
        self.tag_paths = Some(paths.to_vec());
        Ok(true)
    }

    fn set_item_faces_map(&mut self, faces: &FacesMap, size: ImageSize) -> Result<bool> {
        self.faces = Some((faces.clone(), size));
        Ok(true)
    }

    fn apply_changes(&mut self) -> Result<()> {
        self.applied += 1;
        Ok(())
    }
}
