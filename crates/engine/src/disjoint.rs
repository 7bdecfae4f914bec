//! Aggregated metadata of a multi-item selection.

use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use app_settings::MetadataSettings;
use chrono::{DateTime, Utc};
use core_types::{
    color_label, pick_label, CaptionsMap, ImageId, MetadataTemplate, Status, TagId,
    WriteComponents, UNSET_LABEL,
};
use tracing::{debug, trace, warn};

use crate::collaborators::{ItemSink, ItemSnapshot, ItemSource, TagRegistry, TemplateLookup};
use crate::notify::{ChangeQueue, NotificationHub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// Write every available field.
    FullWrite,
    /// Write the available fields the user changed through a setter.
    FullWriteIfChanged,
    /// Same eligibility as `FullWriteIfChanged`; used for incremental commits.
    PartialWrite,
}

/// Plain state of an aggregate. Cheap to clone and compare.
#[derive(Debug, Clone, PartialEq)]
pub struct DisjointMetadataFields {
    pub count: usize,

    pub date_time: Option<DateTime<Utc>>,
    pub last_date_time: Option<DateTime<Utc>>,
    pub titles: CaptionsMap,
    pub comments: CaptionsMap,
    pub pick_label: i32,
    pub highest_pick_label: i32,
    pub color_label: i32,
    pub highest_color_label: i32,
    pub rating: i32,
    pub highest_rating: i32,
    pub metadata_template: MetadataTemplate,

    pub date_time_status: Status,
    pub titles_status: Status,
    pub comments_status: Status,
    pub pick_label_status: Status,
    pub color_label_status: Status,
    pub rating_status: Status,
    pub template_status: Status,

    /// Tags present on at least one loaded item, plus tags touched by `set_tag`.
    pub tags: BTreeMap<TagId, Status>,
    /// At least one loaded item had no user tags.
    pub without_tags: bool,

    /// Fields modified through a setter since the last `reset_changed`.
    pub changed: WriteComponents,
}

impl Default for DisjointMetadataFields {
    fn default() -> Self {
        Self {
            count: 0,
            date_time: None,
            last_date_time: None,
            titles: CaptionsMap::new(),
            comments: CaptionsMap::new(),
            pick_label: UNSET_LABEL,
            highest_pick_label: UNSET_LABEL,
            color_label: UNSET_LABEL,
            highest_color_label: UNSET_LABEL,
            rating: UNSET_LABEL,
            highest_rating: UNSET_LABEL,
            metadata_template: MetadataTemplate::default(),
            date_time_status: Status::Invalid,
            titles_status: Status::Invalid,
            comments_status: Status::Invalid,
            pick_label_status: Status::Invalid,
            color_label_status: Status::Invalid,
            rating_status: Status::Invalid,
            template_status: Status::Invalid,
            tags: BTreeMap::new(),
            without_tags: false,
            changed: WriteComponents::empty(),
        }
    }
}

impl DisjointMetadataFields {
    fn merge_snapshot(&mut self, snapshot: &ItemSnapshot, template: &MetadataTemplate) {
        if let Some(date_time) = snapshot.date_time {
            merge_ordered(
                Some(date_time),
                &mut self.date_time,
                &mut self.last_date_time,
                &mut self.date_time_status,
            );
        }
        merge_ordered(
            snapshot.pick_label,
            &mut self.pick_label,
            &mut self.highest_pick_label,
            &mut self.pick_label_status,
        );
        merge_ordered(
            snapshot.color_label,
            &mut self.color_label,
            &mut self.highest_color_label,
            &mut self.color_label_status,
        );
        merge_ordered(
            snapshot.rating,
            &mut self.rating,
            &mut self.highest_rating,
            &mut self.rating_status,
        );
        merge_value(&snapshot.titles, &mut self.titles, &mut self.titles_status);
        merge_value(
            &snapshot.comments,
            &mut self.comments,
            &mut self.comments_status,
        );
        merge_value(
            template,
            &mut self.metadata_template,
            &mut self.template_status,
        );
    }

    /// Must run after `count` includes the item being merged.
    fn merge_tags(&mut self, loaded: &BTreeSet<TagId>) {
        for (id, status) in self.tags.iter_mut() {
            if *status == Status::Available && !loaded.contains(id) {
                *status = Status::Disjoint;
            }
        }
        if loaded.is_empty() {
            self.without_tags = true;
            return;
        }

        // Only the first loaded item can make a tag common to every item.
        let on_every_item = self.count == 1 && !self.without_tags;
        for id in loaded {
            if on_every_item {
                self.tags.insert(*id, Status::Available);
            } else {
                self.tags.entry(*id).or_insert(Status::Disjoint);
            }
        }
    }
}

/// Keeps the first value; any later different value makes the field disjoint.
fn merge_value<T: PartialEq + Clone>(value: &T, storage: &mut T, status: &mut Status) {
    match status {
        Status::Invalid => {
            *storage = value.clone();
            *status = Status::Available;
        }
        Status::Available => {
            if storage != value {
                *status = Status::Disjoint;
            }
        }
        Status::Disjoint => {}
    }
}

/// Tracks the lowest value in `lowest` and the highest one in `highest`.
fn merge_ordered<T: PartialOrd + Clone>(
    value: T,
    lowest: &mut T,
    highest: &mut T,
    status: &mut Status,
) {
    match status {
        Status::Invalid => {
            *lowest = value.clone();
            *highest = value;
            *status = Status::Available;
        }
        Status::Available | Status::Disjoint => {
            if *status == Status::Available && *lowest != value {
                *status = Status::Disjoint;
            }
            if value < *lowest {
                *lowest = value;
            } else if value > *highest {
                *highest = value;
            }
        }
    }
}

/// Which fields a write pass touches. `write` and `will_write_metadata` both go
/// through [`WritePlan::compute`] so they cannot disagree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct WritePlan {
    titles: bool,
    comments: bool,
    date_time: bool,
    pick_label: bool,
    color_label: bool,
    rating: bool,
    template: bool,
    tags: bool,
}

impl WritePlan {
    fn compute(
        fields: &DisjointMetadataFields,
        mode: WriteMode,
        settings: &MetadataSettings,
    ) -> Self {
        let write_all = mode == WriteMode::FullWrite;
        let eligible = |enabled: bool, status: Status, component: WriteComponents| {
            enabled
                && status == Status::Available
                && (write_all || fields.changed.contains(component))
        };
        let template = &fields.metadata_template;

        Self {
            titles: eligible(
                settings.save_comments,
                fields.titles_status,
                WriteComponents::TITLE,
            ),
            comments: eligible(
                settings.save_comments,
                fields.comments_status,
                WriteComponents::COMMENTS,
            ),
            date_time: eligible(
                settings.save_date_time,
                fields.date_time_status,
                WriteComponents::DATETIME,
            ) && fields.date_time.is_some(),
            pick_label: eligible(
                settings.save_pick_label,
                fields.pick_label_status,
                WriteComponents::PICK_LABEL,
            ),
            color_label: eligible(
                settings.save_color_label,
                fields.color_label_status,
                WriteComponents::COLOR_LABEL,
            ),
            rating: eligible(
                settings.save_rating,
                fields.rating_status,
                WriteComponents::RATING,
            ),
            template: eligible(
                settings.save_template,
                fields.template_status,
                WriteComponents::TEMPLATE,
            ) && (template.is_removal() || !template.is_empty()),
            tags: (settings.save_tags || settings.save_face_tags)
                && (write_all || fields.changed.contains(WriteComponents::TAGS))
                && fields.tags.values().any(|status| *status != Status::Disjoint),
        }
    }

    fn any(&self) -> bool {
        self.titles
            || self.comments
            || self.date_time
            || self.pick_label
            || self.color_label
            || self.rating
            || self.template
            || self.tags
    }
}

fn applied(field: &str, id: ImageId, result: crate::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!(image = id.0, field, error = %err, "metadata write rejected");
            false
        }
    }
}

/// Metadata of a multi-item selection, reconciled field by field.
///
/// Notifications about deleted tags or an invalidated store may arrive on any
/// thread through the aggregate's [`ChangeQueue`]; they are applied before the
/// next read, load or write.
pub struct DisjointMetadataSet {
    data: RefCell<DisjointMetadataFields>,
    registry: Arc<dyn TagRegistry>,
    templates: Option<Arc<dyn TemplateLookup + Send + Sync>>,
    queue: ChangeQueue,
    notifications: Option<NotificationHub>,
}

impl DisjointMetadataSet {
    pub fn new(registry: Arc<dyn TagRegistry>) -> Self {
        Self {
            data: RefCell::new(DisjointMetadataFields::default()),
            registry,
            templates: None,
            queue: ChangeQueue::new(),
            notifications: None,
        }
    }

    /// Creates an aggregate subscribed to `hub`.
    pub fn with_notifications(registry: Arc<dyn TagRegistry>, hub: &NotificationHub) -> Self {
        Self {
            queue: hub.subscribe(),
            notifications: Some(hub.clone()),
            ..Self::new(registry)
        }
    }

    pub fn with_template_lookup(mut self, lookup: Arc<dyn TemplateLookup + Send + Sync>) -> Self {
        self.templates = Some(lookup);
        self
    }

    /// Handle for delivering notifications to this aggregate only.
    pub fn change_queue(&self) -> ChangeQueue {
        self.queue.clone()
    }

    pub fn reset(&mut self) {
        self.queue.take();
        *self.data.get_mut() = DisjointMetadataFields::default();
    }

    pub fn count(&self) -> usize {
        self.fields().count
    }

    pub fn data_fields(&self) -> DisjointMetadataFields {
        self.fields().clone()
    }

    pub fn set_data_fields(&mut self, fields: DisjointMetadataFields) {
        self.queue.take();
        *self.data.get_mut() = fields;
    }

    /// Reads `id` from `source` and merges it. Returns false when the item does
    /// not exist or could not be read.
    pub fn load(&mut self, source: &dyn ItemSource, id: ImageId) -> bool {
        match source.read_item(id) {
            Ok(Some(snapshot)) => {
                self.load_snapshot(&snapshot);
                true
            }
            Ok(None) => {
                debug!(image = id.0, "ignoring load of unknown item");
                false
            }
            Err(err) => {
                warn!(image = id.0, error = %err, "failed to read item metadata");
                false
            }
        }
    }

    pub fn load_snapshot(&mut self, snapshot: &ItemSnapshot) {
        self.apply_pending_changes();

        let template = self
            .templates
            .as_ref()
            .and_then(|lookup| lookup.find_by_contents(&snapshot.template))
            .unwrap_or_else(|| snapshot.template.clone());

        let loaded: BTreeSet<TagId> = snapshot
            .tag_ids
            .iter()
            .copied()
            .filter(|id| !self.registry.is_internal(*id))
            .collect();

        let data = self.data.get_mut();
        data.count += 1;
        data.merge_snapshot(snapshot, &template);
        data.merge_tags(&loaded);

        trace!(
            image = snapshot.id.0,
            count = data.count,
            tags = data.tags.len(),
            "merged item into aggregate"
        );
    }

    pub fn date_time_status(&self) -> Status {
        self.fields().date_time_status
    }

    pub fn titles_status(&self) -> Status {
        self.fields().titles_status
    }

    pub fn comments_status(&self) -> Status {
        self.fields().comments_status
    }

    pub fn pick_label_status(&self) -> Status {
        self.fields().pick_label_status
    }

    pub fn color_label_status(&self) -> Status {
        self.fields().color_label_status
    }

    pub fn rating_status(&self) -> Status {
        self.fields().rating_status
    }

    pub fn template_status(&self) -> Status {
        self.fields().template_status
    }

    /// `Invalid` when no loaded item carries the tag.
    pub fn tag_status(&self, id: TagId) -> Status {
        self.fields()
            .tags
            .get(&id)
            .copied()
            .unwrap_or(Status::Invalid)
    }

    pub fn tag_status_by_path(&self, path: &str) -> Status {
        match self.registry.tag_for_path(path) {
            Some(id) => self.tag_status(id),
            None => Status::Invalid,
        }
    }

    pub fn date_time_changed(&self) -> bool {
        self.is_changed(WriteComponents::DATETIME)
    }

    pub fn titles_changed(&self) -> bool {
        self.is_changed(WriteComponents::TITLE)
    }

    pub fn comments_changed(&self) -> bool {
        self.is_changed(WriteComponents::COMMENTS)
    }

    pub fn pick_label_changed(&self) -> bool {
        self.is_changed(WriteComponents::PICK_LABEL)
    }

    pub fn color_label_changed(&self) -> bool {
        self.is_changed(WriteComponents::COLOR_LABEL)
    }

    pub fn rating_changed(&self) -> bool {
        self.is_changed(WriteComponents::RATING)
    }

    pub fn template_changed(&self) -> bool {
        self.is_changed(WriteComponents::TEMPLATE)
    }

    pub fn tags_changed(&self) -> bool {
        self.is_changed(WriteComponents::TAGS)
    }

    /// Fields the user touched, as the mask for a file synchronization pass.
    pub fn changed_flags(&self) -> WriteComponents {
        self.fields().changed
    }

    pub fn reset_changed(&mut self) {
        self.data.get_mut().changed = WriteComponents::empty();
    }

    pub fn set_date_time(&mut self, date_time: DateTime<Utc>, status: Status) {
        let data = self.fields_mut();
        data.date_time = Some(date_time);
        data.last_date_time = Some(date_time);
        data.date_time_status = status;
        data.changed |= WriteComponents::DATETIME;
    }

    pub fn set_titles(&mut self, titles: CaptionsMap, status: Status) {
        let data = self.fields_mut();
        data.titles = titles;
        data.titles_status = status;
        data.changed |= WriteComponents::TITLE;
    }

    pub fn set_comments(&mut self, comments: CaptionsMap, status: Status) {
        let data = self.fields_mut();
        data.comments = comments;
        data.comments_status = status;
        data.changed |= WriteComponents::COMMENTS;
    }

    pub fn set_pick_label(&mut self, pick_label: i32, status: Status) {
        let data = self.fields_mut();
        data.pick_label = pick_label;
        data.highest_pick_label = pick_label;
        data.pick_label_status = status;
        data.changed |= WriteComponents::PICK_LABEL;
    }

    pub fn set_color_label(&mut self, color_label: i32, status: Status) {
        let data = self.fields_mut();
        data.color_label = color_label;
        data.highest_color_label = color_label;
        data.color_label_status = status;
        data.changed |= WriteComponents::COLOR_LABEL;
    }

    pub fn set_rating(&mut self, rating: i32, status: Status) {
        let data = self.fields_mut();
        data.rating = rating;
        data.highest_rating = rating;
        data.rating_status = status;
        data.changed |= WriteComponents::RATING;
    }

    pub fn set_metadata_template(&mut self, template: MetadataTemplate, status: Status) {
        let data = self.fields_mut();
        data.metadata_template = template;
        data.template_status = status;
        data.changed |= WriteComponents::TEMPLATE;
    }

    /// `Status::Invalid` marks the tag for removal on the next write.
    pub fn set_tag(&mut self, id: TagId, status: Status) {
        let data = self.fields_mut();
        data.tags.insert(id, status);
        data.changed |= WriteComponents::TAGS;
    }

    /// Adopts a value changed elsewhere without recording a pending edit.
    pub fn replace_color_label(&mut self, color_label: i32) {
        let data = self.fields_mut();
        data.color_label = color_label;
        data.highest_color_label = color_label;
        data.color_label_status = Status::Available;
        data.changed.remove(WriteComponents::COLOR_LABEL);
    }

    pub fn replace_pick_label(&mut self, pick_label: i32) {
        let data = self.fields_mut();
        data.pick_label = pick_label;
        data.highest_pick_label = pick_label;
        data.pick_label_status = Status::Available;
        data.changed.remove(WriteComponents::PICK_LABEL);
    }

    pub fn replace_rating(&mut self, rating: i32) {
        let data = self.fields_mut();
        data.rating = rating;
        data.highest_rating = rating;
        data.rating_status = Status::Available;
        data.changed.remove(WriteComponents::RATING);
    }

    /// Earliest date when disjoint; `None` when invalid.
    pub fn date_time(&self) -> Option<DateTime<Utc>> {
        self.fields().date_time
    }

    /// First loaded titles when disjoint.
    pub fn titles(&self) -> CaptionsMap {
        self.fields().titles.clone()
    }

    pub fn comments(&self) -> CaptionsMap {
        self.fields().comments.clone()
    }

    /// The "no label" value when disjoint, `-1` when invalid.
    pub fn pick_label(&self) -> i32 {
        let data = self.fields();
        match data.pick_label_status {
            Status::Disjoint => pick_label::NONE,
            _ => data.pick_label,
        }
    }

    /// The "no label" value when disjoint, `-1` when invalid.
    pub fn color_label(&self) -> i32 {
        let data = self.fields();
        match data.color_label_status {
            Status::Disjoint => color_label::NONE,
            _ => data.color_label,
        }
    }

    /// Lowest rating when disjoint, `-1` when invalid.
    pub fn rating(&self) -> i32 {
        self.fields().rating
    }

    pub fn metadata_template(&self) -> MetadataTemplate {
        self.fields().metadata_template.clone()
    }

    pub fn date_time_interval(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let data = self.fields();
        match data.date_time_status {
            Status::Invalid => (None, None),
            Status::Available => (data.date_time, data.date_time),
            Status::Disjoint => (data.date_time, data.last_date_time),
        }
    }

    pub fn pick_label_interval(&self) -> (i32, i32) {
        let data = self.fields();
        interval(
            data.pick_label_status,
            data.pick_label,
            data.highest_pick_label,
        )
    }

    pub fn color_label_interval(&self) -> (i32, i32) {
        let data = self.fields();
        interval(
            data.color_label_status,
            data.color_label,
            data.highest_color_label,
        )
    }

    pub fn rating_interval(&self) -> (i32, i32) {
        let data = self.fields();
        interval(data.rating_status, data.rating, data.highest_rating)
    }

    /// Paths of the tags carried by every loaded item.
    pub fn keywords(&self) -> Vec<String> {
        self.fields()
            .tags
            .iter()
            .filter(|(_, status)| **status == Status::Available)
            .filter_map(|(id, _)| self.registry.tag_path(*id))
            .collect()
    }

    pub fn tags(&self) -> BTreeMap<TagId, Status> {
        self.fields().tags.clone()
    }

    /// Pushes the eligible fields into `id`. Returns true if at least one field
    /// was accepted by the sink.
    pub fn write(
        &mut self,
        sink: &dyn ItemSink,
        id: ImageId,
        mode: WriteMode,
        settings: &MetadataSettings,
    ) -> bool {
        self.apply_pending_changes();

        let data = self.data.get_mut();
        let plan = WritePlan::compute(data, mode, settings);
        if !plan.any() {
            trace!(image = id.0, ?mode, "nothing to write");
            return false;
        }

        let mut changed = false;

        if plan.titles {
            changed |= applied("titles", id, sink.replace_titles(id, &data.titles));
        }
        if plan.comments {
            changed |= applied("comments", id, sink.replace_comments(id, &data.comments));
        }
        if plan.date_time {
            if let Some(date_time) = data.date_time {
                changed |= applied("date_time", id, sink.set_date_time(id, date_time));
            }
        }
        if plan.pick_label {
            changed |= applied("pick_label", id, sink.set_pick_label(id, data.pick_label));
        }
        if plan.color_label {
            changed |= applied(
                "color_label",
                id,
                sink.set_color_label(id, data.color_label),
            );
        }
        if plan.rating {
            changed |= applied("rating", id, sink.set_rating(id, data.rating));
        }
        if plan.template {
            let result = if data.metadata_template.is_removal() {
                sink.remove_template(id)
            } else {
                sink.set_template(id, &data.metadata_template)
            };
            changed |= applied("template", id, result);
        }
        if plan.tags {
            changed |= write_tags(self.registry.as_ref(), &data.tags, sink, id);
        }

        debug!(image = id.0, ?mode, changed, "wrote aggregate metadata");
        changed
    }

    /// True when `write` with the same mode and settings would touch the sink.
    pub fn will_write_metadata(&self, mode: WriteMode, settings: &MetadataSettings) -> bool {
        WritePlan::compute(&self.fields(), mode, settings).any()
    }

    fn is_changed(&self, component: WriteComponents) -> bool {
        self.fields().changed.contains(component)
    }

    fn fields(&self) -> Ref<'_, DisjointMetadataFields> {
        self.apply_pending_changes();
        self.data.borrow()
    }

    fn fields_mut(&mut self) -> &mut DisjointMetadataFields {
        self.apply_pending_changes();
        self.data.get_mut()
    }

    fn apply_pending_changes(&self) {
        let pending = self.queue.take();
        if pending.is_empty() {
            return;
        }

        let mut data = self.data.borrow_mut();
        if pending.invalidated {
            debug!("store invalidated, resetting aggregate");
            *data = DisjointMetadataFields::default();
            return;
        }
        for id in pending.deleted_tags {
            if data.tags.remove(&id).is_some() {
                trace!(tag = id.0, "pruned deleted tag");
            }
        }
    }
}

fn interval(status: Status, lowest: i32, highest: i32) -> (i32, i32) {
    match status {
        Status::Invalid => (UNSET_LABEL, UNSET_LABEL),
        Status::Available => (lowest, lowest),
        Status::Disjoint => (lowest, highest),
    }
}

fn write_tags(
    registry: &dyn TagRegistry,
    tags: &BTreeMap<TagId, Status>,
    sink: &dyn ItemSink,
    id: ImageId,
) -> bool {
    let mut changed = false;

    for (tag, status) in tags {
        match status {
            Status::Available => {
                changed |= applied("tags", id, sink.add_tag(id, *tag));
            }
            Status::Invalid => {
                if registry.is_person(*tag) {
                    match sink.face_regions(id) {
                        Ok(regions) => {
                            for region in regions.iter().filter(|r| r.tag_id == *tag) {
                                applied("face_regions", id, sink.clear_face_tag(id, region));
                            }
                        }
                        Err(err) => {
                            warn!(image = id.0, tag = tag.0, error = %err, "failed to list face regions");
                        }
                    }
                }
                changed |= applied("tags", id, sink.remove_tag(id, *tag));
            }
            Status::Disjoint => {}
        }
    }

    changed
}

impl Clone for DisjointMetadataSet {
    /// Copies the state; the copy gets its own, empty notification queue.
    fn clone(&self) -> Self {
        let data = self.data_fields();
        let queue = match &self.notifications {
            Some(hub) => hub.subscribe(),
            None => ChangeQueue::new(),
        };
        Self {
            data: RefCell::new(data),
            registry: Arc::clone(&self.registry),
            templates: self.templates.clone(),
            queue,
            notifications: self.notifications.clone(),
        }
    }
}

impl fmt::Debug for DisjointMetadataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisjointMetadataSet")
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
