//! Single-item synchronization of catalog values into file metadata.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use app_settings::MetadataSettings;
use core_types::{ImageId, Status, TagId, WriteComponents};
use tracing::{debug, trace, warn};

use crate::collaborators::{FacesMap, FileMetadataSink, ItemSnapshot, ItemSource, TagRegistry};
use crate::disjoint::DisjointMetadataSet;
use crate::lazy_sync::PendingWrites;
use crate::Result;

/// Root marker left in keyword paths by old catalog versions.
const LEGACY_ROOT_TAG: &str = "_Digikam_root_tag_";

/// Field selection for one write, evaluated once and shared by the predicate
/// and the writer.
#[derive(Debug, Clone, Copy, Default)]
struct FileWritePlan {
    titles: bool,
    comments: bool,
    date_time: bool,
    pick_label: bool,
    color_label: bool,
    rating: bool,
    template: bool,
    position: bool,
    tags: bool,
    faces: bool,
}

impl FileWritePlan {
    fn any(&self) -> bool {
        self.titles
            || self.comments
            || self.date_time
            || self.pick_label
            || self.color_label
            || self.rating
            || self.template
            || self.position
            || self.tags
            || self.faces
    }
}

/// Holds exactly one item and writes it to a [`FileMetadataSink`].
pub struct MetadataHub {
    registry: Arc<dyn TagRegistry>,
    item: Option<ItemSnapshot>,
    tags: BTreeMap<TagId, Status>,
}

impl MetadataHub {
    pub fn new(registry: Arc<dyn TagRegistry>) -> Self {
        Self {
            registry,
            item: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn reset(&mut self) {
        self.item = None;
        self.tags.clear();
    }

    pub fn is_loaded(&self) -> bool {
        self.item.is_some()
    }

    pub fn item_id(&self) -> Option<ImageId> {
        self.item.as_ref().map(|item| item.id)
    }

    pub fn load(&mut self, source: &dyn ItemSource, id: ImageId) -> bool {
        match source.read_item(id) {
            Ok(Some(snapshot)) => self.load_snapshot(snapshot),
            Ok(None) => false,
            Err(err) => {
                warn!(image = id.0, error = %err, "failed to read item for file sync");
                false
            }
        }
    }

    /// Only the first item is kept; later calls are ignored.
    pub fn load_snapshot(&mut self, snapshot: ItemSnapshot) -> bool {
        if let Some(current) = &self.item {
            debug!(
                loaded = current.id.0,
                ignored = snapshot.id.0,
                "metadata hub already holds an item"
            );
            return false;
        }

        self.tags = snapshot
            .tag_ids
            .iter()
            .filter(|id| !self.registry.is_internal(**id))
            .map(|id| (*id, Status::Available))
            .collect();
        self.item = Some(snapshot);
        true
    }

    /// Tag state of the loaded item; `Invalid` entries are not written.
    pub fn set_tag(&mut self, id: TagId, status: Status) {
        self.tags.insert(id, status);
    }

    pub fn will_write_metadata(&self, mask: WriteComponents, settings: &MetadataSettings) -> bool {
        self.plan(mask, settings).any()
    }

    /// Writes the selected fields into `sink` without applying them. Returns
    /// whether the pending document changed.
    pub fn write(
        &self,
        sink: &mut dyn FileMetadataSink,
        mask: WriteComponents,
        settings: &MetadataSettings,
    ) -> Result<bool> {
        let Some(item) = &self.item else {
            return Ok(false);
        };
        let plan = self.plan(mask, settings);
        let mut dirty = false;

        if plan.titles {
            dirty |= sink.set_item_titles(&item.titles)?;
        }
        if plan.comments {
            dirty |= sink.set_item_comments(&item.comments)?;
        }
        if plan.date_time {
            if let Some(date_time) = item.date_time {
                dirty |= sink.set_image_date_time(date_time)?;
            }
        }
        if plan.pick_label {
            dirty |= sink.set_item_pick_label(item.pick_label)?;
        }
        if plan.color_label {
            dirty |= sink.set_item_color_label(item.color_label)?;
        }
        if plan.rating {
            dirty |= sink.set_item_rating(item.rating)?;
        }
        if plan.template {
            dirty |= if item.template.is_empty() || item.template.is_removal() {
                sink.remove_metadata_template()?
            } else {
                sink.set_metadata_template(&item.template)?
            };
        }
        if plan.position {
            dirty |= if item.position.has_coordinates() {
                sink.set_gps_info(&item.position)?
            } else {
                sink.remove_gps_info()?
            };
        }
        if plan.faces {
            let (faces, size) = self.faces_map(item);
            dirty |= sink.set_item_faces_map(&faces, size)?;
        }
        if plan.tags {
            let paths = cleanup_tags(self.writable_tag_paths());
            trace!(image = item.id.0, keywords = paths.len(), "writing keywords");
            dirty |= sink.set_item_tags_path(&paths)?;
        }

        Ok(dirty)
    }

    /// Writes the item to its file, or queues it when lazy sync is on.
    ///
    /// `open_sink` is only called when something will actually be written.
    pub fn write_to_metadata<S, F>(
        &self,
        open_sink: F,
        pending: &PendingWrites,
        mask: WriteComponents,
        ignore_lazy_sync: bool,
        settings: &MetadataSettings,
    ) -> bool
    where
        S: FileMetadataSink,
        F: FnOnce(ImageId) -> Result<S>,
    {
        let Some(id) = self.item_id() else {
            return false;
        };
        if !self.will_write_metadata(mask, settings) {
            return false;
        }

        if settings.use_lazy_sync && !ignore_lazy_sync {
            pending.add_pending(id);
            return true;
        }

        match self.write_file(id, open_sink, mask, settings) {
            Ok(written) => written,
            Err(err) => {
                warn!(image = id.0, error = %err, "failed to write file metadata");
                false
            }
        }
    }

    /// Opens the file for `id` and writes `mask` right away, ignoring lazy sync.
    pub(crate) fn write_file<S, F>(
        &self,
        id: ImageId,
        open_sink: F,
        mask: WriteComponents,
        settings: &MetadataSettings,
    ) -> Result<bool>
    where
        S: FileMetadataSink,
        F: FnOnce(ImageId) -> Result<S>,
    {
        let mut sink = open_sink(id)?;
        if !self.write(&mut sink, mask, settings)? {
            return Ok(false);
        }
        sink.apply_changes()?;
        Ok(true)
    }

    fn plan(&self, mask: WriteComponents, settings: &MetadataSettings) -> FileWritePlan {
        let Some(item) = &self.item else {
            return FileWritePlan::default();
        };
        let tags = mask.contains(WriteComponents::TAGS);

        FileWritePlan {
            titles: settings.save_comments && mask.contains(WriteComponents::TITLE),
            comments: settings.save_comments && mask.contains(WriteComponents::COMMENTS),
            date_time: settings.save_date_time
                && item.date_time.is_some()
                && mask.contains(WriteComponents::DATETIME),
            pick_label: settings.save_pick_label && mask.contains(WriteComponents::PICK_LABEL),
            color_label: settings.save_color_label
                && mask.contains(WriteComponents::COLOR_LABEL),
            rating: settings.save_rating && mask.contains(WriteComponents::RATING),
            template: settings.save_template && mask.contains(WriteComponents::TEMPLATE),
            position: settings.save_position && mask.contains(WriteComponents::POSITION),
            tags: settings.save_tags && tags,
            faces: settings.save_face_tags && tags,
        }
    }

    fn writable_tag_paths(&self) -> Vec<String> {
        self.tags
            .iter()
            .filter(|(id, status)| {
                **status == Status::Available && self.registry.can_be_written_to_metadata(**id)
            })
            .filter_map(|(id, _)| self.registry.tag_path(*id))
            .collect()
    }

    /// Confirmed regions mapped onto the stored pixels, then person tags without
    /// a region as empty rectangles.
    fn faces_map(&self, item: &ItemSnapshot) -> (FacesMap, core_types::ImageSize) {
        let stored = if item.orientation.swaps_dimensions() {
            item.size.transposed()
        } else {
            item.size
        };
        let mut faces = FacesMap::new();

        for face in item.faces.iter().filter(|face| face.confirmed) {
            let Some(name) = self.registry.face_name(face.tag_id) else {
                continue;
            };
            let (region, _) = item.orientation.reverse_rect(face.region, item.size);
            faces.push((name, region.to_relative(stored)));
        }

        for (id, status) in &self.tags {
            if *status != Status::Available {
                continue;
            }
            if let Some(name) = self.registry.face_name(*id) {
                if !faces.iter().any(|(existing, _)| *existing == name) {
                    faces.push((name, core_types::RectF::default()));
                }
            }
        }

        (faces, stored)
    }
}

/// Strips the legacy root marker, drops empty entries, deduplicates and sorts.
pub fn cleanup_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|tag| {
            let tag = tag.as_ref();
            if tag.is_empty() {
                return None;
            }
            let cleaned = tag
                .replace(&format!("{LEGACY_ROOT_TAG}/"), "")
                .replace(&format!("/{LEGACY_ROOT_TAG}"), "")
                .replace(LEGACY_ROOT_TAG, "");
            (!cleaned.is_empty()).then_some(cleaned)
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Reloads `id` and writes only the fields the user touched in `set`.
pub fn sync_changed_fields<S, F>(
    set: &DisjointMetadataSet,
    source: &dyn ItemSource,
    registry: Arc<dyn TagRegistry>,
    id: ImageId,
    open_sink: F,
    pending: &PendingWrites,
    settings: &MetadataSettings,
) -> bool
where
    S: FileMetadataSink,
    F: FnOnce(ImageId) -> Result<S>,
{
    let mask = set.changed_flags();
    if mask.is_empty() {
        return false;
    }

    let mut hub = MetadataHub::new(registry);
    if !hub.load(source, id) {
        return false;
    }
    hub.write_to_metadata(open_sink, pending, mask, false, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFileSink, FakeRegistry, FakeStore};
    use crate::EngineError;
    use chrono::{TimeZone, Utc};
    use core_types::{
        CaptionsMap, FaceRegion, ImageSize, ItemPosition, MetadataTemplate, Orientation, Rect,
        RectF,
    };

    fn registry() -> Arc<FakeRegistry> {
        Arc::new(
            FakeRegistry::new()
                .with_tag(10, "Places/Harbour")
                .with_tag(20, "_Digikam_root_tag_/Events")
                .with_person(40, "People/Alice")
                .with_person(41, "People/Bob")
                .with_internal(99, "_Internal/Scanned"),
        )
    }

    fn snapshot() -> ItemSnapshot {
        let mut item = ItemSnapshot::new(ImageId(1)).with_rating(4).with_tags([10, 20, 40, 41, 99]);
        item.date_time = Some(Utc.with_ymd_and_hms(2023, 8, 14, 9, 30, 0).unwrap());
        item.titles = CaptionsMap::from_default("Boats");
        item.size = ImageSize::new(200, 400);
        item.orientation = Orientation::Rotate90;
        item.faces = vec![
            FaceRegion {
                tag_id: TagId(40),
                region: Rect::new(10, 20, 30, 40),
                confirmed: true,
            },
            FaceRegion {
                tag_id: TagId(41),
                region: Rect::new(0, 0, 10, 10),
                confirmed: false,
            },
        ];
        item
    }

    fn loaded_hub() -> MetadataHub {
        let mut hub = MetadataHub::new(registry());
        assert!(hub.load_snapshot(snapshot()));
        hub
    }

    #[test]
    fn cleanup_strips_marker_and_dedups() {
        let cleaned = cleanup_tags([
            "_Digikam_root_tag_/Places",
            "Places",
            "",
            "Events/_Digikam_root_tag_",
            "_Digikam_root_tag_",
            "Animals",
        ]);
        assert_eq!(cleaned, vec!["Animals", "Events", "Places"]);
    }

    #[test]
    fn second_load_is_ignored() {
        let mut hub = loaded_hub();
        assert!(!hub.load_snapshot(ItemSnapshot::new(ImageId(2))));
        assert_eq!(hub.item_id(), Some(ImageId(1)));

        hub.reset();
        assert!(hub.load_snapshot(ItemSnapshot::new(ImageId(2))));
    }

    #[test]
    fn writes_only_masked_components() {
        let hub = loaded_hub();
        let mut sink = FakeFileSink::default();
        let settings = MetadataSettings::default();

        let dirty = hub
            .write(&mut sink, WriteComponents::RATING, &settings)
            .unwrap();

        assert!(dirty);
        assert_eq!(sink.rating, Some(4));
        assert!(sink.titles.is_none());
        assert!(sink.tag_paths.is_none());
        assert!(sink.faces.is_none());
    }

    #[test]
    fn settings_veto_masked_components() {
        let hub = loaded_hub();
        let settings = MetadataSettings::all_disabled();
        assert!(!hub.will_write_metadata(WriteComponents::ALL, &settings));

        let settings = MetadataSettings::all_disabled().with_rating(true);
        assert!(hub.will_write_metadata(WriteComponents::ALL, &settings));
        assert!(!hub.will_write_metadata(WriteComponents::TITLE, &settings));
    }

    #[test]
    fn tags_are_cleaned_paths_without_internal_ones() {
        let hub = loaded_hub();
        let mut sink = FakeFileSink::default();
        hub.write(&mut sink, WriteComponents::TAGS, &MetadataSettings::default())
            .unwrap();

        assert_eq!(
            sink.tag_paths.unwrap(),
            vec!["Events", "People/Alice", "People/Bob", "Places/Harbour"]
        );
    }

    #[test]
    fn unset_tags_clear_keywords() {
        let mut hub = MetadataHub::new(registry());
        hub.load_snapshot(ItemSnapshot::new(ImageId(1)).with_tags([10]));
        hub.set_tag(TagId(10), Status::Invalid);

        let mut sink = FakeFileSink::default();
        hub.write(&mut sink, WriteComponents::TAGS, &MetadataSettings::default())
            .unwrap();
        assert_eq!(sink.tag_paths, Some(Vec::new()));
    }

    #[test]
    fn faces_are_rotated_back_and_made_relative() {
        let hub = loaded_hub();
        let mut sink = FakeFileSink::default();
        hub.write(&mut sink, WriteComponents::TAGS, &MetadataSettings::default())
            .unwrap();

        let (faces, size) = sink.faces.unwrap();
        assert_eq!(size, ImageSize::new(400, 200));
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].0, "Alice");
        assert_eq!(
            faces[0].1,
            RectF {
                x: 20.0 / 400.0,
                y: 160.0 / 200.0,
                width: 40.0 / 400.0,
                height: 30.0 / 200.0,
            }
        );
        assert_eq!(faces[1], ("Bob".to_string(), RectF::default()));
    }

    #[test]
    fn template_and_position_fall_back_to_removal() {
        let hub = loaded_hub();
        let mut sink = FakeFileSink::default();
        let mask = WriteComponents::TEMPLATE | WriteComponents::POSITION;
        hub.write(&mut sink, mask, &MetadataSettings::default())
            .unwrap();
        assert!(sink.template_removed);
        assert!(sink.position_removed);

        let mut item = snapshot();
        item.template = MetadataTemplate {
            credit: "ACME".into(),
            ..MetadataTemplate::default()
        };
        item.position = ItemPosition::new(48.85, 2.35);
        let mut hub = MetadataHub::new(registry());
        hub.load_snapshot(item);
        let mut sink = FakeFileSink::default();
        hub.write(&mut sink, mask, &MetadataSettings::default())
            .unwrap();
        assert_eq!(sink.template.unwrap().credit, "ACME");
        assert_eq!(sink.position.unwrap().latitude, Some(48.85));
    }

    #[test]
    fn write_to_metadata_applies_once() {
        let hub = loaded_hub();
        let pending = PendingWrites::new();
        let mut sink = FakeFileSink::default();
        let target = &mut sink;

        let written = hub.write_to_metadata(
            move |_| Ok(target),
            &pending,
            WriteComponents::ALL,
            false,
            &MetadataSettings::default(),
        );
        assert!(written);
        assert!(pending.is_empty());
        assert_eq!(sink.applied, 1);

        let mut opened = 0;
        let written = hub.write_to_metadata(
            |_| {
                opened += 1;
                Ok(FakeFileSink::default())
            },
            &pending,
            WriteComponents::empty(),
            false,
            &MetadataSettings::default(),
        );
        assert!(!written);
        assert_eq!(opened, 0);
    }

    #[test]
    fn lazy_sync_queues_instead_of_writing() {
        let hub = loaded_hub();
        let pending = PendingWrites::new();
        let settings = MetadataSettings::default().with_lazy_sync(true);

        let queued = hub.write_to_metadata(
            |_| -> Result<FakeFileSink> { panic!("sink opened during lazy sync") },
            &pending,
            WriteComponents::ALL,
            false,
            &settings,
        );
        assert!(queued);
        assert_eq!(pending.take_all(), vec![ImageId(1)]);

        let written = hub.write_to_metadata(
            |_| Ok(FakeFileSink::default()),
            &pending,
            WriteComponents::ALL,
            true,
            &settings,
        );
        assert!(written);
        assert!(pending.is_empty());
    }

    #[test]
    fn sink_errors_are_reported_as_not_written() {
        let hub = loaded_hub();
        let written = hub.write_to_metadata(
            |_| -> Result<FakeFileSink> { Err(EngineError::FileMetadata("read-only".into())) },
            &PendingWrites::new(),
            WriteComponents::ALL,
            false,
            &MetadataSettings::default(),
        );
        assert!(!written);
    }

    #[test]
    fn sync_changed_fields_uses_changed_mask() {
        let store = FakeStore::new().with_item(snapshot());
        let registry = registry();
        let mut set = DisjointMetadataSet::new(registry.clone());
        set.load(&store, ImageId(1));

        let pending = PendingWrites::new();
        let settings = MetadataSettings::default();
        assert!(!sync_changed_fields(
            &set,
            &store,
            registry.clone(),
            ImageId(1),
            |_| Ok(FakeFileSink::default()),
            &pending,
            &settings,
        ));

        set.set_rating(2, Status::Available);
        let mut sink = FakeFileSink::default();
        let target = &mut sink;
        let written = sync_changed_fields(
            &set,
            &store,
            registry,
            ImageId(1),
            move |_| Ok(target),
            &pending,
            &settings,
        );
        assert!(written);
        assert_eq!(sink.rating, Some(4));
        assert!(sink.titles.is_none());
        assert!(sink.tag_paths.is_none());
        assert_eq!(sink.applied, 1);
    }
}
