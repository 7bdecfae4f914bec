//! Interfaces to the stores an aggregate reads from and writes to.
//!
//! The reconciliation code never talks to a database or a file directly; it is
//! handed implementations of these traits by its owner.

use chrono::{DateTime, Utc};
use core_types::{
    CaptionsMap, FaceRegion, ImageId, ImageSize, ItemPosition, MetadataTemplate, Orientation,
    RectF, TagId,
};

use crate::Result;

/// Everything the aggregate needs to know about one item, read in one go.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSnapshot {
    pub id: ImageId,
    pub date_time: Option<DateTime<Utc>>,
    pub titles: CaptionsMap,
    pub comments: CaptionsMap,
    pub color_label: i32,
    pub pick_label: i32,
    pub rating: i32,
    pub template: MetadataTemplate,
    /// May include internal tags; they are filtered out on load.
    pub tag_ids: Vec<TagId>,
    /// Size as displayed, i.e. after `orientation` has been applied.
    pub size: ImageSize,
    pub orientation: Orientation,
    pub faces: Vec<FaceRegion>,
    pub position: ItemPosition,
}

impl ItemSnapshot {
    pub fn new(id: ImageId) -> Self {
        Self {
            id,
            date_time: None,
            titles: CaptionsMap::new(),
            comments: CaptionsMap::new(),
            color_label: core_types::color_label::NONE,
            pick_label: core_types::pick_label::NONE,
            rating: 0,
            template: MetadataTemplate::default(),
            tag_ids: Vec::new(),
            size: ImageSize::default(),
            orientation: Orientation::Normal,
            faces: Vec::new(),
            position: ItemPosition::default(),
        }
    }

    pub fn with_rating(mut self, rating: i32) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = i64>) -> Self {
        self.tag_ids = tags.into_iter().map(TagId).collect();
        self
    }

    pub fn with_date_time(mut self, date_time: DateTime<Utc>) -> Self {
        self.date_time = Some(date_time);
        self
    }
}

/// Read side of the item store.
pub trait ItemSource {
    /// Returns `None` when the id does not name a live item.
    fn read_item(&self, id: ImageId) -> Result<Option<ItemSnapshot>>;
}

/// Write side of the item store. Every call is independent; a failure leaves
/// earlier calls applied.
pub trait ItemSink {
    fn replace_titles(&self, id: ImageId, titles: &CaptionsMap) -> Result<()>;
    fn replace_comments(&self, id: ImageId, comments: &CaptionsMap) -> Result<()>;
    fn set_date_time(&self, id: ImageId, date_time: DateTime<Utc>) -> Result<()>;
    fn set_pick_label(&self, id: ImageId, pick_label: i32) -> Result<()>;
    fn set_color_label(&self, id: ImageId, color_label: i32) -> Result<()>;
    fn set_rating(&self, id: ImageId, rating: i32) -> Result<()>;
    fn set_template(&self, id: ImageId, template: &MetadataTemplate) -> Result<()>;
    fn remove_template(&self, id: ImageId) -> Result<()>;
    fn add_tag(&self, id: ImageId, tag: TagId) -> Result<()>;
    fn remove_tag(&self, id: ImageId, tag: TagId) -> Result<()>;
    fn face_regions(&self, id: ImageId) -> Result<Vec<FaceRegion>>;
    /// Detaches `region` from its person tag without deleting the region itself.
    fn clear_face_tag(&self, id: ImageId, region: &FaceRegion) -> Result<()>;
}

/// Lookup service over the tag hierarchy.
pub trait TagRegistry: Send + Sync {
    /// Slash separated path without a leading slash, e.g. `People/Alice`.
    fn tag_path(&self, id: TagId) -> Option<String>;

    fn tag_for_path(&self, path: &str) -> Option<TagId>;

    /// Bookkeeping tags never shown to or edited by the user.
    fn is_internal(&self, id: TagId) -> bool;

    fn is_person(&self, id: TagId) -> bool;

    fn tag_name(&self, id: TagId) -> Option<String> {
        self.tag_path(id)
            .and_then(|path| path.rsplit('/').next().map(str::to_string))
    }

    fn can_be_written_to_metadata(&self, id: TagId) -> bool {
        !self.is_internal(id)
    }

    fn face_name(&self, id: TagId) -> Option<String> {
        if self.is_person(id) {
            self.tag_name(id)
        } else {
            None
        }
    }
}

/// Known metadata templates, used to give a raw item template its canonical title.
pub trait TemplateLookup {
    fn find_by_contents(&self, template: &MetadataTemplate) -> Option<MetadataTemplate>;
}

/// Person name to relative face rectangle. An empty rectangle marks a person
/// tagged without a region. Names may repeat.
pub type FacesMap = Vec<(String, RectF)>;

/// Embedded file metadata (EXIF/IPTC/XMP or a sidecar). Setters report whether
/// they changed the pending document; nothing is persisted before `apply_changes`.
pub trait FileMetadataSink {
    fn set_item_titles(&mut self, titles: &CaptionsMap) -> Result<bool>;
    fn set_item_comments(&mut self, comments: &CaptionsMap) -> Result<bool>;
    fn set_image_date_time(&mut self, date_time: DateTime<Utc>) -> Result<bool>;
    fn set_item_pick_label(&mut self, pick_label: i32) -> Result<bool>;
    fn set_item_color_label(&mut self, color_label: i32) -> Result<bool>;
    fn set_item_rating(&mut self, rating: i32) -> Result<bool>;
    fn set_metadata_template(&mut self, template: &MetadataTemplate) -> Result<bool>;
    fn remove_metadata_template(&mut self) -> Result<bool>;
    fn set_gps_info(&mut self, position: &ItemPosition) -> Result<bool>;
    fn remove_gps_info(&mut self) -> Result<bool>;
    /// Replaces every keyword; an empty slice clears them.
    fn set_item_tags_path(&mut self, paths: &[String]) -> Result<bool>;
    /// `size` is the size of the stored (unrotated) pixel grid.
    fn set_item_faces_map(&mut self, faces: &FacesMap, size: ImageSize) -> Result<bool>;
    fn apply_changes(&mut self) -> Result<()>;
}

impl<T: FileMetadataSink + ?Sized> FileMetadataSink for &mut T {
    fn set_item_titles(&mut self, titles: &CaptionsMap) -> Result<bool> {
        (**self).set_item_titles(titles)
    }

    fn set_item_comments(&mut self, comments: &CaptionsMap) -> Result<bool> {
        (**self).set_item_comments(comments)
    }

    fn set_image_date_time(&mut self, date_time: DateTime<Utc>) -> Result<bool> {
        (**self).set_image_date_time(date_time)
    }

    fn set_item_pick_label(&mut self, pick_label: i32) -> Result<bool> {
        (**self).set_item_pick_label(pick_label)
    }

    fn set_item_color_label(&mut self, color_label: i32) -> Result<bool> {
        (**self).set_item_color_label(color_label)
    }

    fn set_item_rating(&mut self, rating: i32) -> Result<bool> {
        (**self).set_item_rating(rating)
    }

    fn set_metadata_template(&mut self, template: &MetadataTemplate) -> Result<bool> {
        (**self).set_metadata_template(template)
    }

    fn remove_metadata_template(&mut self) -> Result<bool> {
        (**self).remove_metadata_template()
    }

    fn set_gps_info(&mut self, position: &ItemPosition) -> Result<bool> {
        (**self).set_gps_info(position)
    }

    fn remove_gps_info(&mut self) -> Result<bool> {
        (**self).remove_gps_info()
    }

    fn set_item_tags_path(&mut self, paths: &[String]) -> Result<bool> {
        (**self).set_item_tags_path(paths)
    }

    fn set_item_faces_map(&mut self, faces: &FacesMap, size: ImageSize) -> Result<bool> {
        (**self).set_item_faces_map(faces, size)
    }

    fn apply_changes(&mut self) -> Result<()> {
        (**self).apply_changes()
    }
}
