use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use app_settings::AppSettings;
use chrono::{DateTime, Utc};
use core_types::{CaptionsMap, FaceRegion, ImageId, MetadataTemplate, Rect, TagId};
use engine::{
    DisjointMetadataSet, EngineError, ItemSink, ItemSnapshot, ItemSource, NotificationHub,
    TagRegistry, TemplateLookup,
};
use tracing::{debug, info, warn};

use crate::db::{
    CaptionKind, CaptionRow, CatalogDb, CatalogMetadata, FaceRegionRow, Image, ImageTag, Tag,
    TemplateRow,
};
use crate::services::{TagsCache, TemplateLibrary};
use crate::sidecar::JsonSidecar;
use crate::CatalogPath;

/// Face regions lose their person to this tag when the person is removed from an image.
pub const UNKNOWN_PERSON_PATH: &str = "People/Unknown";

/// Item store over a catalog database. Tag queries go through the shared
/// [`TagsCache`] returned by [`CatalogStore::registry`].
pub struct CatalogStore {
    db: CatalogDb,
    tags: Arc<TagsCache>,
    templates: Arc<TemplateLibrary>,
    notifications: NotificationHub,
}

impl CatalogStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = CatalogPath::new(path).into_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let db = CatalogDb::open(&path)?;
        CatalogMetadata::update_last_opened(&db)?;
        info!(path = %path.display(), "opened catalog");
        Self::from_db(db)
    }

    /// Reopens the catalog remembered in `settings`, if any.
    pub fn open_last_used(settings: &AppSettings) -> Result<Option<Self>> {
        match settings.last_catalog.as_deref() {
            Some(path) if path.exists() => Self::open(path).map(Some),
            Some(path) => {
                warn!(path = %path.display(), "last used catalog is gone");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_db(CatalogDb::in_memory()?)
    }

    fn from_db(db: CatalogDb) -> Result<Self> {
        let tags = TagsCache::from_tags(&Tag::load_all(&db).context("failed to load tags")?);
        let templates = TemplateRow::load_all(&db)
            .context("failed to load templates")?
            .into_iter()
            .map(|row| row.template)
            .collect();

        Ok(Self {
            db,
            tags: Arc::new(tags),
            templates: Arc::new(TemplateLibrary::new(templates)),
            notifications: NotificationHub::new(),
        })
    }

    pub fn db(&self) -> &CatalogDb {
        &self.db
    }

    pub fn registry(&self) -> Arc<dyn TagRegistry> {
        self.tags.clone()
    }

    pub fn tags_cache(&self) -> &Arc<TagsCache> {
        &self.tags
    }

    pub fn template_library(&self) -> &Arc<TemplateLibrary> {
        &self.templates
    }

    pub fn notifications(&self) -> &NotificationHub {
        &self.notifications
    }

    /// An empty aggregate wired to this catalog's tags, templates and notifications.
    pub fn new_selection(&self) -> DisjointMetadataSet {
        DisjointMetadataSet::with_notifications(self.registry(), &self.notifications)
            .with_template_lookup(self.templates.clone())
    }

    pub fn add_image(&self, image: &Image) -> Result<ImageId> {
        let id = image.insert(&self.db)?;
        debug!(image = id, path = %image.path, "added image");
        Ok(ImageId(id))
    }

    pub fn image_path(&self, id: ImageId) -> Result<Option<PathBuf>> {
        Ok(Image::find(&self.db, id.0)?.map(|image| PathBuf::from(image.path)))
    }

    pub fn create_tag(&self, path: &str) -> Result<TagId> {
        self.ensure_tag(path, false, false)
    }

    pub fn create_person_tag(&self, path: &str) -> Result<TagId> {
        self.ensure_tag(path, true, false)
    }

    pub fn create_internal_tag(&self, path: &str) -> Result<TagId> {
        self.ensure_tag(path, false, true)
    }

    /// Created on first use.
    pub fn unknown_person_tag(&self) -> Result<TagId> {
        self.ensure_tag(UNKNOWN_PERSON_PATH, true, true)
    }

    pub fn set_tag_excluded_from_writing(&self, id: TagId, excluded: bool) -> Result<()> {
        let mut tag = Tag::load(&self.db, id.0)?;
        tag.excluded_from_writing = excluded;
        tag.update(&self.db)?;
        self.tags.insert(&tag);
        Ok(())
    }

    /// Deletes the tag with its subtree and tells every open aggregate.
    pub fn delete_tag(&self, id: TagId) -> Result<()> {
        Tag::delete(&self.db, id.0)?;
        for removed in self.tags.remove(id) {
            self.notifications.tag_deleted(removed);
        }
        Ok(())
    }

    /// Signals that the catalog changed in ways aggregates cannot patch.
    pub fn invalidate(&self) {
        self.notifications.invalidate();
    }

    pub fn add_face_region(
        &self,
        image: ImageId,
        tag: TagId,
        region: Rect,
        confirmed: bool,
    ) -> Result<()> {
        FaceRegionRow {
            id: 0,
            image_id: image.0,
            tag_id: tag.0,
            region,
            confirmed,
        }
        .insert(&self.db)?;
        Ok(())
    }

    pub fn save_template(&self, template: &MetadataTemplate) -> Result<()> {
        TemplateRow::upsert(&self.db, template)?;
        self.templates.upsert(template.clone());
        Ok(())
    }

    /// Opens the JSON sidecar of an image for file metadata writes.
    pub fn open_sidecar(&self, id: ImageId) -> engine::Result<JsonSidecar> {
        let path = self
            .image_path(id)
            .map_err(store_error)?
            .ok_or_else(|| EngineError::Store(format!("image id={} does not exist", id.0)))?;
        Ok(JsonSidecar::open(&path)?)
    }

    fn ensure_tag(&self, path: &str, person: bool, internal: bool) -> Result<TagId> {
        let mut tag = Tag::get_or_create_path(&self.db, path, &Tag::new(None, ""))?;
        if (person && !tag.person) || (internal && !tag.internal) {
            tag.person |= person;
            tag.internal |= internal;
            tag.update(&self.db)?;
        }
        self.tags.reload(&Tag::load_all(&self.db)?);
        Ok(TagId(tag.id))
    }

    fn snapshot(&self, id: ImageId) -> Result<Option<ItemSnapshot>> {
        let Some(image) = Image::find(&self.db, id.0)? else {
            return Ok(None);
        };
        let size = image.size();
        let faces = FaceRegionRow::list_for_image(&self.db, id.0)?
            .iter()
            .map(FaceRegionRow::to_face_region)
            .collect();
        let tag_ids = ImageTag::tag_ids_for_image(&self.db, id.0)?
            .into_iter()
            .map(TagId)
            .collect();

        Ok(Some(ItemSnapshot {
            id,
            date_time: image.captured_at,
            titles: CaptionRow::load_map(&self.db, id.0, CaptionKind::Title)?,
            comments: CaptionRow::load_map(&self.db, id.0, CaptionKind::Comment)?,
            color_label: image.color_label,
            pick_label: image.pick_label,
            rating: image.rating,
            template: image.template,
            tag_ids,
            size,
            orientation: image.orientation,
            faces,
            position: image.position,
        }))
    }

    fn replace_captions(&self, id: ImageId, kind: CaptionKind, captions: &CaptionsMap) -> Result<()> {
        self.db
            .with_transaction(|tx| CaptionRow::replace_map(tx, id.0, kind, captions))
    }

    fn reassign_to_unknown(&self, id: ImageId, region: &FaceRegion) -> Result<()> {
        let unknown = self.unknown_person_tag()?;
        let moved = FaceRegionRow::reassign(&self.db, id.0, region, unknown.0)?;
        debug!(image = id.0, tag = region.tag_id.0, moved, "released face region");
        Ok(())
    }
}

fn store_error(err: anyhow::Error) -> EngineError {
    EngineError::Store(format!("{err:#}"))
}

impl ItemSource for CatalogStore {
    fn read_item(&self, id: ImageId) -> engine::Result<Option<ItemSnapshot>> {
        self.snapshot(id).map_err(store_error)
    }
}

impl ItemSink for CatalogStore {
    fn replace_titles(&self, id: ImageId, titles: &CaptionsMap) -> engine::Result<()> {
        self.replace_captions(id, CaptionKind::Title, titles)
            .map_err(store_error)
    }

    fn replace_comments(&self, id: ImageId, comments: &CaptionsMap) -> engine::Result<()> {
        self.replace_captions(id, CaptionKind::Comment, comments)
            .map_err(store_error)
    }

    fn set_date_time(&self, id: ImageId, date_time: DateTime<Utc>) -> engine::Result<()> {
        Image::update_captured_at(&self.db, id.0, date_time).map_err(store_error)
    }

    fn set_pick_label(&self, id: ImageId, pick_label: i32) -> engine::Result<()> {
        Image::update_pick_label(&self.db, id.0, pick_label).map_err(store_error)
    }

    fn set_color_label(&self, id: ImageId, color_label: i32) -> engine::Result<()> {
        Image::update_color_label(&self.db, id.0, color_label).map_err(store_error)
    }

    fn set_rating(&self, id: ImageId, rating: i32) -> engine::Result<()> {
        Image::update_rating(&self.db, id.0, rating).map_err(store_error)
    }

    fn set_template(&self, id: ImageId, template: &MetadataTemplate) -> engine::Result<()> {
        Image::update_template(&self.db, id.0, template).map_err(store_error)
    }

    fn remove_template(&self, id: ImageId) -> engine::Result<()> {
        Image::update_template(&self.db, id.0, &MetadataTemplate::default()).map_err(store_error)
    }

    fn add_tag(&self, id: ImageId, tag: TagId) -> engine::Result<()> {
        ImageTag {
            image_id: id.0,
            tag_id: tag.0,
        }
        .insert(&self.db)
        .map_err(store_error)
    }

    fn remove_tag(&self, id: ImageId, tag: TagId) -> engine::Result<()> {
        ImageTag::delete(&self.db, id.0, tag.0).map_err(store_error)
    }

    fn face_regions(&self, id: ImageId) -> engine::Result<Vec<FaceRegion>> {
        let rows = FaceRegionRow::list_for_image(&self.db, id.0).map_err(store_error)?;
        Ok(rows.iter().map(FaceRegionRow::to_face_region).collect())
    }

    fn clear_face_tag(&self, id: ImageId, region: &FaceRegion) -> engine::Result<()> {
        self.reassign_to_unknown(id, region).map_err(store_error)
    }
}

impl TemplateLookup for CatalogStore {
    fn find_by_contents(&self, template: &MetadataTemplate) -> Option<MetadataTemplate> {
        self.templates.find_by_contents(template)
    }
}
