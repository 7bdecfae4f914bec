//! JSON sidecar files standing in for embedded file metadata.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use core_types::{CaptionsMap, ImageSize, ItemPosition, MetadataTemplate, RectF};
use engine::{FacesMap, FileMetadataSink};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::CatalogError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarFace {
    pub name: String,
    /// Relative to the stored image; empty when the person has no region.
    pub area: RectF,
}

/// On-disk layout of `<image>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarDocument {
    pub titles: CaptionsMap,
    pub comments: CaptionsMap,
    pub date_time: Option<DateTime<Utc>>,
    pub pick_label: Option<i32>,
    pub color_label: Option<i32>,
    pub rating: Option<i32>,
    pub template: Option<MetadataTemplate>,
    pub gps: Option<ItemPosition>,
    pub keywords: Vec<String>,
    pub faces: Vec<SidecarFace>,
    pub faces_image_size: Option<ImageSize>,
}

/// Sidecar next to an image. Changes stay in memory until `apply_changes`.
#[derive(Debug)]
pub struct JsonSidecar {
    path: PathBuf,
    document: SidecarDocument,
    dirty: bool,
}

pub fn sidecar_path(image: &Path) -> PathBuf {
    let mut name = image.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

impl JsonSidecar {
    /// Reads the sidecar of `image`, starting from an empty document when none exists.
    pub fn open(image: &Path) -> Result<Self, CatalogError> {
        let path = sidecar_path(image);
        let document = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            SidecarDocument::default()
        };
        Ok(Self {
            path,
            document,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &SidecarDocument {
        &self.document
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn replace<T: PartialEq>(
        &mut self,
        select: impl FnOnce(&mut SidecarDocument) -> &mut T,
        value: T,
    ) -> bool {
        let slot = select(&mut self.document);
        if *slot == value {
            return false;
        }
        *slot = value;
        self.dirty = true;
        true
    }

    fn save(&mut self) -> Result<(), CatalogError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.document)?)?;
        self.dirty = false;
        debug!(path = %self.path.display(), "wrote sidecar");
        Ok(())
    }
}

impl FileMetadataSink for JsonSidecar {
    fn set_item_titles(&mut self, titles: &CaptionsMap) -> engine::Result<bool> {
        Ok(self.replace(|doc| &mut doc.titles, titles.clone()))
    }

    fn set_item_comments(&mut self, comments: &CaptionsMap) -> engine::Result<bool> {
        Ok(self.replace(|doc| &mut doc.comments, comments.clone()))
    }

    fn set_image_date_time(&mut self, date_time: DateTime<Utc>) -> engine::Result<bool> {
        Ok(self.replace(|doc| &mut doc.date_time, Some(date_time)))
    }

    fn set_item_pick_label(&mut self, pick_label: i32) -> engine::Result<bool> {
        Ok(self.replace(|doc| &mut doc.pick_label, Some(pick_label)))
    }

    fn set_item_color_label(&mut self, color_label: i32) -> engine::Result<bool> {
        Ok(self.replace(|doc| &mut doc.color_label, Some(color_label)))
    }

    fn set_item_rating(&mut self, rating: i32) -> engine::Result<bool> {
        Ok(self.replace(|doc| &mut doc.rating, Some(rating)))
    }

    fn set_metadata_template(&mut self, template: &MetadataTemplate) -> engine::Result<bool> {
        Ok(self.replace(|doc| &mut doc.template, Some(template.clone())))
    }

    fn remove_metadata_template(&mut self) -> engine::Result<bool> {
        Ok(self.replace(|doc| &mut doc.template, None))
    }

    fn set_gps_info(&mut self, position: &ItemPosition) -> engine::Result<bool> {
        Ok(self.replace(|doc| &mut doc.gps, Some(*position)))
    }

    fn remove_gps_info(&mut self) -> engine::Result<bool> {
        Ok(self.replace(|doc| &mut doc.gps, None))
    }

    fn set_item_tags_path(&mut self, paths: &[String]) -> engine::Result<bool> {
        Ok(self.replace(|doc| &mut doc.keywords, paths.to_vec()))
    }

    fn set_item_faces_map(&mut self, faces: &FacesMap, size: ImageSize) -> engine::Result<bool> {
        let faces: Vec<SidecarFace> = faces
            .iter()
            .map(|(name, area)| SidecarFace {
                name: name.clone(),
                area: *area,
            })
            .collect();
        let size = (!faces.is_empty()).then_some(size);
        let changed = self.replace(|doc| &mut doc.faces, faces);
        Ok(self.replace(|doc| &mut doc.faces_image_size, size) || changed)
    }

    fn apply_changes(&mut self) -> engine::Result<()> {
        if self.dirty {
            self.save()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_sits_next_to_image() {
        assert_eq!(
            sidecar_path(Path::new("/photos/a.jpg")),
            PathBuf::from("/photos/a.jpg.json")
        );
    }

    #[test]
    fn setters_report_changes_and_apply_persists() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("boat.jpg");

        let mut sidecar = JsonSidecar::open(&image).unwrap();
        assert!(sidecar.set_item_rating(4).unwrap());
        assert!(!sidecar.set_item_rating(4).unwrap());
        assert!(sidecar
            .set_item_tags_path(&["Places/Oslo".to_string()])
            .unwrap());
        assert!(sidecar.is_dirty());
        assert!(!sidecar.path().exists());

        sidecar.apply_changes().unwrap();
        assert!(!sidecar.is_dirty());

        let reopened = JsonSidecar::open(&image).unwrap();
        assert_eq!(reopened.document().rating, Some(4));
        assert_eq!(reopened.document().keywords, vec!["Places/Oslo"]);
    }

    #[test]
    fn removals_only_change_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let mut sidecar = JsonSidecar::open(&dir.path().join("a.jpg")).unwrap();

        assert!(!sidecar.remove_gps_info().unwrap());
        assert!(sidecar.set_gps_info(&ItemPosition::new(1.0, 2.0)).unwrap());
        assert!(sidecar.remove_gps_info().unwrap());
        assert!(!sidecar.remove_metadata_template().unwrap());
    }

    #[test]
    fn faces_keep_image_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut sidecar = JsonSidecar::open(&dir.path().join("a.jpg")).unwrap();
        let faces = vec![("Alice".to_string(), RectF::default())];

        assert!(sidecar
            .set_item_faces_map(&faces, ImageSize::new(40, 30))
            .unwrap());
        assert_eq!(
            sidecar.document().faces_image_size,
            Some(ImageSize::new(40, 30))
        );
        assert!(sidecar.set_item_faces_map(&Vec::new(), ImageSize::new(40, 30)).unwrap());
        assert_eq!(sidecar.document().faces_image_size, None);
    }

    #[test]
    fn malformed_sidecar_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.jpg");
        fs::write(sidecar_path(&image), "{not json").unwrap();
        assert!(matches!(
            JsonSidecar::open(&image),
            Err(CatalogError::Json(_))
        ));
    }
}
