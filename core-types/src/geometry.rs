use crate::TagId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn transposed(self) -> Self {
        Self::new(self.height, self.width)
    }
}

/// Pixel rectangle in image coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Scales the rectangle into the unit square of `size`.
    pub fn to_relative(&self, size: ImageSize) -> RectF {
        if size.is_empty() {
            return RectF::default();
        }
        let w = f64::from(size.width);
        let h = f64::from(size.height);
        RectF {
            x: f64::from(self.x) / w,
            y: f64::from(self.y) / h,
            width: f64::from(self.width) / w,
            height: f64::from(self.height) / h,
        }
    }
}

/// Rectangle in relative (0..=1) coordinates. The default value is the empty rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RectF {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectF {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// EXIF orientation of the stored pixels relative to how the image is displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    pub fn from_exif(value: i64) -> Self {
        match value {
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }

    pub fn exif_value(self) -> i64 {
        match self {
            Self::Normal => 1,
            Self::FlipHorizontal => 2,
            Self::Rotate180 => 3,
            Self::FlipVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90 => 6,
            Self::Transverse => 7,
            Self::Rotate270 => 8,
        }
    }

    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }

    /// Maps a rectangle drawn on the displayed image back onto the stored pixels.
    ///
    /// `displayed` is the size of the image as shown to the user. Returns the
    /// rectangle together with the size of the stored pixel grid.
    pub fn reverse_rect(self, rect: Rect, displayed: ImageSize) -> (Rect, ImageSize) {
        let w = displayed.width as i32;
        let h = displayed.height as i32;
        let Rect {
            x,
            y,
            width,
            height,
        } = rect;

        let mapped = match self {
            Self::Normal => rect,
            Self::FlipHorizontal => Rect::new(w - x - width, y, width, height),
            Self::Rotate180 => Rect::new(w - x - width, h - y - height, width, height),
            Self::FlipVertical => Rect::new(x, h - y - height, width, height),
            Self::Transpose => Rect::new(y, x, height, width),
            Self::Rotate90 => Rect::new(y, w - x - width, height, width),
            Self::Transverse => Rect::new(h - y - height, w - x - width, height, width),
            Self::Rotate270 => Rect::new(h - y - height, x, height, width),
        };

        let stored = if self.swaps_dimensions() {
            displayed.transposed()
        } else {
            displayed
        };
        (mapped, stored)
    }
}

/// A face rectangle bound to a person tag, in displayed-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaceRegion {
    pub tag_id: TagId,
    pub region: Rect,
    /// Confirmed regions carry a user-verified name.
    pub confirmed: bool,
}

/// Geolocation of an item. Latitude/longitude in decimal degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPosition {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
}

impl ItemPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            altitude: None,
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}
