use serde::{Deserialize, Serialize};

pub mod captions;
pub mod geometry;
pub mod template;

pub use captions::CaptionsMap;
pub use geometry::{FaceRegion, ImageSize, ItemPosition, Orientation, Rect, RectF};
pub use template::MetadataTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagId(pub i64);

/// Agreement state of one metadata field across every loaded item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Nothing loaded yet.
    #[default]
    Invalid,
    /// All loaded items carry the same value.
    Available,
    /// Loaded items disagree.
    Disjoint,
}

/// Sentinel used by rating and both labels when no value is known.
pub const UNSET_LABEL: i32 = -1;

pub mod pick_label {
    pub const NONE: i32 = 0;
    pub const REJECTED: i32 = 1;
    pub const PENDING: i32 = 2;
    pub const ACCEPTED: i32 = 3;
}

pub mod color_label {
    pub const NONE: i32 = 0;
    pub const RED: i32 = 1;
    pub const ORANGE: i32 = 2;
    pub const YELLOW: i32 = 3;
    pub const GREEN: i32 = 4;
    pub const BLUE: i32 = 5;
    pub const MAGENTA: i32 = 6;
    pub const GRAY: i32 = 7;
    pub const BLACK: i32 = 8;
    pub const WHITE: i32 = 9;
}

bitflags::bitflags! {
    /// Metadata components, used both as "changed by the user" flags and as the
    /// mask handed to a file synchronization pass.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct WriteComponents: u16 {
        const TITLE       = 0b0000_0000_0001;
        const COMMENTS    = 0b0000_0000_0010;
        const DATETIME    = 0b0000_0000_0100;
        const PICK_LABEL  = 0b0000_0000_1000;
        const COLOR_LABEL = 0b0000_0001_0000;
        const RATING      = 0b0000_0010_0000;
        const TEMPLATE    = 0b0000_0100_0000;
        const TAGS        = 0b0000_1000_0000;
        const POSITION    = 0b0001_0000_0000;
    }
}

impl WriteComponents {
    pub const ALL: WriteComponents = WriteComponents::all();
}
