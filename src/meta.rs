//! Embedded orientation metadata and the rotations it implies.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::{RgbaImage, imageops};
use tracing::debug;

/// Counter-clockwise rotation needed to show an image upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Identity,
    Ccw90,
    Ccw180,
    Ccw270,
}

impl Rotation {
    /// Map an EXIF orientation tag to its correction.
    ///
    /// Only the pure rotations are honoured; mirrored orientations (2, 4, 5, 7)
    /// and unknown values fall through to [`Rotation::Identity`].
    #[must_use]
    pub const fn from_orientation_tag(tag: u16) -> Self {
        match tag {
            3 => Self::Ccw180,
            6 => Self::Ccw270,
            8 => Self::Ccw90,
            _ => Self::Identity,
        }
    }

    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::Identity => 0,
            Self::Ccw90 => 90,
            Self::Ccw180 => 180,
            Self::Ccw270 => 270,
        }
    }

    #[must_use]
    pub const fn inverse(self) -> Self {
        match self {
            Self::Identity => Self::Identity,
            Self::Ccw90 => Self::Ccw270,
            Self::Ccw180 => Self::Ccw180,
            Self::Ccw270 => Self::Ccw90,
        }
    }

    #[must_use]
    pub const fn swaps_axes(self) -> bool {
        matches!(self, Self::Ccw90 | Self::Ccw270)
    }

    /// Produce a rotated copy of `img`. `imageops` rotates clockwise, so the
    /// quarter turns are swapped relative to their names.
    #[must_use]
    pub fn apply(self, img: &RgbaImage) -> RgbaImage {
        match self {
            Self::Identity => img.clone(),
            Self::Ccw90 => imageops::rotate270(img),
            Self::Ccw180 => imageops::rotate180(img),
            Self::Ccw270 => imageops::rotate90(img),
        }
    }
}

/// Read the primary image's EXIF orientation tag, if any.
///
/// Any failure (no container support, no EXIF block, no tag) is reported as
/// `None`; callers treat that as "already upright".
#[must_use]
pub fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let tag = u16::try_from(field.value.get_uint(0)?).ok()?;
    debug!(path = %path.display(), orientation = tag, "exif orientation");
    Some(tag)
}
