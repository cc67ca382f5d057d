use std::path::PathBuf;

use thiserror::Error;

/// Library error type for slideshow operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The image store directory could not be listed.
    #[error("image store {} is unreadable", .path.display())]
    StoreUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The listing completed but contained no entries.
    #[error("no images available in {}", .0.display())]
    NoImages(PathBuf),

    /// The entry could not be opened for decoding.
    #[error("failed to open {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The entry is not an image, or the image data is corrupt.
    #[error("not an image or corrupt: {}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Scaling would produce an empty or unrepresentable bitmap.
    #[error("cannot scale {width}x{height} to height {target_height}")]
    DegenerateScale {
        width: u32,
        height: u32,
        target_height: u32,
    },

    /// The resampler rejected the buffers it was handed.
    #[error("resize to {width}x{height} failed: {reason}")]
    Resize {
        width: u32,
        height: u32,
        reason: String,
    },

    /// A slideshow transition was requested from a state that does not allow it.
    #[error("cannot {action} a slideshow that is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    /// Rendering/display error from the surface.
    #[error("render error: {0}")]
    Render(anyhow::Error),
}

impl Error {
    /// Whether the slideshow must stop rather than skip to the next image.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DegenerateScale { .. } | Self::Resize { .. } | Self::Render(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
