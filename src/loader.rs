use std::path::{Path, PathBuf};

use image::{ImageReader, RgbaImage};
use tracing::debug;

use crate::error::{Error, Result};
use crate::meta::{Rotation, read_orientation};

/// A decoded, upright RGBA8 bitmap.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub pixels: RgbaImage,
    /// Correction applied after decoding.
    pub rotation: Rotation,
}

impl LoadedImage {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Decode `path` and rotate it according to its EXIF orientation tag.
///
/// # Errors
/// Returns [`Error::Open`] if the file cannot be opened and [`Error::Decode`]
/// if its contents are not a supported image.
pub fn load(path: &Path) -> Result<LoadedImage> {
    let decode_err = |source| Error::Decode {
        path: path.to_path_buf(),
        source,
    };
    let img = ImageReader::open(path)
        .map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(decode_err)?
        .to_rgba8();
    debug!(
        path = %path.display(),
        width = img.width(),
        height = img.height(),
        "decoded image"
    );

    let rotation = read_orientation(path).map_or(Rotation::Identity, Rotation::from_orientation_tag);
    let pixels = match rotation {
        Rotation::Identity => img,
        other => {
            debug!(path = %path.display(), degrees = other.degrees(), "applying orientation");
            other.apply(&img)
        }
    };

    Ok(LoadedImage {
        path: path.to_path_buf(),
        pixels,
        rotation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    #[test]
    fn corrects_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();

        let img = load(&path).unwrap();
        assert_eq!(img.rotation, Rotation::Ccw270);
        assert_eq!((img.width(), img.height()), (1, 2));
    }

    #[test]
    fn plain_png_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbaImage::new(6, 2).save(&path).unwrap();

        let img = load(&path).unwrap();
        assert_eq!(img.rotation, Rotation::Identity);
        assert_eq!((img.width(), img.height()), (6, 2));
    }

    #[test]
    fn non_image_entry_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"shopping list").unwrap();
        assert!(matches!(load(&path), Err(Error::Decode { .. })));
    }

    #[test]
    fn missing_entry_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(&dir.path().join("gone.jpg")),
            Err(Error::Open { .. })
        ));
    }
}
