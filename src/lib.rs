pub mod backlight;
pub mod config;
pub mod error;
pub mod loader;
pub mod meta;
pub mod render {
    pub mod viewer;
}
pub mod scale;
pub mod schedule;
pub mod shutdown;
pub mod slideshow;
pub mod store;

pub use error::{Error, Result};
