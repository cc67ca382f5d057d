//! Timed image cycling.
//!
//! [`Slideshow`] is a small state machine driven by whoever owns the event
//! loop: call [`Slideshow::start`] once, then [`Slideshow::poll`] whenever the
//! loop wakes up. Rendering goes through a [`FrameSink`], which keeps the
//! controller independent of the window toolkit.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::loader::{self, LoadedImage};
use crate::scale::{ScaledImage, scale_to_height};
use crate::store::ImageStore;

/// Surface the slideshow renders onto.
pub trait FrameSink {
    /// Current drawable size in physical pixels, `(width, height)`.
    fn size(&self) -> (u32, u32);

    /// Replace whatever is on screen with `frame`.
    ///
    /// # Errors
    /// Implementations return an error when the frame could not be shown.
    fn present(&mut self, frame: &ScaledImage) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// User-requested quit.
    Interrupted,
    /// Scaling or rendering failed; the process should exit nonzero.
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideshowState {
    Idle,
    Running { next_tick: Instant },
    Terminated(Termination),
}

impl SlideshowState {
    const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running { .. } => "running",
            Self::Terminated(_) => "terminated",
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Shown {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    /// Nothing displayable this tick; the previous frame stays up.
    Skipped,
}

#[derive(Debug)]
pub struct Slideshow {
    store: ImageStore,
    period: Duration,
    state: SlideshowState,
    /// Decoded image on screen, kept so it can be re-fitted after a resize.
    current: Option<LoadedImage>,
}

impl Slideshow {
    pub fn new(store: ImageStore, period: Duration) -> Self {
        Self {
            store,
            period,
            state: SlideshowState::Idle,
            current: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SlideshowState {
        self.state
    }

    /// Instant the next tick is due, while running.
    #[must_use]
    pub const fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            SlideshowState::Running { next_tick } => Some(next_tick),
            _ => None,
        }
    }

    /// Leave `Idle`, show the first image right away and schedule the next.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransition`] unless the slideshow is idle, and
    /// any fatal tick error (after which the slideshow is terminated).
    pub fn start(&mut self, now: Instant, sink: &mut impl FrameSink) -> Result<TickOutcome> {
        if self.state != SlideshowState::Idle {
            return Err(Error::InvalidTransition {
                action: "start",
                state: self.state.name(),
            });
        }
        info!(
            store = %self.store.dir().display(),
            period = %humantime::format_duration(self.period),
            "slideshow starting"
        );
        self.state = SlideshowState::Running {
            next_tick: now + self.period,
        };
        self.tick(sink)
    }

    /// Tick if the deadline has passed. Returns `Ok(None)` when nothing was due
    /// or the slideshow is not running.
    ///
    /// # Errors
    /// Propagates fatal tick errors; the slideshow is terminated first.
    pub fn poll(&mut self, now: Instant, sink: &mut impl FrameSink) -> Result<Option<TickOutcome>> {
        match self.state {
            SlideshowState::Running { next_tick } if now >= next_tick => {
                self.state = SlideshowState::Running {
                    next_tick: now + self.period,
                };
                self.tick(sink).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Re-fit the image on screen to the sink's current size without advancing
    /// the store or moving the next deadline. Returns `Ok(None)` when there is
    /// nothing to redraw.
    ///
    /// # Errors
    /// Propagates fatal scaling or rendering errors; the slideshow is
    /// terminated first.
    pub fn refresh(&mut self, sink: &mut impl FrameSink) -> Result<Option<TickOutcome>> {
        if !matches!(self.state, SlideshowState::Running { .. }) {
            return Ok(None);
        }
        let Some(image) = self.current.as_ref() else {
            return Ok(None);
        };
        match present_fitted(image, sink) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(err) => {
                error!(error = %err, "fatal slideshow error");
                self.state = SlideshowState::Terminated(Termination::Fatal);
                Err(err)
            }
        }
    }

    /// Stop ticking. Idempotent; an earlier fatal termination is preserved.
    pub fn interrupt(&mut self) {
        if !matches!(self.state, SlideshowState::Terminated(_)) {
            info!("slideshow interrupted");
            self.state = SlideshowState::Terminated(Termination::Interrupted);
        }
    }

    fn tick(&mut self, sink: &mut impl FrameSink) -> Result<TickOutcome> {
        match self.show_next(sink) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!(error = %err, "fatal slideshow error");
                self.state = SlideshowState::Terminated(Termination::Fatal);
                Err(err)
            }
        }
    }

    /// Load the next decodable entry from one listing snapshot and present it.
    /// Only fatal errors escape; everything else downgrades to `Skipped`.
    fn show_next(&mut self, sink: &mut impl FrameSink) -> Result<TickOutcome> {
        let listing = match self.store.list() {
            Ok(listing) => listing,
            Err(err) => {
                warn!(error = %err, "image store unavailable; keeping current frame");
                return Ok(TickOutcome::Skipped);
            }
        };
        if listing.is_empty() {
            warn!(store = %self.store.dir().display(), "no images available; keeping current frame");
            return Ok(TickOutcome::Skipped);
        }

        for _ in 0..listing.len() {
            let path = self.store.advance_within(&listing)?;
            let image = match loader::load(&path) {
                Ok(image) => image,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping entry");
                    continue;
                }
            };

            let outcome = present_fitted(&image, sink)?;
            self.current = Some(image);
            return Ok(outcome);
        }

        warn!(
            store = %self.store.dir().display(),
            entries = listing.len(),
            "no decodable images in store; keeping current frame"
        );
        Ok(TickOutcome::Skipped)
    }
}

/// Scale `image` to the sink's height and hand it over.
fn present_fitted(image: &LoadedImage, sink: &mut impl FrameSink) -> Result<TickOutcome> {
    let (_, display_h) = sink.size();
    let scaled = scale_to_height(&image.pixels, display_h)?;
    debug!(
        path = %image.path.display(),
        src_w = image.width(),
        src_h = image.height(),
        width = scaled.width(),
        height = scaled.height(),
        "presenting"
    );
    sink.present(&scaled).map_err(Error::Render)?;
    Ok(TickOutcome::Shown {
        path: image.path.clone(),
        width: scaled.width(),
        height: scaled.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use std::path::Path;

    struct RecordingSink {
        size: (u32, u32),
        presented: Vec<(u32, u32)>,
    }

    impl RecordingSink {
        fn new(width: u32, height: u32) -> Self {
            Self {
                size: (width, height),
                presented: Vec::new(),
            }
        }
    }

    impl FrameSink for RecordingSink {
        fn size(&self) -> (u32, u32) {
            self.size
        }

        fn present(&mut self, frame: &ScaledImage) -> anyhow::Result<()> {
            self.presented.push((frame.width(), frame.height()));
            Ok(())
        }
    }

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) {
        RgbaImage::new(w, h).save(dir.join(name)).unwrap();
    }

    #[test]
    fn start_shows_one_frame_and_schedules_next() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 40, 30);
        let mut show = Slideshow::new(ImageStore::new(dir.path()), Duration::from_millis(500));
        let mut sink = RecordingSink::new(200, 60);

        let now = Instant::now();
        let outcome = show.start(now, &mut sink).unwrap();
        assert!(matches!(outcome, TickOutcome::Shown { width: 80, height: 60, .. }));
        assert_eq!(sink.presented, vec![(80, 60)]);
        assert_eq!(show.next_deadline(), Some(now + Duration::from_millis(500)));
    }

    #[test]
    fn start_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 4, 4);
        let mut show = Slideshow::new(ImageStore::new(dir.path()), Duration::from_secs(1));
        let mut sink = RecordingSink::new(8, 8);
        show.start(Instant::now(), &mut sink).unwrap();
        assert!(matches!(
            show.start(Instant::now(), &mut sink),
            Err(Error::InvalidTransition { action: "start", state: "running" })
        ));
    }

    #[test]
    fn poll_waits_for_deadline() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 4, 4);
        let period = Duration::from_millis(100);
        let mut show = Slideshow::new(ImageStore::new(dir.path()), period);
        let mut sink = RecordingSink::new(8, 8);
        let t0 = Instant::now();
        show.start(t0, &mut sink).unwrap();

        assert_eq!(show.poll(t0 + period / 2, &mut sink).unwrap(), None);
        assert_eq!(sink.presented.len(), 1);
        assert!(show.poll(t0 + period, &mut sink).unwrap().is_some());
        assert_eq!(sink.presented.len(), 2);
        assert_eq!(show.next_deadline(), Some(t0 + period * 2));
    }

    #[test]
    fn undecodable_entries_are_skipped_within_a_tick() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"not a photo").unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"\xff\xd8 truncated").unwrap();
        write_png(dir.path(), "good.png", 10, 10);
        let mut show = Slideshow::new(ImageStore::new(dir.path()), Duration::from_secs(1));
        let mut sink = RecordingSink::new(20, 20);

        let t0 = Instant::now();
        let mut outcome = show.start(t0, &mut sink).unwrap();
        for i in 1..4 {
            let expected = TickOutcome::Shown {
                path: dir.path().join("good.png"),
                width: 20,
                height: 20,
            };
            assert_eq!(outcome, expected);
            outcome = show
                .poll(t0 + Duration::from_secs(i), &mut sink)
                .unwrap()
                .unwrap();
        }
    }

    #[test]
    fn empty_store_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut show = Slideshow::new(ImageStore::new(dir.path()), Duration::from_secs(1));
        let mut sink = RecordingSink::new(20, 20);
        let t0 = Instant::now();
        assert_eq!(show.start(t0, &mut sink).unwrap(), TickOutcome::Skipped);
        assert!(matches!(show.state(), SlideshowState::Running { .. }));

        write_png(dir.path(), "late.png", 5, 5);
        let outcome = show.poll(t0 + Duration::from_secs(1), &mut sink).unwrap();
        assert!(matches!(outcome, Some(TickOutcome::Shown { .. })));
    }

    #[test]
    fn degenerate_display_is_fatal_and_renders_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 40, 30);
        let mut show = Slideshow::new(ImageStore::new(dir.path()), Duration::from_secs(1));
        let mut sink = RecordingSink::new(640, 0);

        let err = show.start(Instant::now(), &mut sink).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, Error::DegenerateScale { .. }));
        assert!(sink.presented.is_empty());
        assert_eq!(show.state(), SlideshowState::Terminated(Termination::Fatal));
        assert_eq!(show.next_deadline(), None);
    }

    #[test]
    fn interrupt_stops_ticks_but_keeps_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 4, 4);
        let mut show = Slideshow::new(ImageStore::new(dir.path()), Duration::from_millis(10));
        let mut sink = RecordingSink::new(8, 8);
        let t0 = Instant::now();
        show.start(t0, &mut sink).unwrap();
        show.interrupt();
        assert_eq!(
            show.state(),
            SlideshowState::Terminated(Termination::Interrupted)
        );
        assert_eq!(show.poll(t0 + Duration::from_secs(5), &mut sink).unwrap(), None);
        assert_eq!(sink.presented.len(), 1);

        let mut fatal = Slideshow::new(ImageStore::new(dir.path()), Duration::from_millis(10));
        let _ = fatal.start(t0, &mut RecordingSink::new(8, 0));
        fatal.interrupt();
        assert_eq!(fatal.state(), SlideshowState::Terminated(Termination::Fatal));
    }

    #[test]
    fn refresh_refits_current_image_without_advancing() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 40, 30);
        write_png(dir.path(), "b.png", 30, 40);
        let period = Duration::from_secs(60);
        let mut show = Slideshow::new(ImageStore::new(dir.path()), period);
        let mut sink = RecordingSink::new(800, 600);

        let t0 = Instant::now();
        let Ok(TickOutcome::Shown { path: first, .. }) = show.start(t0, &mut sink) else {
            panic!("first tick shows an image");
        };
        let cursor = show.store.cursor();

        sink.size = (1920, 1080);
        let Some(TickOutcome::Shown { path, height, .. }) = show.refresh(&mut sink).unwrap() else {
            panic!("refresh re-presents the current image");
        };
        assert_eq!(path, first);
        assert_eq!(height, 1080);
        assert_eq!(sink.presented.last().map(|&(_, h)| h), Some(1080));
        assert_eq!(sink.presented.len(), 2);
        assert_eq!(show.store.cursor(), cursor);
        assert_eq!(show.next_deadline(), Some(t0 + period));
    }

    #[test]
    fn refresh_before_start_or_without_image_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut show = Slideshow::new(ImageStore::new(dir.path()), Duration::from_secs(1));
        let mut sink = RecordingSink::new(8, 8);
        assert_eq!(show.refresh(&mut sink).unwrap(), None);

        show.start(Instant::now(), &mut sink).unwrap();
        assert_eq!(show.refresh(&mut sink).unwrap(), None);
        assert!(sink.presented.is_empty());
    }

    #[test]
    fn refresh_to_degenerate_size_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 4, 4);
        let mut show = Slideshow::new(ImageStore::new(dir.path()), Duration::from_secs(1));
        let mut sink = RecordingSink::new(8, 8);
        show.start(Instant::now(), &mut sink).unwrap();

        sink.size = (8, 0);
        assert!(show.refresh(&mut sink).unwrap_err().is_fatal());
        assert_eq!(show.state(), SlideshowState::Terminated(Termination::Fatal));
    }
}
