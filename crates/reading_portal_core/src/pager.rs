//! crates/reading_portal_core/src/pager.rs
//!
//! The reader's state machine: document load, page navigation, zoom, fullscreen.
//!
//! `Loading` moves to `Loaded` when the renderer reports a page count, or to
//! `Failed` when it reports an error. `Failed` is left only by constructing a new
//! pager, i.e. reopening the document. Every page transition yields a
//! [`PositionChange`] for the progress tracker.

use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::ports::FullscreenControl;

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 2.5;
pub const SCALE_STEP: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadedView {
    pub page_number: u32,
    pub num_pages: u32,
    pub scale: f32,
    pub fullscreen: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PagerState {
    Loading,
    Loaded(LoadedView),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PagerEvent {
    /// The renderer opened the document.
    LoadSucceeded { num_pages: u32 },
    /// The renderer could not open the document.
    LoadFailed { reason: String },
    NextPage,
    PrevPage,
    JumpTo(u32),
    ZoomIn,
    ZoomOut,
    ToggleFullscreen,
}

/// A page transition to hand to the progress tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionChange {
    pub document_id: Uuid,
    pub page_number: u32,
    pub num_pages: u32,
}

/// Serializable snapshot of the reader.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReaderSession {
    pub document_id: Uuid,
    pub page_number: u32,
    pub num_pages: u32,
    pub scale: f32,
    pub fullscreen: bool,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct ReaderPager {
    document_id: Uuid,
    start_page: u32,
    state: PagerState,
    fullscreen: Arc<dyn FullscreenControl>,
}

impl ReaderPager {
    /// A pager in `Loading` that will open at `start_page` once the page count is known.
    pub fn new(document_id: Uuid, start_page: u32, fullscreen: Arc<dyn FullscreenControl>) -> Self {
        Self {
            document_id,
            start_page: start_page.max(1),
            state: PagerState::Loading,
            fullscreen,
        }
    }

    /// A pager that is already `Failed`, for documents with no readable content.
    pub fn failed(document_id: Uuid, reason: impl Into<String>, fullscreen: Arc<dyn FullscreenControl>) -> Self {
        Self {
            document_id,
            start_page: 1,
            state: PagerState::Failed {
                reason: reason.into(),
            },
            fullscreen,
        }
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn state(&self) -> &PagerState {
        &self.state
    }

    /// Applies one event. Returns the new position when the page changed.
    pub fn apply(&mut self, event: PagerEvent) -> Option<PositionChange> {
        match event {
            PagerEvent::LoadSucceeded { num_pages } => self.on_load_succeeded(num_pages),
            PagerEvent::LoadFailed { reason } => {
                if matches!(self.state, PagerState::Loading) {
                    warn!(document_id = %self.document_id, %reason, "Document failed to load.");
                    self.state = PagerState::Failed { reason };
                }
                None
            }
            event => self.on_navigate(event),
        }
    }

    fn on_load_succeeded(&mut self, num_pages: u32) -> Option<PositionChange> {
        if !matches!(self.state, PagerState::Loading) {
            return None;
        }
        if num_pages == 0 {
            self.state = PagerState::Failed {
                reason: "The document has no pages.".to_string(),
            };
            return None;
        }
        let view = LoadedView {
            page_number: self.start_page.min(num_pages),
            num_pages,
            scale: 1.0,
            fullscreen: false,
        };
        self.state = PagerState::Loaded(view);
        Some(self.position(&view))
    }

    // Loading ignores navigation; Failed ignores everything.
    fn on_navigate(&mut self, event: PagerEvent) -> Option<PositionChange> {
        let PagerState::Loaded(view) = &mut self.state else {
            return None;
        };
        let before = view.page_number;

        match event {
            PagerEvent::NextPage => {
                view.page_number = view.page_number.saturating_add(1).min(view.num_pages);
            }
            PagerEvent::PrevPage => {
                view.page_number = view.page_number.saturating_sub(1).max(1);
            }
            PagerEvent::JumpTo(page) => {
                if (1..=view.num_pages).contains(&page) {
                    view.page_number = page;
                }
            }
            PagerEvent::ZoomIn => view.scale = step_scale(view.scale, SCALE_STEP),
            PagerEvent::ZoomOut => view.scale = step_scale(view.scale, -SCALE_STEP),
            PagerEvent::ToggleFullscreen => {
                let enter = !view.fullscreen;
                match self.fullscreen.request(enter) {
                    Ok(()) => view.fullscreen = enter,
                    Err(e) => {
                        warn!("Fullscreen request failed: {:?}", e);
                        view.fullscreen = false;
                    }
                }
            }
            PagerEvent::LoadSucceeded { .. } | PagerEvent::LoadFailed { .. } => {}
        }

        let view = *view;
        (view.page_number != before).then(|| self.position(&view))
    }

    pub fn session(&self) -> ReaderSession {
        let mut session = ReaderSession {
            document_id: self.document_id,
            page_number: self.start_page,
            num_pages: 0,
            scale: 1.0,
            fullscreen: false,
            loading: false,
            error: None,
        };
        match &self.state {
            PagerState::Loading => session.loading = true,
            PagerState::Loaded(view) => {
                session.page_number = view.page_number;
                session.num_pages = view.num_pages;
                session.scale = view.scale;
                session.fullscreen = view.fullscreen;
            }
            PagerState::Failed { reason } => session.error = Some(reason.clone()),
        }
        session
    }

    fn position(&self, view: &LoadedView) -> PositionChange {
        PositionChange {
            document_id: self.document_id,
            page_number: view.page_number,
            num_pages: view.num_pages,
        }
    }
}

fn step_scale(scale: f32, delta: f32) -> f32 {
    // Quarter steps are exact in binary floating point, so no drift accumulates.
    (scale + delta).clamp(MIN_SCALE, MAX_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingFullscreen {
        refuse: bool,
        requests: Mutex<Vec<bool>>,
    }

    impl FullscreenControl for RecordingFullscreen {
        fn request(&self, enter: bool) -> PortResult<()> {
            self.requests.lock().expect("lock").push(enter);
            if self.refuse && enter {
                return Err(PortError::Unexpected("denied".into()));
            }
            Ok(())
        }
    }

    fn loaded(num_pages: u32) -> ReaderPager {
        let mut pager = ReaderPager::new(Uuid::new_v4(), 1, Arc::new(RecordingFullscreen::default()));
        pager.apply(PagerEvent::LoadSucceeded { num_pages });
        pager
    }

    fn view(pager: &ReaderPager) -> LoadedView {
        match pager.state() {
            PagerState::Loaded(view) => *view,
            other => panic!("expected Loaded, got {other:?}"),
        }
    }

    #[test]
    fn load_emits_initial_position() {
        let doc = Uuid::new_v4();
        let mut pager = ReaderPager::new(doc, 4, Arc::new(RecordingFullscreen::default()));
        assert_eq!(pager.state(), &PagerState::Loading);
        assert!(pager.session().loading);

        let change = pager.apply(PagerEvent::LoadSucceeded { num_pages: 10 });
        assert_eq!(
            change,
            Some(PositionChange {
                document_id: doc,
                page_number: 4,
                num_pages: 10
            })
        );
    }

    #[test]
    fn resume_page_is_clamped_to_page_count() {
        let mut pager = ReaderPager::new(Uuid::new_v4(), 40, Arc::new(RecordingFullscreen::default()));
        pager.apply(PagerEvent::LoadSucceeded { num_pages: 12 });
        assert_eq!(view(&pager).page_number, 12);
    }

    #[test]
    fn navigation_is_bounded() {
        let mut pager = loaded(3);
        assert_eq!(pager.apply(PagerEvent::PrevPage), None);
        assert_eq!(view(&pager).page_number, 1);

        assert_eq!(pager.apply(PagerEvent::NextPage).map(|c| c.page_number), Some(2));
        assert_eq!(pager.apply(PagerEvent::NextPage).map(|c| c.page_number), Some(3));
        assert_eq!(pager.apply(PagerEvent::NextPage), None);
        assert_eq!(view(&pager).page_number, 3);
    }

    #[test]
    fn jump_outside_range_is_ignored() {
        let mut pager = loaded(10);
        assert_eq!(pager.apply(PagerEvent::JumpTo(0)), None);
        assert_eq!(pager.apply(PagerEvent::JumpTo(11)), None);
        assert_eq!(view(&pager).page_number, 1);
        assert_eq!(pager.apply(PagerEvent::JumpTo(10)).map(|c| c.page_number), Some(10));
    }

    #[test]
    fn last_page_of_largest_document_stays_in_range() {
        let mut pager = loaded(u32::MAX);
        assert_eq!(
            pager.apply(PagerEvent::JumpTo(u32::MAX)).map(|c| c.page_number),
            Some(u32::MAX)
        );
        assert_eq!(pager.apply(PagerEvent::NextPage), None);
        assert_eq!(view(&pager).page_number, u32::MAX);
        assert_eq!(
            pager.apply(PagerEvent::PrevPage).map(|c| c.page_number),
            Some(u32::MAX - 1)
        );
    }

    #[test]
    fn zoom_steps_and_clamps() {
        let mut pager = loaded(5);
        for _ in 0..10 {
            assert_eq!(pager.apply(PagerEvent::ZoomIn), None);
        }
        assert_eq!(view(&pager).scale, MAX_SCALE);
        for _ in 0..10 {
            pager.apply(PagerEvent::ZoomOut);
        }
        assert_eq!(view(&pager).scale, MIN_SCALE);
        pager.apply(PagerEvent::ZoomIn);
        assert_eq!(view(&pager).scale, 0.75);
    }

    #[test]
    fn fullscreen_toggles_through_platform() {
        let platform = Arc::new(RecordingFullscreen::default());
        let mut pager = ReaderPager::new(Uuid::new_v4(), 1, platform.clone());
        pager.apply(PagerEvent::LoadSucceeded { num_pages: 2 });

        pager.apply(PagerEvent::ToggleFullscreen);
        assert!(view(&pager).fullscreen);
        pager.apply(PagerEvent::ToggleFullscreen);
        assert!(!view(&pager).fullscreen);
        assert_eq!(*platform.requests.lock().expect("lock"), vec![true, false]);
    }

    #[test]
    fn refused_fullscreen_leaves_flag_unset() {
        let platform = Arc::new(RecordingFullscreen {
            refuse: true,
            ..Default::default()
        });
        let mut pager = ReaderPager::new(Uuid::new_v4(), 1, platform);
        pager.apply(PagerEvent::LoadSucceeded { num_pages: 2 });

        assert_eq!(pager.apply(PagerEvent::ToggleFullscreen), None);
        assert!(!view(&pager).fullscreen);
    }

    #[test]
    fn failed_is_sticky() {
        let mut pager = ReaderPager::new(Uuid::new_v4(), 1, Arc::new(RecordingFullscreen::default()));
        pager.apply(PagerEvent::LoadFailed {
            reason: "corrupt".into(),
        });
        assert_eq!(pager.apply(PagerEvent::LoadSucceeded { num_pages: 5 }), None);
        assert_eq!(pager.apply(PagerEvent::NextPage), None);
        assert_eq!(pager.session().error.as_deref(), Some("corrupt"));
    }

    #[test]
    fn zero_page_document_fails() {
        let mut pager = ReaderPager::new(Uuid::new_v4(), 1, Arc::new(RecordingFullscreen::default()));
        assert_eq!(pager.apply(PagerEvent::LoadSucceeded { num_pages: 0 }), None);
        assert!(matches!(pager.state(), PagerState::Failed { .. }));
    }

    #[test]
    fn navigation_while_loading_is_ignored() {
        let mut pager = ReaderPager::new(Uuid::new_v4(), 1, Arc::new(RecordingFullscreen::default()));
        assert_eq!(pager.apply(PagerEvent::NextPage), None);
        assert_eq!(pager.state(), &PagerState::Loading);
    }
}
