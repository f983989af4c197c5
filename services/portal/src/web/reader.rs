//! services/portal/src/web/reader.rs
//!
//! The per-connection reader: one pager, one progress tracker, and the bookmark
//! state of the open document. Messages are handled one at a time in arrival order.

use reading_portal_core::{
    ports::{FullscreenControl, RemoteStore},
    BookmarkState, BookmarkToggle, Document, ErrorKind, IdentityProvider, PagerEvent, PagerState,
    PortalError, ProgressTracker, ReaderPager, ResumePoint,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::ChannelFullscreen;
use crate::config::Config;
use crate::web::protocol::{ClientMessage, ServerMessage};

const CONTENT_COMING_SOON: &str = "Content coming soon.";

/// Tunables for one reader connection.
#[derive(Debug, Clone, Copy)]
pub struct ReaderSettings {
    pub quiet_period: Duration,
    pub seed_percentage: u8,
}

impl From<&Config> for ReaderSettings {
    fn from(config: &Config) -> Self {
        Self {
            quiet_period: config.progress_debounce,
            seed_percentage: config.seed_progress_percent,
        }
    }
}

struct OpenReader {
    pager: ReaderPager,
    bookmark: BookmarkState,
}

pub struct ReaderConnection {
    store: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    tracker: ProgressTracker,
    bookmarks: BookmarkToggle,
    fullscreen: Arc<dyn FullscreenControl>,
    outbound: UnboundedSender<ServerMessage>,
    reader: Option<OpenReader>,
}

impl ReaderConnection {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
        outbound: UnboundedSender<ServerMessage>,
        settings: ReaderSettings,
    ) -> Self {
        let tracker = ProgressTracker::new(store.clone(), identity.clone())
            .with_quiet_period(settings.quiet_period)
            .with_seed_percentage(settings.seed_percentage);
        Self {
            bookmarks: BookmarkToggle::new(store.clone()),
            fullscreen: Arc::new(ChannelFullscreen::new(outbound.clone())),
            store,
            identity,
            tracker,
            outbound,
            reader: None,
        }
    }

    /// The document currently open in the reader, if any.
    pub fn open_document_id(&self) -> Option<Uuid> {
        self.reader.as_ref().map(|r| r.pager.document_id())
    }

    pub async fn handle(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Open { document_id } => self.open(document_id).await,
            ClientMessage::DocumentLoaded { num_pages } => {
                self.apply(PagerEvent::LoadSucceeded { num_pages })
            }
            ClientMessage::DocumentLoadFailed { reason } => {
                self.apply(PagerEvent::LoadFailed { reason })
            }
            ClientMessage::NextPage => self.apply(PagerEvent::NextPage),
            ClientMessage::PrevPage => self.apply(PagerEvent::PrevPage),
            ClientMessage::JumpTo { page } => self.apply(PagerEvent::JumpTo(page)),
            ClientMessage::ZoomIn => self.apply(PagerEvent::ZoomIn),
            ClientMessage::ZoomOut => self.apply(PagerEvent::ZoomOut),
            ClientMessage::ToggleFullscreen => self.apply(PagerEvent::ToggleFullscreen),
            ClientMessage::ToggleBookmark => self.toggle_bookmark().await,
            ClientMessage::Close => self.close(),
        }
    }

    async fn open(&mut self, document_id: Uuid) {
        self.tracker.open_document(document_id);
        self.reader = None;

        let document = match self.store.get_document(document_id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                self.send_error(&PortalError::NotFound(format!("Document {}", document_id)));
                return;
            }
            Err(e) => {
                warn!(%document_id, "Failed to load document: {:?}", e);
                self.send_error(&PortalError::NotFound(format!("Document {}", document_id)));
                return;
            }
        };

        let (resume, bookmark) = self.load_reading_state(&document).await;

        let pager = if document.content_url.is_some() {
            ReaderPager::new(document_id, resume.start_page, self.fullscreen.clone())
        } else {
            ReaderPager::failed(document_id, CONTENT_COMING_SOON, self.fullscreen.clone())
        };
        let failed = matches!(pager.state(), PagerState::Failed { .. });

        info!(%document_id, start_page = resume.start_page, "Reader opened.");
        self.send(ServerMessage::ReaderOpened {
            document,
            start_page: resume.start_page,
            bookmarked: bookmark,
            session: pager.session(),
        });
        if failed {
            self.send_error(&PortalError::RenderFailure(CONTENT_COMING_SOON.to_string()));
        }
        self.reader = Some(OpenReader { pager, bookmark });
    }

    /// Seeds or refreshes the progress row and reads the bookmark, concurrently.
    async fn load_reading_state(&self, document: &Document) -> (ResumePoint, BookmarkState) {
        let document_id = document.id;
        let bookmark = async {
            match self.identity.settled().await.user_id() {
                Some(user_id) => self.bookmarks.status(user_id, document_id).await,
                None => BookmarkState::NotBookmarked,
            }
        };

        if document.content_url.is_some() {
            tokio::join!(self.tracker.begin_reading(document_id), bookmark)
        } else {
            let resume = ResumePoint {
                start_page: 1,
                prior: None,
            };
            (resume, bookmark.await)
        }
    }

    fn apply(&mut self, event: PagerEvent) {
        let Some(reader) = self.reader.as_mut() else {
            debug!(?event, "Reader event with no open document; ignoring.");
            return;
        };

        let load_failed = matches!(event, PagerEvent::LoadFailed { .. });
        if let Some(change) = reader.pager.apply(event) {
            self.tracker
                .on_position_change(change.document_id, change.page_number, change.num_pages);
        }

        let session = reader.pager.session();
        let failure = match reader.pager.state() {
            PagerState::Failed { reason } if load_failed => Some(reason.clone()),
            _ => None,
        };

        self.send(ServerMessage::SessionUpdated { session });
        if let Some(reason) = failure {
            self.send_error(&PortalError::RenderFailure(reason));
        }
    }

    async fn toggle_bookmark(&mut self) {
        let Some((document_id, current)) = self
            .reader
            .as_ref()
            .map(|r| (r.pager.document_id(), r.bookmark))
        else {
            debug!("Bookmark toggle with no open document; ignoring.");
            return;
        };

        let user_id = self.identity.settled().await.user_id();
        match self.bookmarks.toggle(user_id, document_id, current).await {
            Ok(state) => {
                if let Some(reader) = self
                    .reader
                    .as_mut()
                    .filter(|r| r.pager.document_id() == document_id)
                {
                    reader.bookmark = state;
                }
                self.send(ServerMessage::BookmarkChanged { state });
            }
            Err(e) => self.send_error(&e),
        }
    }

    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            info!(document_id = %reader.pager.document_id(), "Reader closed.");
        }
        self.tracker.close_document();
    }

    fn send(&self, message: ServerMessage) {
        if self.outbound.send(message).is_err() {
            debug!("Reader connection is closed; dropping outbound message.");
        }
    }

    fn send_error(&self, error: &PortalError) {
        let kind: ErrorKind = error.kind();
        self.send(ServerMessage::Error {
            kind,
            message: error.to_string(),
        });
    }
}
