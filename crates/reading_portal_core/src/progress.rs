//! crates/reading_portal_core/src/progress.rs
//!
//! Tracks the reader's position per document and persists it to the remote store.
//!
//! Writes are debounced on the trailing edge: every position change replaces the
//! pending write for that document, so only the last position inside the quiet
//! period is ever sent. Pending writes live in an explicit table keyed by document
//! id and are cancelled when the reader switches documents or is torn down.
//! Writes already sent are not cancellable; the store applies last-write-wins.
//! Persistence failures are logged and dropped so reading never blocks on a save.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::ReadingProgress;
use crate::identity::IdentityProvider;
use crate::lock;
use crate::ports::RemoteStore;

/// Quiet period between the last position change and the write.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1000);

/// Percentage written when a document is opened for the first time, so it shows
/// up as "currently reading" straight away.
pub const SEED_PERCENTAGE: u8 = 5;

/// `round(page / num_pages * 100)`, clamped to 0..=100. `None` when the page count
/// is not known yet.
pub fn progress_percentage(page_number: u32, num_pages: u32) -> Option<u8> {
    if num_pages == 0 {
        return None;
    }
    let ratio = f64::from(page_number) / f64::from(num_pages) * 100.0;
    Some(ratio.round().clamp(0.0, 100.0) as u8)
}

//=========================================================================================
// Active document (stale-response guard)
//=========================================================================================

/// The single document currently open in the reader.
///
/// Only navigation mutates it. Every asynchronous completion compares its own
/// document id against it before applying a result.
#[derive(Debug, Clone, Default)]
pub struct ActiveDocument(Arc<Mutex<Option<Uuid>>>);

impl ActiveDocument {
    pub fn get(&self) -> Option<Uuid> {
        *lock(&self.0)
    }

    pub fn is_active(&self, document_id: Uuid) -> bool {
        self.get() == Some(document_id)
    }

    fn set(&self, document_id: Option<Uuid>) {
        *lock(&self.0) = document_id;
    }
}

//=========================================================================================
// Tracker
//=========================================================================================

struct PendingWrite {
    ticket: u64,
    token: CancellationToken,
}

type PendingTable = Arc<Mutex<HashMap<Uuid, PendingWrite>>>;

/// Where a freshly opened reader should start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    pub start_page: u32,
    /// The row that existed before this open, if any.
    pub prior: Option<ReadingProgress>,
}

pub struct ProgressTracker {
    store: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    active: ActiveDocument,
    quiet_period: Duration,
    seed_percentage: u8,
    pending: PendingTable,
    next_ticket: AtomicU64,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn RemoteStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            active: ActiveDocument::default(),
            quiet_period: DEFAULT_QUIET_PERIOD,
            seed_percentage: SEED_PERCENTAGE,
            pending: Arc::default(),
            next_ticket: AtomicU64::new(0),
        }
    }

    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    pub fn with_seed_percentage(mut self, seed_percentage: u8) -> Self {
        self.seed_percentage = seed_percentage.clamp(1, 100);
        self
    }

    /// Makes `document_id` the active document and abandons pending writes for
    /// every other document.
    pub fn open_document(&self, document_id: Uuid) {
        self.active.set(Some(document_id));
        let mut pending = lock(&self.pending);
        pending.retain(|id, write| {
            if *id == document_id {
                return true;
            }
            debug!(document_id = %id, "Cancelling pending progress write for abandoned document.");
            write.token.cancel();
            false
        });
    }

    /// Leaves the reader: nothing is active and nothing pending will be written.
    pub fn close_document(&self) {
        self.active.set(None);
        self.cancel_all();
    }

    pub fn has_pending(&self, document_id: Uuid) -> bool {
        lock(&self.pending).contains_key(&document_id)
    }

    /// Records a new position and (re)schedules its write.
    ///
    /// Returns the computed percentage, or `None` when `num_pages` is zero, in
    /// which case nothing is scheduled.
    pub fn on_position_change(
        &self,
        document_id: Uuid,
        page_number: u32,
        num_pages: u32,
    ) -> Option<u8> {
        let percentage = progress_percentage(page_number, num_pages)?;

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Some(previous) = lock(&self.pending).insert(
            document_id,
            PendingWrite {
                ticket,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }

        let store = self.store.clone();
        let provider = self.identity.clone();
        let active = self.active.clone();
        let pending = self.pending.clone();
        let quiet_period = self.quiet_period;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(quiet_period) => {}
            }

            let identity = tokio::select! {
                _ = token.cancelled() => return,
                identity = provider.settled() => identity,
            };

            {
                let mut pending = lock(&pending);
                if token.is_cancelled() {
                    return;
                }
                if pending.get(&document_id).is_some_and(|w| w.ticket == ticket) {
                    pending.remove(&document_id);
                }
            }

            if !active.is_active(document_id) {
                debug!(%document_id, "Discarding progress write for a document that is no longer open.");
                return;
            }

            persist_progress(
                store.as_ref(),
                identity.user_id(),
                document_id,
                page_number,
                1,
                percentage,
            )
            .await;
        });

        Some(percentage)
    }

    /// Upserts the full progress row now. Anonymous callers are a no-op and store
    /// failures are logged, never returned.
    pub async fn persist(
        &self,
        user_id: Option<Uuid>,
        document_id: Uuid,
        chapter: u32,
        verse: u32,
        percentage: u8,
    ) {
        persist_progress(
            self.store.as_ref(),
            user_id,
            document_id,
            chapter,
            verse,
            percentage,
        )
        .await;
    }

    /// Single point read of the stored position. Read failures degrade to `None`.
    pub async fn load_initial(&self, user_id: Uuid, document_id: Uuid) -> Option<ReadingProgress> {
        match self.store.get_progress(user_id, document_id).await {
            Ok(progress) => progress,
            Err(e) => {
                warn!(%user_id, %document_id, "Failed to load reading progress: {:?}", e);
                None
            }
        }
    }

    /// Marks `document_id` as started for the signed-in user and returns the page
    /// to open at.
    ///
    /// A document never read before gets a row at chapter 1 with the seed
    /// percentage. A document read before keeps its stored position, with
    /// `lastReadAt` refreshed, and resumes from its stored chapter.
    pub async fn begin_reading(&self, document_id: Uuid) -> ResumePoint {
        let Some(user_id) = self.identity.settled().await.user_id() else {
            return ResumePoint {
                start_page: 1,
                prior: None,
            };
        };

        let prior = self.load_initial(user_id, document_id).await;
        let (chapter, verse, percentage) = match &prior {
            Some(p) => (
                non_zero(p.current_chapter, 1),
                non_zero(p.current_verse, 1),
                if p.progress_percentage == 0 {
                    self.seed_percentage
                } else {
                    p.progress_percentage
                },
            ),
            None => (1, 1, self.seed_percentage),
        };

        persist_progress(
            self.store.as_ref(),
            Some(user_id),
            document_id,
            chapter,
            verse,
            percentage,
        )
        .await;

        ResumePoint {
            start_page: chapter,
            prior,
        }
    }

    fn cancel_all(&self) {
        for (_, write) in lock(&self.pending).drain() {
            write.token.cancel();
        }
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn non_zero(value: u32, fallback: u32) -> u32 {
    if value == 0 {
        fallback
    } else {
        value
    }
}

async fn persist_progress(
    store: &dyn RemoteStore,
    user_id: Option<Uuid>,
    document_id: Uuid,
    chapter: u32,
    verse: u32,
    percentage: u8,
) {
    let Some(user_id) = user_id else {
        debug!(%document_id, "No signed-in user; progress stays local.");
        return;
    };

    let progress = ReadingProgress {
        user_id,
        document_id,
        current_chapter: chapter,
        current_verse: verse,
        progress_percentage: percentage.min(100),
        last_read_at: Utc::now(),
    };

    match store.upsert_progress(&progress).await {
        Ok(()) => info!(%user_id, %document_id, chapter, percentage, "Reading progress saved."),
        Err(e) => warn!(%user_id, %document_id, "Failed to save reading progress: {:?}", e),
    }
}
