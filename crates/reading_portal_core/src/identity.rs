//! crates/reading_portal_core/src/identity.rs
//!
//! The identity contract: "who is signed in", which may still be unknown while the
//! session is being resolved.

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// Still initializing. Must not be read as "signed out".
    Unknown,
    Anonymous,
    User(Uuid),
}

impl Identity {
    pub fn user_id(self) -> Option<Uuid> {
        match self {
            Identity::User(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_settled(self) -> bool {
        self != Identity::Unknown
    }
}

impl From<Option<Uuid>> for Identity {
    fn from(user_id: Option<Uuid>) -> Self {
        user_id.map_or(Identity::Anonymous, Identity::User)
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The identity as of now, possibly `Unknown`.
    fn current(&self) -> Identity;

    /// Waits until the identity is no longer `Unknown`.
    async fn settled(&self) -> Identity;
}

/// An identity that starts `Unknown` and is resolved exactly once by its owner.
#[derive(Debug, Clone)]
pub struct IdentityCell {
    tx: std::sync::Arc<watch::Sender<Identity>>,
    rx: watch::Receiver<Identity>,
}

impl IdentityCell {
    pub fn unresolved() -> Self {
        let (tx, rx) = watch::channel(Identity::Unknown);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    pub fn resolved(identity: Identity) -> Self {
        let cell = Self::unresolved();
        cell.resolve(identity);
        cell
    }

    /// Publishes the resolved identity. Later calls overwrite (sign-in, sign-out).
    pub fn resolve(&self, identity: Identity) {
        self.tx.send_replace(identity);
    }
}

#[async_trait]
impl IdentityProvider for IdentityCell {
    fn current(&self) -> Identity {
        *self.rx.borrow()
    }

    async fn settled(&self) -> Identity {
        let mut rx = self.rx.clone();
        let identity = match rx.wait_for(|identity| identity.is_settled()).await {
            Ok(identity) => *identity,
            // Sender gone while still unknown: nobody will ever sign in.
            Err(_) => Identity::Anonymous,
        };
        identity
    }
}
