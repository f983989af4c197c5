//! services/portal/src/adapters/fullscreen.rs
//!
//! Fullscreen requests are forwarded to the connected client, which owns the
//! actual display. A closed connection counts as a refused request.

use reading_portal_core::ports::{FullscreenControl, PortError, PortResult};
use tokio::sync::mpsc::UnboundedSender;

use crate::web::protocol::ServerMessage;

pub struct ChannelFullscreen {
    outbound: UnboundedSender<ServerMessage>,
}

impl ChannelFullscreen {
    pub fn new(outbound: UnboundedSender<ServerMessage>) -> Self {
        Self { outbound }
    }
}

impl FullscreenControl for ChannelFullscreen {
    fn request(&self, enter: bool) -> PortResult<()> {
        self.outbound
            .send(ServerMessage::Fullscreen { enter })
            .map_err(|_| PortError::Unexpected("Reader connection is closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn request_is_forwarded_to_the_client() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let control = ChannelFullscreen::new(tx);
        control.request(true).unwrap();
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Fullscreen { enter: true })));
    }

    #[test]
    fn closed_connection_refuses() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        assert!(ChannelFullscreen::new(tx).request(true).is_err());
    }
}
