//! services/portal/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol of the reader channel. The browser owns
//! the renderer and the display; the server owns the reader state and syncs the
//! reading position back to the store.

use reading_portal_core::{BookmarkState, Document, ErrorKind, ReaderSession};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens a document in the reader. Any previously open document is abandoned.
    Open { document_id: Uuid },

    /// The renderer opened the content and reports its page count.
    DocumentLoaded { num_pages: u32 },

    /// The renderer could not open the content.
    DocumentLoadFailed { reason: String },

    NextPage,
    PrevPage,
    JumpTo { page: u32 },
    ZoomIn,
    ZoomOut,
    ToggleFullscreen,
    ToggleBookmark,

    /// Leaves the reader without closing the connection.
    Close,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The document is open; the client should load `document.content_url`.
    ReaderOpened {
        document: Document,
        start_page: u32,
        bookmarked: BookmarkState,
        session: ReaderSession,
    },

    /// The reader state changed (page, zoom, fullscreen, load result).
    SessionUpdated { session: ReaderSession },

    BookmarkChanged { state: BookmarkState },

    /// Asks the client to enter or leave fullscreen.
    Fullscreen { enter: bool },

    /// Reports a failed operation. The reader stays usable unless `kind` says otherwise.
    Error { kind: ErrorKind, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_tagged_by_type() {
        let id = Uuid::new_v4();
        let msg: ClientMessage =
            serde_json::from_str(&format!(r#"{{"type":"open","document_id":"{id}"}}"#)).unwrap();
        assert_eq!(msg, ClientMessage::Open { document_id: id });

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"jump_to","page":7}"#).unwrap();
        assert_eq!(msg, ClientMessage::JumpTo { page: 7 });

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"toggle_bookmark"}"#).unwrap();
        assert_eq!(msg, ClientMessage::ToggleBookmark);
    }

    #[test]
    fn error_message_serializes_kind_in_snake_case() {
        let msg = ServerMessage::Error {
            kind: ErrorKind::RenderFailure,
            message: "content coming soon".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "render_failure");
    }
}
