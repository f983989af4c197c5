pub mod db;
pub mod fullscreen;

pub use db::DbAdapter;
pub use fullscreen::ChannelFullscreen;
