//! Foreground UI chat peer client.

pub mod http_peer;

pub use http_peer::HttpUiChatPeer;
