//! Implemented as a loopback HTTP+JSON listener: one bind address stands in for
//! "one service name, one object path, one interface". `--dbus` on the CLI enables
//! the same listener under a different name, not a different transport.

pub mod http_server;

pub use http_server::{IpcContext, IpcServer};
