// jb-driver: the narrow browser surface jukebox drives videos through.
//
// The orchestrator in jb-core only ever sees the `BrowserDriver` trait;
// everything below it (WebSocket transport, request correlation, CDP
// message shapes) is an implementation detail of this crate.

pub mod capability;
pub mod cdp;
pub mod connection;
pub mod error;
pub mod fake;
pub mod transport;

pub use capability::{BrowserDriver, TabHandle};
pub use cdp::CdpDriver;
pub use connection::Connection;
pub use error::{Error, Result};
pub use fake::{FakeDriver, FakeDriverController};
