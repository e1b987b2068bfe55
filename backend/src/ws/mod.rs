pub mod dispatcher;
pub mod handler;
pub mod messages;
pub mod rate_limit;
pub mod registry;

pub use dispatcher::BroadcastDispatcher;
pub use handler::{ws_handler, GameServer};
pub use registry::{ConnectionHandle, ConnectionRegistry};
