pub mod rooms;

pub use rooms::{router as rooms_router, RoomsAppState};
