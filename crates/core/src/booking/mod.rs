//! The hotel booking desk the agent talks on behalf of: a fixed room
//! inventory, heuristic slot extraction from caller speech, and the tools the
//! model may call.

pub mod context;
pub mod inventory;
pub mod tools;

pub use context::{BookingContext, Intent, RoomOffer};
pub use inventory::{Booking, BookingStore, Room};
pub use tools::BookingDesk;
