//! Broadcasting of engine changes for real-time observers.

pub mod events;

pub use events::{ChangeBroadcaster, MiningEvent, MiningEventKind};
