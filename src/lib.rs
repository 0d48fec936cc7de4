//! Paddle Session Server - authoritative two-player session core
//!
//! Manages one match session for a real-time paddle game:
//! - Slot allocation and the ready-up protocol
//! - Match start/stop and the 60 Hz simulation tick chain
//! - Score aggregation from physics goal notifications
//! - Synchronous lifecycle events for a transport layer to forward

pub mod config;
pub mod game;
pub mod util;
