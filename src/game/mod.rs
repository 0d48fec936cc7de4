//! Session core: slots, physics port, events and the session task

pub mod arena;
pub mod events;
pub mod physics;
pub mod service;
pub mod session;
pub mod slot;

pub use arena::ArenaPhysics;
pub use events::{EventBus, SessionEvent, Subscriber, SubscriptionId};
pub use physics::{FieldSize, ObjectPositions, PaddleSize, PhysicsPort, Vec2};
pub use service::{SessionHandle, SessionService};
pub use session::{
    JoinRequest, Player, ScoreEntry, SessionConfig, SessionError, SessionManager, SessionSnapshot,
};
pub use slot::Slot;
