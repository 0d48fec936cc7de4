//! Physics port consumed by the session core
//!
//! The session never simulates anything itself. It drives a physics collaborator
//! through [`PhysicsPort`] and learns about goals through the scored callback.

use serde::{Deserialize, Serialize};

use super::slot::Slot;

/// 2D vector in field units (y grows towards the floor)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// Playing field dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSize {
    pub width: f32,
    pub height: f32,
}

impl FieldSize {
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Paddle box dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleSize {
    pub width: f32,
    pub height: f32,
}

/// Paddle position for one occupied slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddlePosition {
    pub slot: Slot,
    pub position: Vec2,
}

/// Positions of every simulated object at the current moment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectPositions {
    pub ball: Vec2,
    pub paddles: Vec<PaddlePosition>,
}

/// Callback fired when the ball crosses a goal line.
///
/// The argument is the slot whose goal line was crossed, i.e. the side that
/// conceded. The point belongs to `slot.opposite()`.
pub type BallScoredCallback = Box<dyn FnMut(Slot) + Send>;

/// Capability the session consumes from the physics simulation
pub trait PhysicsPort: Send {
    /// Configured field dimensions
    fn field_size(&self) -> FieldSize;

    /// Materialize a controllable paddle for a slot
    fn add_paddle(&mut self, slot: Slot, size: PaddleSize);

    fn remove_paddle(&mut self, slot: Slot);

    /// Teleport the ball and set its velocity in one operation
    fn position_ball(&mut self, position: Vec2, velocity: Vec2);

    fn give_impulse_to_paddle(&mut self, slot: Slot, impulse: Vec2);

    /// Advance the simulation. `accuracy` is an iteration-count hint.
    fn step(&mut self, elapsed_secs: f32, accuracy: u32);

    /// Register the scored callback, replacing any previous one
    fn on_ball_scored(&mut self, callback: BallScoredCallback);

    fn ball_and_paddle_positions(&self) -> ObjectPositions;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Recording physics double shared by the session and service tests

    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum PhysicsCall {
        AddPaddle(Slot, PaddleSize),
        RemovePaddle(Slot),
        PositionBall { position: Vec2, velocity: Vec2 },
        Impulse(Slot, Vec2),
        Step { elapsed_secs: f32, accuracy: u32 },
    }

    #[derive(Default)]
    struct Shared {
        calls: Vec<PhysicsCall>,
        scored: Option<BallScoredCallback>,
    }

    /// Physics double: records calls, lets tests fire the scored callback
    #[derive(Clone)]
    pub struct RecordingPhysics {
        field: FieldSize,
        shared: Arc<Mutex<Shared>>,
    }

    impl RecordingPhysics {
        pub fn new() -> Self {
            Self {
                field: FieldSize {
                    width: 20.0,
                    height: 20.0,
                },
                shared: Arc::new(Mutex::new(Shared::default())),
            }
        }

        pub fn calls(&self) -> Vec<PhysicsCall> {
            self.shared.lock().calls.clone()
        }

        pub fn steps(&self) -> Vec<f32> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    PhysicsCall::Step { elapsed_secs, .. } => Some(elapsed_secs),
                    _ => None,
                })
                .collect()
        }

        pub fn ball_placements(&self) -> Vec<(Vec2, Vec2)> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    PhysicsCall::PositionBall { position, velocity } => Some((position, velocity)),
                    _ => None,
                })
                .collect()
        }

        pub fn has_scored_callback(&self) -> bool {
            self.shared.lock().scored.is_some()
        }

        /// Fire the registered scored callback with the conceding slot
        pub fn concede(&self, slot: Slot) {
            // Take the callback out so it never runs under the lock
            let callback = self.shared.lock().scored.take();
            if let Some(mut callback) = callback {
                callback(slot);
                self.shared.lock().scored = Some(callback);
            }
        }

        fn record(&self, call: PhysicsCall) {
            self.shared.lock().calls.push(call);
        }
    }

    impl PhysicsPort for RecordingPhysics {
        fn field_size(&self) -> FieldSize {
            self.field
        }

        fn add_paddle(&mut self, slot: Slot, size: PaddleSize) {
            self.record(PhysicsCall::AddPaddle(slot, size));
        }

        fn remove_paddle(&mut self, slot: Slot) {
            self.record(PhysicsCall::RemovePaddle(slot));
        }

        fn position_ball(&mut self, position: Vec2, velocity: Vec2) {
            self.record(PhysicsCall::PositionBall { position, velocity });
        }

        fn give_impulse_to_paddle(&mut self, slot: Slot, impulse: Vec2) {
            self.record(PhysicsCall::Impulse(slot, impulse));
        }

        fn step(&mut self, elapsed_secs: f32, accuracy: u32) {
            self.record(PhysicsCall::Step {
                elapsed_secs,
                accuracy,
            });
        }

        fn on_ball_scored(&mut self, callback: BallScoredCallback) {
            self.shared.lock().scored = Some(callback);
        }

        fn ball_and_paddle_positions(&self) -> ObjectPositions {
            ObjectPositions {
                ball: self.field.center(),
                paddles: Vec::new(),
            }
        }
    }
}
