//! Arcade physics for a rectangular paddle field
//!
//! Kinematic stand-in for a rigid-body engine: a ball bouncing between floor and
//! ceiling, two paddles sliding on rails next to their walls, and goal detection
//! on the left and right walls.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::physics::{
    BallScoredCallback, FieldSize, ObjectPositions, PaddlePosition, PaddleSize, PhysicsPort, Vec2,
};
use super::slot::Slot;

/// Distance between a paddle's center and its wall
pub const PADDLE_WALL_DISTANCE: f32 = 0.2;
/// Paddle density, used to derive mass from its area
pub const PADDLE_DENSITY: f32 = 5.0;
/// Fraction of paddle speed lost per second (rail friction)
pub const PADDLE_DAMPING: f32 = 4.0;
pub const DEFAULT_BALL_RADIUS: f32 = 0.2;

#[derive(Debug, Clone)]
struct Ball {
    position: Vec2,
    velocity: Vec2,
    radius: f32,
}

/// One paddle body. Built fresh for every `add_paddle` call.
#[derive(Debug, Clone)]
struct PaddleBody {
    slot: Slot,
    x: f32,
    y: f32,
    vel_y: f32,
    size: PaddleSize,
    mass: f32,
}

impl PaddleBody {
    fn new(slot: Slot, size: PaddleSize, field: FieldSize) -> Self {
        let x = match slot {
            Slot::Left => PADDLE_WALL_DISTANCE,
            Slot::Right => field.width - PADDLE_WALL_DISTANCE,
        };
        Self {
            slot,
            x,
            y: field.height / 2.0,
            vel_y: 0.0,
            size,
            mass: (PADDLE_DENSITY * size.width * size.height).max(f32::EPSILON),
        }
    }

    fn half_extents(&self) -> Vec2 {
        Vec2::new(self.size.width / 2.0, self.size.height / 2.0)
    }

    fn integrate(&mut self, dt: f32, field_height: f32) {
        self.vel_y *= (-PADDLE_DAMPING * dt).exp();
        self.y += self.vel_y * dt;

        let half_h = self.size.height / 2.0;
        let (min_y, max_y) = (half_h, (field_height - half_h).max(half_h));
        if self.y < min_y || self.y > max_y {
            self.y = self.y.clamp(min_y, max_y);
            self.vel_y = 0.0;
        }
    }
}

/// Arcade physics world implementing [`PhysicsPort`]
pub struct ArenaPhysics {
    field: FieldSize,
    ball: Ball,
    paddles: BTreeMap<Slot, PaddleBody>,
    ball_scored: Option<BallScoredCallback>,
}

impl ArenaPhysics {
    pub fn new(field: FieldSize, ball_radius: f32) -> Self {
        Self {
            field,
            ball: Ball {
                position: field.center(),
                velocity: Vec2::ZERO,
                radius: ball_radius,
            },
            paddles: BTreeMap::new(),
            ball_scored: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn ball_velocity(&self) -> Vec2 {
        self.ball.velocity
    }

    /// Advance the ball by `dt`, collecting conceding slots
    fn integrate_ball(&mut self, dt: f32, conceded: &mut Vec<Slot>) {
        let ball = &mut self.ball;
        let r = ball.radius;

        ball.position.x += ball.velocity.x * dt;
        ball.position.y += ball.velocity.y * dt;

        // Ceiling and floor
        if ball.position.y - r < 0.0 {
            ball.position.y = r;
            ball.velocity.y = ball.velocity.y.abs();
        } else if ball.position.y + r > self.field.height {
            ball.position.y = self.field.height - r;
            ball.velocity.y = -ball.velocity.y.abs();
        }

        for paddle in self.paddles.values() {
            let half = paddle.half_extents();
            if !circle_hits_box(ball.position, r, Vec2::new(paddle.x, paddle.y), half) {
                continue;
            }
            match paddle.slot {
                Slot::Left if ball.velocity.x < 0.0 => {
                    ball.velocity.x = -ball.velocity.x;
                    ball.position.x = paddle.x + half.x + r;
                }
                Slot::Right if ball.velocity.x > 0.0 => {
                    ball.velocity.x = -ball.velocity.x;
                    ball.position.x = paddle.x - half.x - r;
                }
                _ => {}
            }
        }

        // Goal lines
        if ball.position.x - r < 0.0 {
            ball.position.x = r;
            ball.velocity.x = ball.velocity.x.abs();
            conceded.push(Slot::Left);
        } else if ball.position.x + r > self.field.width {
            ball.position.x = self.field.width - r;
            ball.velocity.x = -ball.velocity.x.abs();
            conceded.push(Slot::Right);
        }
    }
}

impl PhysicsPort for ArenaPhysics {
    fn field_size(&self) -> FieldSize {
        self.field
    }

    fn add_paddle(&mut self, slot: Slot, size: PaddleSize) {
        let body = PaddleBody::new(slot, size, self.field);
        if self.paddles.insert(slot, body).is_some() {
            warn!(slot = %slot, "Replacing existing paddle");
        }
    }

    fn remove_paddle(&mut self, slot: Slot) {
        if self.paddles.remove(&slot).is_none() {
            debug!(slot = %slot, "No paddle to remove");
        }
    }

    fn position_ball(&mut self, position: Vec2, velocity: Vec2) {
        self.ball.position = position;
        self.ball.velocity = velocity;
    }

    fn give_impulse_to_paddle(&mut self, slot: Slot, impulse: Vec2) {
        // Paddles ride a vertical rail, the horizontal component is absorbed
        if let Some(paddle) = self.paddles.get_mut(&slot) {
            paddle.vel_y += impulse.y / paddle.mass;
        }
    }

    fn step(&mut self, elapsed_secs: f32, accuracy: u32) {
        if elapsed_secs <= 0.0 {
            return;
        }

        let substeps = accuracy.max(1);
        let dt = elapsed_secs / substeps as f32;
        let mut conceded = Vec::new();

        for _ in 0..substeps {
            let height = self.field.height;
            for paddle in self.paddles.values_mut() {
                paddle.integrate(dt, height);
            }
            self.integrate_ball(dt, &mut conceded);
        }

        if let Some(callback) = self.ball_scored.as_mut() {
            for slot in conceded {
                callback(slot);
            }
        }
    }

    fn on_ball_scored(&mut self, callback: BallScoredCallback) {
        self.ball_scored = Some(callback);
    }

    fn ball_and_paddle_positions(&self) -> ObjectPositions {
        ObjectPositions {
            ball: self.ball.position,
            paddles: self
                .paddles
                .values()
                .map(|p| PaddlePosition {
                    slot: p.slot,
                    position: Vec2::new(p.x, p.y),
                })
                .collect(),
        }
    }
}

/// Circle vs axis-aligned box overlap test
fn circle_hits_box(center: Vec2, radius: f32, box_center: Vec2, half: Vec2) -> bool {
    let closest_x = center.x.clamp(box_center.x - half.x, box_center.x + half.x);
    let closest_y = center.y.clamp(box_center.y - half.y, box_center.y + half.y);
    let dx = center.x - closest_x;
    let dy = center.y - closest_y;
    dx * dx + dy * dy <= radius * radius
}
