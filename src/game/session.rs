//! Session state: roster, ready-up protocol, tick scheduling and scores

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{elapsed_secs, tick_interval, SIMULATION_ACCURACY};

use super::events::{EventBus, SessionEvent, Subscriber, SubscriptionId};
use super::physics::{FieldSize, ObjectPositions, PaddleSize, PhysicsPort, Vec2};
use super::slot::{Slot, SlotPool};

/// Players per session
pub const MAX_PLAYERS: usize = 2;
/// Lower bound for the serve speed, keeps both velocity components non-zero
const MIN_SERVE_SPEED: f32 = 1.0;

/// Errors surfaced to the caller of a session operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Player with id {0} has already joined")]
    DuplicatePlayer(String),

    #[error("Maximum players limit has been reached")]
    SessionFull,

    #[error("Unknown player {0}")]
    UnknownPlayer(String),

    #[error("Unknown command {0}")]
    UnknownCommand(String),

    #[error("Session service is not running")]
    ServiceStopped,
}

/// Join payload supplied by the transport layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub id: Option<String>,
}

impl JoinRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }
}

/// A joined participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub slot: Slot,
    pub ready: bool,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub id: String,
    pub score: u32,
}

/// Read-only view returned by `parameters_and_state`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub field: FieldSize,
    pub players: Vec<Player>,
    pub match_started: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddleDirection {
    Up,
    Down,
}

impl PaddleDirection {
    /// Vertical impulse of the given magnitude. y grows downward, so UP is negative.
    pub fn impulse(self, magnitude: f32) -> Vec2 {
        match self {
            PaddleDirection::Up => Vec2::new(0.0, -magnitude),
            PaddleDirection::Down => Vec2::new(0.0, magnitude),
        }
    }
}

/// Commands a joined player may issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Ready,
    MovePaddle(PaddleDirection),
}

impl PlayerCommand {
    pub fn parse(command: &str, data: Option<&str>) -> Result<Self, SessionError> {
        match command {
            "READY" => Ok(PlayerCommand::Ready),
            "MOVE_PADDLE" => match data {
                Some("UP") => Ok(PlayerCommand::MovePaddle(PaddleDirection::Up)),
                Some("DOWN") => Ok(PlayerCommand::MovePaddle(PaddleDirection::Down)),
                other => Err(SessionError::InvalidArgument(format!(
                    "MOVE_PADDLE expects UP or DOWN, got {:?}",
                    other
                ))),
            },
            other => Err(SessionError::UnknownCommand(other.to_string())),
        }
    }
}

/// Tunables for one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub paddle_size: PaddleSize,
    /// Magnitude of the vertical impulse applied by MOVE_PADDLE
    pub paddle_impulse: f32,
    /// Upper bound of each serve velocity component
    pub ball_speed: f32,
    /// Seed for the serve RNG, random when absent
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            paddle_size: PaddleSize {
                width: 0.2,
                height: 2.0,
            },
            paddle_impulse: 2.0,
            ball_speed: 6.0,
            seed: None,
        }
    }
}

/// Simulation tick chain state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickState {
    /// No step scheduled
    Idle,
    /// A step is pending. Stop is detected when it fires.
    Running { next_step_at: Instant },
}

/// Owns the single session: roster, slot pool, match state and tick chain
pub struct SessionManager<P: PhysicsPort> {
    id: Uuid,
    physics: P,
    config: SessionConfig,
    players: Vec<Player>,
    slots: SlotPool,
    match_started: bool,
    last_tick_at: Option<Instant>,
    tick_state: TickState,
    matches_started: u64,
    events: EventBus,
    rng: ChaCha8Rng,
    scored_rx: mpsc::UnboundedReceiver<Slot>,
}

impl<P: PhysicsPort> SessionManager<P> {
    /// Create the session and hook it to the physics scored callback
    pub fn new(mut physics: P, config: SessionConfig) -> Self {
        let (scored_tx, scored_rx) = mpsc::unbounded_channel();
        physics.on_ball_scored(Box::new(move |conceded: Slot| {
            let _ = scored_tx.send(conceded);
        }));

        let seed = config.seed.unwrap_or_else(rand::random);
        let id = Uuid::new_v4();
        info!(session_id = %id, seed, "Session created");

        Self {
            id,
            physics,
            config,
            players: Vec::with_capacity(MAX_PLAYERS),
            slots: SlotPool::full(),
            match_started: false,
            last_tick_at: None,
            tick_state: TickState::Idle,
            matches_started: 0,
            events: EventBus::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            scored_rx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Join a player and give them a paddle
    pub fn join_player(&mut self, request: JoinRequest) -> Result<Player, SessionError> {
        let id = match request.id {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(SessionError::InvalidArgument(
                    "join request must carry a non-empty id".to_string(),
                ))
            }
        };

        if self.player(&id).is_some() {
            return Err(SessionError::DuplicatePlayer(id));
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(SessionError::SessionFull);
        }
        let Some(slot) = self.slots.take() else {
            warn!(session_id = %self.id, "Roster has room but no slot is vacant");
            return Err(SessionError::SessionFull);
        };

        let player = Player {
            id,
            slot,
            ready: false,
            score: 0,
        };

        self.physics.add_paddle(slot, self.config.paddle_size);
        self.players.push(player.clone());

        info!(
            session_id = %self.id,
            player_id = %player.id,
            slot = %slot,
            player_count = self.players.len(),
            "Player joined session"
        );

        self.events.publish(&SessionEvent::PlayerJoined(player.clone()));
        Ok(player)
    }

    /// Remove a player, stopping the match if one is running
    pub fn quit_player(&mut self, id: &str) -> Result<Player, SessionError> {
        let index = self.index_of(id)?;

        if self.match_started {
            self.stop_match();
        }

        let slot = self.players[index].slot;
        if !self.slots.release(slot) {
            warn!(session_id = %self.id, slot = %slot, "Released slot was already vacant");
        }

        // Ball rests in the center until the next serve
        let center = self.physics.field_size().center();
        self.physics.position_ball(center, Vec2::ZERO);
        self.physics.remove_paddle(slot);

        self.events.publish(&SessionEvent::PlayerQuit { id: id.to_string() });
        let player = self.players.remove(index);

        info!(
            session_id = %self.id,
            player_id = %player.id,
            slot = %slot,
            player_count = self.players.len(),
            "Player left session"
        );

        Ok(player)
    }

    pub fn handle_player_command(
        &mut self,
        id: &str,
        command: &str,
        data: Option<&str>,
    ) -> Result<(), SessionError> {
        let index = self.index_of(id)?;

        match PlayerCommand::parse(command, data)? {
            PlayerCommand::Ready => self.mark_ready(index),
            PlayerCommand::MovePaddle(direction) => {
                let slot = self.players[index].slot;
                let impulse = direction.impulse(self.config.paddle_impulse);
                self.physics.give_impulse_to_paddle(slot, impulse);
            }
        }

        Ok(())
    }

    fn mark_ready(&mut self, index: usize) {
        let player = &mut self.players[index];
        if player.ready {
            debug!(session_id = %self.id, player_id = %player.id, "Player already ready");
            return;
        }

        player.ready = true;
        let id = player.id.clone();
        info!(session_id = %self.id, player_id = %id, "Player ready");
        self.events.publish(&SessionEvent::PlayerReady { id });

        if !self.match_started && self.ready_count() == self.slots.capacity() {
            self.start_match();
        }
    }

    fn start_match(&mut self) {
        self.match_started = true;
        self.matches_started += 1;
        info!(session_id = %self.id, match_number = self.matches_started, "Match started");

        self.events.publish(&SessionEvent::MatchStarted);

        let center = self.physics.field_size().center();
        let velocity = self.serve_velocity();
        self.physics.position_ball(center, velocity);

        // Fresh baseline: the first step must not catch up on idle time
        let now = Instant::now();
        self.last_tick_at = Some(now);
        match self.tick_state {
            TickState::Idle => {
                self.tick_state = TickState::Running { next_step_at: now };
            }
            TickState::Running { .. } => {
                debug!(session_id = %self.id, "Pending step from previous match continues the chain");
            }
        }
    }

    fn stop_match(&mut self) {
        self.events.publish(&SessionEvent::MatchStopped);
        self.match_started = false;
        self.last_tick_at = None;
        info!(session_id = %self.id, match_number = self.matches_started, "Match stopped");
    }

    /// Random serve velocity, non-zero on both axes
    fn serve_velocity(&mut self) -> Vec2 {
        let speed = self.config.ball_speed.abs().max(MIN_SERVE_SPEED);
        let vx = self.rng.gen_range(0.5 * speed..=speed);
        let vy = self.rng.gen_range(0.25 * speed..=0.75 * speed);
        let sign_x = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let sign_y = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        Vec2::new(sign_x * vx, sign_y * vy)
    }

    /// When the next simulation step is due, if a chain is running
    pub fn next_step_at(&self) -> Option<Instant> {
        match self.tick_state {
            TickState::Idle => None,
            TickState::Running { next_step_at } => Some(next_step_at),
        }
    }

    /// Run the pending simulation step.
    ///
    /// Ends the chain when the match has stopped since the step was scheduled.
    /// Otherwise advances physics by the real time since the previous step and
    /// schedules the next one a fixed interval from now.
    pub fn run_scheduled_step(&mut self) {
        if self.tick_state == TickState::Idle {
            return;
        }

        if !self.match_started {
            self.last_tick_at = None;
            self.tick_state = TickState::Idle;
            debug!(session_id = %self.id, "Tick chain ended");
            return;
        }

        let now = Instant::now();
        let elapsed = self
            .last_tick_at
            .map(|last| elapsed_secs(last, now))
            .unwrap_or(0.0);
        self.last_tick_at = Some(now);

        self.physics.step(elapsed, SIMULATION_ACCURACY);

        self.tick_state = TickState::Running {
            next_step_at: Instant::now() + tick_interval(),
        };

        self.apply_pending_scores();
    }

    /// Credit the side opposite to the conceding slot and broadcast all scores
    pub fn ball_scored(&mut self, conceded: Slot) {
        let scorer = conceded.opposite();
        let mut credited = 0;
        for player in self.players.iter_mut().filter(|p| p.slot == scorer) {
            player.score = player.score.saturating_add(1);
            credited += 1;
        }

        debug!(
            session_id = %self.id,
            conceded = %conceded,
            credited,
            "Ball scored"
        );

        let scores = self
            .players
            .iter()
            .map(|p| ScoreEntry {
                id: p.id.clone(),
                score: p.score,
            })
            .collect();
        self.events
            .publish(&SessionEvent::PlayerScoreChanged { scores });
    }

    /// Apply every score notification the physics has queued so far
    pub fn apply_pending_scores(&mut self) {
        while let Ok(conceded) = self.scored_rx.try_recv() {
            self.ball_scored(conceded);
        }
    }

    /// Wait for the next score notification from physics
    pub async fn next_conceded(&mut self) -> Option<Slot> {
        self.scored_rx.recv().await
    }

    pub fn parameters_and_state(&self) -> SessionSnapshot {
        SessionSnapshot {
            field: self.physics.field_size(),
            players: self.players.clone(),
            match_started: self.match_started,
        }
    }

    pub fn ball_and_paddle_positions(&self) -> ObjectPositions {
        self.physics.ball_and_paddle_positions()
    }

    pub fn subscribe(&mut self, subscriber: Subscriber) -> SubscriptionId {
        self.events.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn is_match_started(&self) -> bool {
        self.match_started
    }

    #[cfg(test)]
    pub(crate) fn tick_state(&self) -> TickState {
        self.tick_state
    }

    #[cfg(test)]
    pub(crate) fn last_tick_at(&self) -> Option<Instant> {
        self.last_tick_at
    }

    #[cfg(test)]
    pub(crate) fn is_slot_vacant(&self, slot: Slot) -> bool {
        self.slots.is_vacant(slot)
    }

    fn ready_count(&self) -> usize {
        self.players.iter().filter(|p| p.ready).count()
    }

    fn index_of(&self, id: &str) -> Result<usize, SessionError> {
        self.players
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| SessionError::UnknownPlayer(id.to_string()))
    }
}
