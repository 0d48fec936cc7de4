//! Session task: serializes every operation and drives the tick timer

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::events::{SessionEvent, Subscriber, SubscriptionId};
use super::physics::{ObjectPositions, PhysicsPort};
use super::session::{JoinRequest, Player, SessionConfig, SessionError, SessionManager, SessionSnapshot};

/// Capacity of the operation queue
const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Operation queued for the session task
pub enum SessionCommand {
    Join {
        request: JoinRequest,
        reply: oneshot::Sender<Result<Player, SessionError>>,
    },
    Quit {
        id: String,
        reply: oneshot::Sender<Result<Player, SessionError>>,
    },
    PlayerCommand {
        id: String,
        command: String,
        data: Option<String>,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    ParametersAndState {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Positions {
        reply: oneshot::Sender<ObjectPositions>,
    },
    Subscribe {
        subscriber: Subscriber,
        reply: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: oneshot::Sender<bool>,
    },
}

/// Cloneable front door to a running session
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn join_player(&self, request: JoinRequest) -> Result<Player, SessionError> {
        self.request(|reply| SessionCommand::Join { request, reply })
            .await?
    }

    pub async fn quit_player(&self, id: impl Into<String>) -> Result<Player, SessionError> {
        let id = id.into();
        self.request(|reply| SessionCommand::Quit { id, reply }).await?
    }

    pub async fn handle_player_command(
        &self,
        id: impl Into<String>,
        command: impl Into<String>,
        data: Option<String>,
    ) -> Result<(), SessionError> {
        let (id, command) = (id.into(), command.into());
        self.request(|reply| SessionCommand::PlayerCommand {
            id,
            command,
            data,
            reply,
        })
        .await?
    }

    pub async fn parameters_and_state(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::ParametersAndState { reply })
            .await
    }

    pub async fn ball_and_paddle_positions(&self) -> Result<ObjectPositions, SessionError> {
        self.request(|reply| SessionCommand::Positions { reply }).await
    }

    /// Register a synchronous subscriber, run on the session task
    pub async fn subscribe(&self, subscriber: Subscriber) -> Result<SubscriptionId, SessionError> {
        self.request(|reply| SessionCommand::Subscribe { subscriber, reply })
            .await
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::Unsubscribe { id, reply })
            .await
    }

    /// Subscribe and receive events on a channel, in publish order
    pub async fn events(&self) -> Result<mpsc::UnboundedReceiver<SessionEvent>, SessionError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(Box::new(move |event: &SessionEvent| {
            let _ = tx.send(event.clone());
        }))
        .await?;
        Ok(rx)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| SessionError::ServiceStopped)?;
        reply_rx.await.map_err(|_| SessionError::ServiceStopped)
    }
}

/// The session task. Sole owner of the [`SessionManager`].
pub struct SessionService<P: PhysicsPort> {
    manager: SessionManager<P>,
    command_rx: mpsc::Receiver<SessionCommand>,
}

impl<P: PhysicsPort + 'static> SessionService<P> {
    pub fn new(physics: P, config: SessionConfig) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let service = Self {
            manager: SessionManager::new(physics, config),
            command_rx,
        };
        (service, SessionHandle { command_tx })
    }

    /// Spawn the task on the current runtime
    pub fn spawn(physics: P, config: SessionConfig) -> (tokio::task::JoinHandle<()>, SessionHandle) {
        let (service, handle) = Self::new(physics, config);
        (tokio::spawn(service.run()), handle)
    }

    /// Process operations, score notifications and scheduled steps one at a
    /// time until every handle is dropped.
    pub async fn run(mut self) {
        let session_id = self.manager.id();
        info!(session_id = %session_id, "Session service started");

        loop {
            let next_step_at = self.manager.next_step_at();

            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.dispatch(command),
                    None => break,
                },
                Some(conceded) = self.manager.next_conceded() => {
                    self.manager.ball_scored(conceded);
                }
                _ = sleep_until(next_step_at.unwrap_or_else(Instant::now)), if next_step_at.is_some() => {
                    self.manager.run_scheduled_step();
                }
            }
        }

        info!(session_id = %session_id, "All handles dropped, session service stopping");
    }

    fn dispatch(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Join { request, reply } => {
                let result = self.manager.join_player(request);
                if let Err(e) = &result {
                    debug!(error = %e, "Join rejected");
                }
                let _ = reply.send(result);
            }
            SessionCommand::Quit { id, reply } => {
                let _ = reply.send(self.manager.quit_player(&id));
            }
            SessionCommand::PlayerCommand {
                id,
                command,
                data,
                reply,
            } => {
                let result = self
                    .manager
                    .handle_player_command(&id, &command, data.as_deref());
                if let Err(e) = &result {
                    warn!(player_id = %id, command = %command, error = %e, "Player command rejected");
                }
                let _ = reply.send(result);
            }
            SessionCommand::ParametersAndState { reply } => {
                let _ = reply.send(self.manager.parameters_and_state());
            }
            SessionCommand::Positions { reply } => {
                let _ = reply.send(self.manager.ball_and_paddle_positions());
            }
            SessionCommand::Subscribe { subscriber, reply } => {
                let _ = reply.send(self.manager.subscribe(subscriber));
            }
            SessionCommand::Unsubscribe { id, reply } => {
                let _ = reply.send(self.manager.unsubscribe(id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::physics::mock::RecordingPhysics;
    use super::super::physics::Vec2;
    use super::*;
    use crate::util::time::tick_interval;

    async fn spawn_session() -> (SessionHandle, RecordingPhysics, mpsc::UnboundedReceiver<SessionEvent>) {
        let physics = RecordingPhysics::new();
        let config = SessionConfig {
            seed: Some(42),
            ..SessionConfig::default()
        };
        let (_task, handle) = SessionService::spawn(physics.clone(), config);
        let events = handle.events().await.unwrap();
        (handle, physics, events)
    }

    async fn start_match(handle: &SessionHandle) {
        handle.join_player(JoinRequest::new("p1")).await.unwrap();
        handle.join_player(JoinRequest::new("p2")).await.unwrap();
        handle.handle_player_command("p1", "READY", None).await.unwrap();
        handle.handle_player_command("p2", "READY", None).await.unwrap();
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(event) = events.try_recv() {
            names.push(event.name());
        }
        names
    }

    #[tokio::test(start_paused = true)]
    async fn operations_round_trip_through_the_task() {
        let (handle, _physics, mut events) = spawn_session().await;

        let player = handle.join_player(JoinRequest::new("p1")).await.unwrap();
        assert!(!player.ready);

        let err = handle.join_player(JoinRequest::new("p1")).await.unwrap_err();
        assert_eq!(err, SessionError::DuplicatePlayer("p1".to_string()));

        let err = handle
            .handle_player_command("p1", "JUMP", None)
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::UnknownCommand("JUMP".to_string()));

        let snapshot = handle.parameters_and_state().await.unwrap();
        assert_eq!(snapshot.players, vec![player]);
        assert!(!snapshot.match_started);

        assert_eq!(drain(&mut events), vec!["PLAYER_JOINED"]);
    }

    #[tokio::test(start_paused = true)]
    async fn steps_run_at_the_frame_rate_while_the_match_is_on() {
        let (handle, physics, _events) = spawn_session().await;
        start_match(&handle).await;

        tokio::time::sleep(Duration::from_millis(200)).await;

        let steps = physics.steps();
        assert!(steps.len() >= 10, "only {} steps", steps.len());
        assert_eq!(steps[0], 0.0);
        let nominal = tick_interval().as_secs_f32();
        for elapsed in &steps[1..] {
            assert!((elapsed - nominal).abs() < 1e-3, "step of {elapsed}s");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn steps_cease_after_a_quit() {
        let (handle, physics, mut events) = spawn_session().await;
        start_match(&handle).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        handle.quit_player("p1").await.unwrap();
        let at_quit = physics.steps().len();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(physics.steps().len(), at_quit);
        assert!(drain(&mut events).ends_with(&["MATCH_STOPPED", "PLAYER_QUIT"]));

        let placements = physics.ball_placements();
        assert_eq!(placements.last(), Some(&(Vec2::new(10.0, 10.0), Vec2::ZERO)));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_idle_begins_with_a_near_zero_step() {
        let (handle, physics, _events) = spawn_session().await;
        start_match(&handle).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.quit_player("p2").await.unwrap();

        tokio::time::sleep(Duration::from_secs(3600)).await;
        let before_restart = physics.steps().len();

        handle.join_player(JoinRequest::new("p2")).await.unwrap();
        handle.handle_player_command("p2", "READY", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let steps = physics.steps();
        assert!(steps.len() > before_restart);
        assert!(steps[before_restart] < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn physics_score_notifications_reach_subscribers() {
        let (handle, physics, mut events) = spawn_session().await;
        start_match(&handle).await;
        let p1 = handle
            .parameters_and_state()
            .await
            .unwrap()
            .players
            .into_iter()
            .find(|p| p.id == "p1")
            .unwrap();
        drain(&mut events);

        physics.concede(p1.slot.opposite());

        let event = events.recv().await.unwrap();
        match event {
            SessionEvent::PlayerScoreChanged { scores } => {
                let pairs: Vec<_> = scores.iter().map(|s| (s.id.as_str(), s.score)).collect();
                assert_eq!(pairs, vec![("p1", 1), ("p2", 0)]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribed_listener_stops_receiving() {
        let (handle, _physics, _events) = spawn_session().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = handle
            .subscribe(Box::new(move |event: &SessionEvent| {
                let _ = tx.send(event.name());
            }))
            .await
            .unwrap();

        handle.join_player(JoinRequest::new("p1")).await.unwrap();
        assert!(handle.unsubscribe(id).await.unwrap());
        handle.quit_player("p1").await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), "PLAYER_JOINED");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn handle_reports_stopped_service() {
        let physics = RecordingPhysics::new();
        let (service, handle) = SessionService::new(physics, SessionConfig::default());
        drop(service);

        let err = handle.join_player(JoinRequest::new("p1")).await.unwrap_err();
        assert_eq!(err, SessionError::ServiceStopped);
    }
}
