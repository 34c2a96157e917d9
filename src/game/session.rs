//! Game session and authoritative tick loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::interval;
use tracing::{debug, info, trace};

use crate::util::time::{tick_delta, tick_duration, unix_millis, PacingMonitor};
use crate::ws::protocol::{ClientMsg, GameEvent, ServerMsg};

use super::engine::{EngineConfig, GameEngine};
use super::metadata::MetaData;
use super::snapshot::SnapshotBuilder;
use super::PlayerInput;

/// Session construction parameters
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick_rate: u32,
    /// Ticks between snapshots
    pub snapshot_interval: u32,
    pub seed: u64,
}

/// Latest session state, readable without touching the tick loop
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStatus {
    pub tick: u64,
    pub car_count: usize,
    pub ball_in_play: bool,
    pub measured_tick_rate: Option<f32>,
    pub meta: MetaData,
}

/// Handle to the running session
#[derive(Clone)]
pub struct SessionHandle {
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub update_tx: broadcast::Sender<ServerMsg>,
    status: Arc<RwLock<SessionStatus>>,
    player_count: Arc<AtomicUsize>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.update_tx.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// The authoritative game session. Owns the engine; runs in its own task.
pub struct GameSession {
    engine: GameEngine,
    tick: u64,
    tick_rate: u32,
    input_rx: mpsc::Receiver<PlayerInput>,
    update_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    pending_events: Vec<GameEvent>,
    pacing: PacingMonitor,
    measured_tick_rate: Option<f32>,
    status: Arc<RwLock<SessionStatus>>,
    player_count: Arc<AtomicUsize>,
}

impl GameSession {
    /// Create a session with an initialized arena
    pub fn new(config: SessionConfig) -> (Self, SessionHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (update_tx, _) = broadcast::channel(128);
        let status = Arc::new(RwLock::new(SessionStatus::default()));
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = SessionHandle {
            input_tx,
            update_tx: update_tx.clone(),
            status: status.clone(),
            player_count: player_count.clone(),
        };

        let mut engine = GameEngine::new(EngineConfig {
            seed: config.seed,
            ..Default::default()
        });
        engine.game_init();
        // Arena creation is part of the initial state, not news for anyone.
        engine.drain_events();

        let session = Self {
            engine,
            tick: 0,
            tick_rate: config.tick_rate,
            input_rx,
            update_tx,
            snapshot_builder: SnapshotBuilder::new(config.snapshot_interval),
            pending_events: Vec::new(),
            pacing: PacingMonitor::new(config.tick_rate, Instant::now()),
            measured_tick_rate: None,
            status,
            player_count,
        };
        session.publish_status();

        (session, handle)
    }

    /// Run the authoritative tick loop until every input sender is gone
    pub async fn run(mut self) {
        info!(tick_rate = self.tick_rate, "Session started");

        let mut tick_interval = interval(tick_duration(self.tick_rate));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            if !self.process_inputs() {
                break;
            }

            self.run_tick(Instant::now());
        }

        info!(tick = self.tick, "Session stopped");
    }

    /// Drain pending player messages. Returns false once the channel is closed.
    fn process_inputs(&mut self) -> bool {
        loop {
            match self.input_rx.try_recv() {
                Ok(input) => self.handle_input(input),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn handle_input(&mut self, input: PlayerInput) {
        let player_id = input.player_id;
        match input.msg {
            ClientMsg::JoinGame { team } => {
                let team = team.unwrap_or_else(|| self.engine.assign_team());
                self.engine.make_car(player_id, team);
            }
            ClientMsg::Input { seq, input: token } => {
                if self.engine.world().find_car(player_id).is_none() {
                    let team = self.engine.assign_team();
                    self.engine.make_car(player_id, team);
                }
                trace!(player_id = %player_id, seq, ?token, "input");
                self.engine.process_input(player_id, token);
            }
            ClientMsg::Ping { t } => {
                let _ = self.update_tx.send(ServerMsg::Pong { player_id, t });
            }
            ClientMsg::LeaveGame => {
                self.engine.remove_car(player_id);
            }
        }

        self.player_count
            .store(self.engine.car_count(), Ordering::Relaxed);
        self.flush_events();
    }

    /// Run a single simulation tick
    fn run_tick(&mut self, now: Instant) {
        self.tick += 1;
        self.engine
            .step(false, unix_millis(), tick_delta(self.tick_rate), false);
        self.flush_events();

        if let Some(report) = self.pacing.record_tick(now) {
            self.measured_tick_rate = Some(report.measured_tick_rate);
            let _ = self.update_tx.send(ServerMsg::Telemetry {
                tick: self.tick,
                target_tick_rate: self.tick_rate,
                measured_tick_rate: report.measured_tick_rate,
                degraded: report.degraded,
            });
        }

        if self.snapshot_builder.should_send() {
            let events = std::mem::take(&mut self.pending_events);
            let snapshot = self.snapshot_builder.build(self.tick, &self.engine, events);
            let _ = self.update_tx.send(snapshot);
        }

        self.publish_status();
    }

    /// Forward engine events. Lifecycle events go out immediately; the rest
    /// ride along with the next snapshot. Metadata is resent once per flush
    /// when scores or rosters changed.
    fn flush_events(&mut self) {
        let mut meta_changed = false;

        for event in self.engine.drain_events() {
            match event {
                GameEvent::ObjectAdded { object } => {
                    let _ = self.update_tx.send(ServerMsg::ObjectAdded { object });
                }
                GameEvent::ObjectRemoved { id, owner } => {
                    let _ = self.update_tx.send(ServerMsg::ObjectRemoved { id, owner });
                }
                GameEvent::ScoreChange => {
                    meta_changed = true;
                    self.snapshot_builder.force_next();
                    self.pending_events.push(GameEvent::ScoreChange);
                }
                GameEvent::RosterChange => {
                    meta_changed = true;
                    self.pending_events.push(GameEvent::RosterChange);
                }
                other => self.pending_events.push(other),
            }
        }

        if meta_changed {
            debug!(tick = self.tick, "Metadata changed");
            let _ = self.update_tx.send(ServerMsg::MetaData {
                meta: self.engine.meta().clone(),
            });
            self.publish_status();
        }
    }

    fn publish_status(&self) {
        let mut status = self.status.write();
        status.tick = self.tick;
        status.car_count = self.engine.car_count();
        status.ball_in_play = self.engine.ball_id().is_some();
        status.measured_tick_rate = self.measured_tick_rate;
        status.meta = self.engine.meta().clone();
    }
}
