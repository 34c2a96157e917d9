//! HUD view model
//!
//! Folds the server message stream into the state a client draws: which
//! camera is live, team colors per car, the scoreboard and latency figures.
//! Nothing here feeds back into the simulation.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::game::entities::Team;
use crate::game::metadata::MetaData;
use crate::game::world::{ObjectId, ObjectLabel};
use crate::util::time::unix_millis;
use crate::ws::protocol::{ObjectSnapshot, ServerMsg};

/// Shown once when the server cannot keep its tick rate
pub const SLOW_TICK_MESSAGE: &str =
    "Server tick rate appears to be low. Expect corrections and rubber-banding.";

/// RTT samples kept for the running mean
const LATENCY_WINDOW: usize = 20;

/// Active camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    #[default]
    Spectator,
    /// Chase camera bound to the local car
    Chase { target: ObjectId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scoreboard {
    pub red: u32,
    pub blue: u32,
}

/// A car as the HUD knows it
#[derive(Debug, Clone, PartialEq)]
pub struct CarView {
    pub id: ObjectId,
    pub player_id: Option<Uuid>,
    pub team: Team,
    pub color: &'static str,
}

/// Ping/pong round trips with a running mean over the last few samples
#[derive(Debug, Clone, Default)]
pub struct LatencyTracker {
    samples: VecDeque<u64>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a round trip; returns the latest and the mean
    pub fn record(&mut self, rtt_ms: u64) -> (u64, f64) {
        if self.samples.len() == LATENCY_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(rtt_ms);
        (rtt_ms, self.average().unwrap_or(rtt_ms as f64))
    }

    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().sum();
        Some(sum as f64 / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Client display state
#[derive(Debug, Clone, Default)]
pub struct HudModel {
    local_player: Option<Uuid>,
    camera: CameraMode,
    game_active: bool,
    cars: BTreeMap<ObjectId, CarView>,
    scoreboard: Scoreboard,
    latency: Option<u64>,
    average_latency: Option<f64>,
    tracker: LatencyTracker,
    slowness_reported: bool,
}

impl HudModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model for a client that already knows its player id
    pub fn for_player(player_id: Uuid) -> Self {
        Self {
            local_player: Some(player_id),
            ..Self::default()
        }
    }

    /// Dispatch one server message
    pub fn apply(&mut self, msg: &ServerMsg) {
        match msg {
            ServerMsg::Welcome { player_id, .. } => {
                self.local_player = Some(*player_id);
            }
            ServerMsg::ObjectAdded { object } => self.on_object_added(object),
            ServerMsg::ObjectRemoved { id, .. } => self.on_object_removed(*id),
            ServerMsg::Snapshot { objects, .. } => {
                // Late joiners learn about existing cars from snapshots
                for object in objects {
                    if !self.cars.contains_key(&object.id) {
                        self.track_car(object);
                    }
                }
            }
            ServerMsg::MetaData { meta } => self.on_metadata_update(meta),
            ServerMsg::Telemetry { degraded, .. } => self.on_telemetry(*degraded),
            ServerMsg::Pong { player_id, t } => {
                if Some(*player_id) == self.local_player {
                    let (rtt, average) = self.tracker.record(unix_millis().saturating_sub(*t));
                    self.update_latency(rtt, average);
                }
            }
            ServerMsg::Error { code, message } => {
                warn!(code = %code, message = %message, "Server error");
            }
        }
    }

    /// Switch to the chase camera when the local car appears
    pub fn on_object_added(&mut self, object: &ObjectSnapshot) {
        self.track_car(object);

        let Some(local) = self.local_player else {
            return;
        };
        if object.owner == Some(local) && matches!(object.label, ObjectLabel::Car { .. }) {
            debug!(car_id = %object.id, "Binding chase camera");
            self.camera = CameraMode::Chase { target: object.id };
            self.game_active = true;
        }
    }

    pub fn on_object_removed(&mut self, id: ObjectId) {
        self.cars.remove(&id);
        if self.camera == (CameraMode::Chase { target: id }) {
            self.camera = CameraMode::Spectator;
            self.game_active = false;
        }
    }

    /// Repaint rostered cars and refresh the scoreboard
    pub fn on_metadata_update(&mut self, meta: &MetaData) {
        for team in Team::ALL {
            for player_id in &meta.team(team).players {
                if let Some(car) = self
                    .cars
                    .values_mut()
                    .find(|c| c.player_id == Some(*player_id))
                {
                    car.team = team;
                    car.color = team.color();
                }
            }
        }

        self.scoreboard = Scoreboard {
            red: meta.score(Team::Red),
            blue: meta.score(Team::Blue),
        };
    }

    /// Latest and average RTT in milliseconds. The average is kept to two decimals.
    pub fn update_latency(&mut self, rtt: u64, rtt_average: f64) {
        self.latency = Some(rtt);
        self.average_latency = Some(truncate_decimals(rtt_average, 2));
    }

    /// Raise the slowness advisory when the server reports a degraded window
    pub fn on_telemetry(&mut self, degraded: bool) {
        if degraded {
            self.report_slowness();
        }
    }

    /// Raise the slowness advisory. Returns true only the first time.
    pub fn report_slowness(&mut self) -> bool {
        if self.slowness_reported {
            return false;
        }
        self.slowness_reported = true;
        warn!("{}", SLOW_TICK_MESSAGE);
        true
    }

    fn track_car(&mut self, object: &ObjectSnapshot) {
        if let ObjectLabel::Car { team } = object.label {
            self.cars.insert(
                object.id,
                CarView {
                    id: object.id,
                    player_id: object.owner,
                    team,
                    color: team.color(),
                },
            );
        }
    }

    pub fn camera(&self) -> CameraMode {
        self.camera
    }

    /// True once the local car exists; the join control is hidden meanwhile
    pub fn game_active(&self) -> bool {
        self.game_active
    }

    pub fn join_enabled(&self) -> bool {
        !self.game_active
    }

    pub fn scoreboard(&self) -> Scoreboard {
        self.scoreboard
    }

    pub fn car(&self, id: ObjectId) -> Option<&CarView> {
        self.cars.get(&id)
    }

    pub fn latency(&self) -> Option<u64> {
        self.latency
    }

    pub fn average_latency(&self) -> Option<f64> {
        self.average_latency
    }

    pub fn slowness_reported(&self) -> bool {
        self.slowness_reported
    }
}

/// Truncate toward zero to `digits` decimal places
pub fn truncate_decimals(value: f64, digits: u32) -> f64 {
    let multiplier = 10f64.powi(digits as i32);
    (value * multiplier).trunc() / multiplier
}
