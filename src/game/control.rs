//! Mapping of discrete input tokens onto car forces

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::entities::heading;
use super::world::GameObject;

/// Discrete control token sent by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputToken {
    Up,
    Down,
    Left,
    Right,
}

/// Impulse sizes applied per received input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlTuning {
    /// Velocity change along the heading per `up`
    pub acceleration: f32,
    /// `down` pushes backwards at this fraction of `acceleration`
    pub reverse_factor: f32,
    /// Yaw rate change per `left`/`right` (radians per second)
    pub turn_rate: f32,
    /// Yaw rate magnitude cap
    pub max_yaw_rate: f32,
}

impl Default for ControlTuning {
    fn default() -> Self {
        Self {
            acceleration: 1.2,
            reverse_factor: 0.6,
            turn_rate: 0.35,
            max_yaw_rate: 3.0,
        }
    }
}

/// Car control mapper. Stateless apart from its tuning.
#[derive(Debug, Clone, Default)]
pub struct CarControl {
    pub tuning: ControlTuning,
}

impl CarControl {
    pub fn new(tuning: ControlTuning) -> Self {
        Self { tuning }
    }

    /// Route one token to the matching mapping. Non-drivable objects are left alone.
    pub fn apply(&self, car: &mut GameObject, input: InputToken) {
        if !car.is_drivable() {
            return;
        }
        match input {
            InputToken::Up | InputToken::Down => self.accelerate(car, input),
            InputToken::Left | InputToken::Right => self.turn(car, input),
        }
    }

    /// Forward (`up`) or reverse (`down`) impulse along the car heading
    pub fn accelerate(&self, car: &mut GameObject, input: InputToken) {
        let k = &mut car.body.kinematics;
        let forward = heading(k.orientation);
        let amount = match input {
            InputToken::Up => self.tuning.acceleration,
            InputToken::Down => -self.tuning.acceleration * self.tuning.reverse_factor,
            _ => return,
        };
        k.velocity += forward * amount;
    }

    /// Steering torque around the vertical axis. Positive yaw turns left.
    pub fn turn(&self, car: &mut GameObject, input: InputToken) {
        let k = &mut car.body.kinematics;
        let amount = match input {
            InputToken::Left => self.tuning.turn_rate,
            InputToken::Right => -self.tuning.turn_rate,
            _ => return,
        };
        let yaw = (k.angular_velocity.y + amount)
            .clamp(-self.tuning.max_yaw_rate, self.tuning.max_yaw_rate);
        k.angular_velocity = Vec3::new(k.angular_velocity.x, yaw, k.angular_velocity.z);
    }
}
