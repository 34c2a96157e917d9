//! Game entities: cars, the ball and the arena with its goal volumes

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::world::RigidBody;

/// Teams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Red, Team::Blue];

    /// Body color used by clients when painting a car
    pub fn color(self) -> &'static str {
        match self {
            Team::Red => "#e8341c",
            Team::Blue => "#1c6be8",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Team::Red => f.write_str("red"),
            Team::Blue => f.write_str("blue"),
        }
    }
}

// ============================================================================
// Car
// ============================================================================

/// Car body constants
pub const CAR_MASS: f32 = 150.0;
pub const CAR_RADIUS: f32 = 2.5;
/// Spawn height above the arena origin plane
pub const CAR_SPAWN_HEIGHT: f32 = 10.0;
/// Cars spawn uniformly inside `[-CAR_SPAWN_HALF_EXTENT, CAR_SPAWN_HALF_EXTENT)` on x and z
pub const CAR_SPAWN_HALF_EXTENT: f32 = 10.0;

/// Drivetrain tuning applied every tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrivetrainStats {
    /// Fraction of sideways velocity removed per tick while grounded
    pub lateral_grip: f32,
    /// Yaw rate multiplier per tick
    pub yaw_damping: f32,
    /// Horizontal top speed
    pub max_speed: f32,
}

impl Default for DrivetrainStats {
    fn default() -> Self {
        Self {
            lateral_grip: 0.15,
            yaw_damping: 0.9,
            max_speed: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Car {
    pub player_id: Uuid,
    pub team: Team,
    pub drivetrain: DrivetrainStats,
}

impl Car {
    pub fn new(player_id: Uuid, team: Team) -> Self {
        Self {
            player_id,
            team,
            drivetrain: DrivetrainStats::default(),
        }
    }

    pub fn body(position: Vec3) -> RigidBody {
        RigidBody::dynamic(position, CAR_MASS, CAR_RADIUS)
    }

    /// Apply drivetrain behavior derived from the current motion: tires
    /// bleed off sideways slip, the yaw rate settles, and horizontal speed is
    /// capped.
    pub fn adjust_movement(&self, body: &mut RigidBody, grounded: bool) {
        let stats = &self.drivetrain;
        let k = &mut body.kinematics;

        let forward = heading(k.orientation);
        let horizontal = Vec3::new(k.velocity.x, 0.0, k.velocity.z);

        if grounded {
            let along = forward * horizontal.dot(forward);
            let lateral = horizontal - along;
            let corrected = horizontal - lateral * stats.lateral_grip;
            k.velocity.x = corrected.x;
            k.velocity.z = corrected.z;
        }

        k.angular_velocity.y *= stats.yaw_damping;

        let horizontal = Vec3::new(k.velocity.x, 0.0, k.velocity.z);
        let speed = horizontal.length();
        if speed > stats.max_speed {
            let scale = stats.max_speed / speed;
            k.velocity.x *= scale;
            k.velocity.z *= scale;
        }
    }
}

/// Unit forward vector of an orientation, projected on the ground plane
pub fn heading(orientation: glam::Quat) -> Vec3 {
    let f = orientation * Vec3::X;
    let flat = Vec3::new(f.x, 0.0, f.z);
    if flat.length_squared() < 1e-6 {
        Vec3::X
    } else {
        flat.normalize()
    }
}

// ============================================================================
// Ball
// ============================================================================

pub const BALL_MASS: f32 = 20.0;
pub const BALL_RADIUS: f32 = 2.0;
/// Where the ball first appears
pub const BALL_INITIAL_POSITION: Vec3 = Vec3::new(20.0, 10.0, 0.0);
/// Where the ball returns after a goal
pub const BALL_RESET_POSITION: Vec3 = Vec3::new(0.0, 10.0, 0.0);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ball {
    /// Number of explosion cues shown so far
    pub explosions: u32,
}

impl Ball {
    pub fn body(position: Vec3) -> RigidBody {
        RigidBody::dynamic(position, BALL_MASS, BALL_RADIUS)
    }

    pub fn show_explosion(&mut self) {
        self.explosions += 1;
    }
}

// ============================================================================
// Arena
// ============================================================================

/// Height of the arena origin; the playing surface sits `ARENA_FLOOR_OFFSET` above it
pub const ARENA_ORIGIN_Y: f32 = -15.4;
pub const ARENA_FLOOR_OFFSET: f32 = 15.4;

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }
}

/// The two goals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    /// Net at negative x; scoring here credits red
    One,
    /// Net at positive x; scoring here credits blue
    Two,
}

impl Goal {
    pub fn scoring_team(self) -> Team {
        match self {
            Goal::One => Team::Red,
            Goal::Two => Team::Blue,
        }
    }
}

/// Static arena geometry, in coordinates relative to the arena origin
#[derive(Debug, Clone, PartialEq)]
pub struct Arena {
    /// Half length of the field along x (goal line)
    pub half_length: f32,
    /// Half width of the field along z (side walls)
    pub half_width: f32,
    pub floor_offset: f32,
    goal_one: Aabb,
    goal_two: Aabb,
}

impl Default for Arena {
    fn default() -> Self {
        let half_length = 55.0;
        let depth = 11.0;
        let mouth_half_width = 10.0;
        let mouth_height = 8.0;
        let floor = ARENA_FLOOR_OFFSET;

        Self {
            half_length,
            half_width: 40.0,
            floor_offset: floor,
            goal_one: Aabb::new(
                Vec3::new(-(half_length + depth), floor, -mouth_half_width),
                Vec3::new(-(half_length + 1.0), floor + mouth_height, mouth_half_width),
            ),
            goal_two: Aabb::new(
                Vec3::new(half_length + 1.0, floor, -mouth_half_width),
                Vec3::new(half_length + depth, floor + mouth_height, mouth_half_width),
            ),
        }
    }
}

impl Arena {
    /// Default field with custom goal volumes (arena-relative)
    pub fn with_goals(goal_one: Aabb, goal_two: Aabb) -> Self {
        Self {
            goal_one,
            goal_two,
            ..Self::default()
        }
    }

    pub fn body() -> RigidBody {
        RigidBody::fixed(Vec3::new(0.0, ARENA_ORIGIN_Y, 0.0))
    }

    /// Goal volume in world coordinates for an arena placed at `origin`
    pub fn goal_volume(&self, goal: Goal, origin: Vec3) -> Aabb {
        match goal {
            Goal::One => self.goal_one.translated(origin),
            Goal::Two => self.goal_two.translated(origin),
        }
    }

    pub fn is_in_goal(&self, goal: Goal, origin: Vec3, point: Vec3) -> bool {
        self.goal_volume(goal, origin).contains(point)
    }

    /// World height of the playing surface
    pub fn floor_height(&self, origin: Vec3) -> f32 {
        origin.y + self.floor_offset
    }

    /// Goal mouth opening (z half width and height above the floor)
    pub fn mouth(&self) -> (f32, f32) {
        let g = &self.goal_one;
        (g.max.z, g.max.y - self.floor_offset)
    }

    /// Distance from the arena origin to the back of either net
    pub fn net_depth(&self) -> f32 {
        self.goal_two.max.x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn origin() -> Vec3 {
        Vec3::new(0.0, ARENA_ORIGIN_Y, 0.0)
    }

    #[test]
    fn goal_volumes_are_disjoint_and_behind_goal_lines() {
        let arena = Arena::default();
        let one = arena.goal_volume(Goal::One, origin());
        let two = arena.goal_volume(Goal::Two, origin());
        assert!(one.max.x < -arena.half_length);
        assert!(two.min.x > arena.half_length);
        assert!(one.max.x < two.min.x);
    }

    #[test]
    fn goal_containment_uses_world_coordinates() {
        let arena = Arena::default();
        let floor = arena.floor_height(origin());
        assert!(floor.abs() < 1e-4);

        let in_net = Vec3::new(-60.0, floor + 2.0, 0.0);
        assert!(arena.is_in_goal(Goal::One, origin(), in_net));
        assert!(!arena.is_in_goal(Goal::Two, origin(), in_net));
        assert!(!arena.is_in_goal(Goal::One, origin(), BALL_RESET_POSITION));
        assert!(!arena.is_in_goal(Goal::Two, origin(), BALL_INITIAL_POSITION));
    }

    #[test]
    fn goals_credit_opposite_teams() {
        assert_eq!(Goal::One.scoring_team(), Team::Red);
        assert_eq!(Goal::Two.scoring_team(), Team::Blue);
    }

    #[test]
    fn grip_removes_lateral_slip_only_when_grounded() {
        let car = Car::new(Uuid::new_v4(), Team::Red);
        let mut body = Car::body(Vec3::ZERO);
        body.kinematics.velocity = Vec3::new(10.0, 0.0, 10.0);

        let mut airborne = body.clone();
        car.adjust_movement(&mut airborne, false);
        assert_eq!(airborne.kinematics.velocity.z, 10.0);

        car.adjust_movement(&mut body, true);
        assert_eq!(body.kinematics.velocity.x, 10.0);
        assert!(body.kinematics.velocity.z < 10.0);
    }

    #[test]
    fn top_speed_is_capped() {
        let car = Car::new(Uuid::new_v4(), Team::Blue);
        let mut body = Car::body(Vec3::ZERO);
        body.kinematics.velocity = Vec3::new(500.0, -3.0, 0.0);
        car.adjust_movement(&mut body, true);
        let v = body.kinematics.velocity;
        assert!((Vec3::new(v.x, 0.0, v.z).length() - car.drivetrain.max_speed).abs() < 1e-3);
        assert_eq!(v.y, -3.0);
    }

    #[test]
    fn heading_follows_yaw() {
        let q = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let h = heading(q);
        assert!((h - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }
}
