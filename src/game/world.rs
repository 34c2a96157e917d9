//! World container: object identity, lifecycle and queries

use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entities::{Arena, Ball, Car, Team};

/// Identity of a live world object. Ids are never reused within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinematic state shared by the synchronized view and the physics body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub orientation: Quat,
}

impl Kinematics {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }
}

/// Physics representation of an object
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub kinematics: Kinematics,
    pub mass: f32,
    /// Contact radius (every dynamic body collides as a sphere)
    pub radius: f32,
    /// Static bodies are never integrated
    pub is_static: bool,
}

impl RigidBody {
    pub fn dynamic(position: Vec3, mass: f32, radius: f32) -> Self {
        Self {
            kinematics: Kinematics::at(position),
            mass,
            radius,
            is_static: false,
        }
    }

    pub fn fixed(position: Vec3) -> Self {
        Self {
            kinematics: Kinematics::at(position),
            mass: 0.0,
            radius: 0.0,
            is_static: true,
        }
    }
}

/// Object kind. Filtering goes through the variant, never through type identity.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Car(Car),
    Ball(Ball),
    Arena(Arena),
}

impl ObjectKind {
    pub fn label(&self) -> ObjectLabel {
        match self {
            ObjectKind::Car(car) => ObjectLabel::Car { team: car.team },
            ObjectKind::Ball(_) => ObjectLabel::Ball,
            ObjectKind::Arena(_) => ObjectLabel::Arena,
        }
    }
}

/// Wire-level description of an object kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectLabel {
    Car { team: Team },
    Ball,
    Arena,
}

/// A live object in the world
#[derive(Debug, Clone, PartialEq)]
pub struct GameObject {
    pub id: ObjectId,
    pub owner: Option<Uuid>,
    /// Synchronized state. Read by goal checks and snapshots.
    pub state: Kinematics,
    pub body: RigidBody,
    pub kind: ObjectKind,
}

impl GameObject {
    /// Copy the physics body into the synchronized state
    pub fn refresh_from_physics(&mut self) {
        self.state = self.body.kinematics;
    }

    /// Push the synchronized state into the physics body
    pub fn refresh_to_physics(&mut self) {
        self.body.kinematics = self.state;
    }

    /// Whether the object accepts drivetrain control
    pub fn is_drivable(&self) -> bool {
        matches!(self.kind, ObjectKind::Car(_))
    }

    pub fn as_ball_mut(&mut self) -> Option<&mut Ball> {
        match &mut self.kind {
            ObjectKind::Ball(ball) => Some(ball),
            _ => None,
        }
    }

    pub fn as_arena(&self) -> Option<&Arena> {
        match &self.kind {
            ObjectKind::Arena(arena) => Some(arena),
            _ => None,
        }
    }

    pub fn is_owned_by(&self, player_id: Uuid) -> bool {
        self.owner == Some(player_id)
    }
}

/// Container of live objects.
///
/// Objects are kept in id order so every pass over the world visits them in
/// the same sequence, which keeps replayed ticks identical.
#[derive(Debug, Clone, Default)]
pub struct World {
    objects: BTreeMap<ObjectId, GameObject>,
    next_id: u32,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object and return its id. The synchronized state starts as a
    /// copy of the body.
    pub fn add_object(&mut self, owner: Option<Uuid>, body: RigidBody, kind: ObjectKind) -> ObjectId {
        self.next_id += 1;
        let id = ObjectId(self.next_id);
        let object = GameObject {
            id,
            owner,
            state: body.kinematics,
            body,
            kind,
        };
        self.objects.insert(id, object);
        id
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Option<GameObject> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// First object (in id order) matching the predicate
    pub fn query_object<P>(&self, predicate: P) -> Option<&GameObject>
    where
        P: Fn(&GameObject) -> bool,
    {
        self.objects.values().find(|o| predicate(o))
    }

    /// The car owned by a player, if any
    pub fn find_car(&self, player_id: Uuid) -> Option<&GameObject> {
        self.query_object(|o| o.is_drivable() && o.is_owned_by(player_id))
    }

    pub fn find_car_mut(&mut self, player_id: Uuid) -> Option<&mut GameObject> {
        self.objects
            .values_mut()
            .find(|o| o.is_drivable() && o.is_owned_by(player_id))
    }

    pub fn objects(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.values()
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut GameObject> {
        self.objects.values_mut()
    }

    /// Every drivable object, in id order
    pub fn drivables_mut(&mut self) -> impl Iterator<Item = &mut GameObject> {
        self.objects.values_mut().filter(|o| o.is_drivable())
    }

    /// Static arena bounds, if an arena has been added
    pub fn arena(&self) -> Option<(Vec3, &Arena)> {
        self.objects
            .values()
            .find_map(|o| o.as_arena().map(|a| (o.state.position, a)))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Ball, Car, Team};

    fn car_body() -> RigidBody {
        RigidBody::dynamic(Vec3::new(0.0, 10.0, 0.0), 10.0, 2.5)
    }

    #[test]
    fn ids_increase_and_are_not_reused() {
        let mut world = World::new();
        let a = world.add_object(None, car_body(), ObjectKind::Ball(Ball::default()));
        world.remove_object(a);
        let b = world.add_object(None, car_body(), ObjectKind::Ball(Ball::default()));
        assert!(b > a);
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn find_car_matches_owner_and_kind() {
        let mut world = World::new();
        let player = Uuid::new_v4();
        world.add_object(Some(player), car_body(), ObjectKind::Ball(Ball::default()));
        assert!(world.find_car(player).is_none());

        let id = world.add_object(Some(player), car_body(), ObjectKind::Car(Car::new(player, Team::Red)));
        assert_eq!(world.find_car(player).map(|o| o.id), Some(id));
        assert!(world.find_car(Uuid::new_v4()).is_none());
    }

    #[test]
    fn refresh_copies_between_state_and_body() {
        let mut world = World::new();
        let id = world.add_object(None, car_body(), ObjectKind::Ball(Ball::default()));
        let object = world.get_mut(id).unwrap();

        object.body.kinematics.velocity = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(object.state.velocity, Vec3::ZERO);
        object.refresh_from_physics();
        assert_eq!(object.state.velocity, Vec3::new(1.0, 2.0, 3.0));

        object.state.position = Vec3::ZERO;
        object.refresh_to_physics();
        assert_eq!(object.body.kinematics.position, Vec3::ZERO);
    }

    #[test]
    fn drivable_filter_only_yields_cars() {
        let mut world = World::new();
        let player = Uuid::new_v4();
        world.add_object(None, car_body(), ObjectKind::Ball(Ball::default()));
        world.add_object(Some(player), car_body(), ObjectKind::Car(Car::new(player, Team::Blue)));
        assert_eq!(world.drivables_mut().count(), 1);
    }
}
