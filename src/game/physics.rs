//! Stepped rigid-body integration for world objects

use glam::{Quat, Vec3};

use super::world::{GameObject, RigidBody, World};

/// Slack when deciding whether a body touches the floor
const GROUND_TOLERANCE: f32 = 0.05;

/// Integration constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsConfig {
    pub gravity: f32,
    /// Fraction of linear velocity lost per second
    pub linear_damping: f32,
    /// Fraction of angular velocity lost per second
    pub angular_damping: f32,
    pub floor_restitution: f32,
    pub wall_restitution: f32,
    pub contact_restitution: f32,
    /// Vertical speeds below this settle to rest on the floor
    pub rest_speed: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: -20.0,
            linear_damping: 0.1,
            angular_damping: 0.3,
            floor_restitution: 0.3,
            wall_restitution: 0.6,
            contact_restitution: 0.5,
            rest_speed: 0.5,
        }
    }
}

/// Arena limits resolved into world coordinates for one step
#[derive(Debug, Clone, Copy)]
struct Bounds {
    floor: f32,
    half_length: f32,
    half_width: f32,
    net_depth: f32,
    mouth_half_width: f32,
    mouth_height: f32,
}

/// Physics system. Holds no per-step state, so the same inputs always give
/// the same outputs.
#[derive(Debug, Clone, Default)]
pub struct PhysicsSystem {
    pub config: PhysicsConfig,
}

impl PhysicsSystem {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    /// Height of the playing surface. Without an arena the world plane is y = 0.
    pub fn floor_height(world: &World) -> f32 {
        world
            .arena()
            .map(|(origin, arena)| arena.floor_height(origin))
            .unwrap_or(0.0)
    }

    /// Whether a body rests on (or touches) a floor at height `floor`
    pub fn is_grounded(floor: f32, body: &RigidBody) -> bool {
        body.kinematics.position.y - body.radius <= floor + GROUND_TOLERANCE
    }

    /// Advance every dynamic body by `dt` seconds, resolve contacts, then
    /// refresh each object's synchronized state from its body.
    pub fn step(&self, world: &mut World, dt: f32) {
        let bounds = world.arena().map(|(origin, arena)| {
            let (mouth_half_width, mouth_height) = arena.mouth();
            Bounds {
                floor: arena.floor_height(origin),
                half_length: arena.half_length,
                half_width: arena.half_width,
                net_depth: arena.net_depth(),
                mouth_half_width,
                mouth_height,
            }
        });
        let floor = bounds.map(|b| b.floor).unwrap_or(0.0);

        for object in world.objects_mut() {
            if object.body.is_static {
                continue;
            }
            self.integrate(object, dt, floor, bounds.as_ref());
        }

        self.resolve_contacts(world);

        for object in world.objects_mut() {
            object.refresh_from_physics();
        }
    }

    fn integrate(&self, object: &mut GameObject, dt: f32, floor: f32, bounds: Option<&Bounds>) {
        let c = &self.config;
        let r = object.body.radius;
        let k = &mut object.body.kinematics;
        let previous = k.position;

        k.velocity.y += c.gravity * dt;
        k.velocity *= (1.0 - c.linear_damping).powf(dt);
        k.angular_velocity *= (1.0 - c.angular_damping).powf(dt);
        k.position += k.velocity * dt;

        let spin = k.angular_velocity * dt;
        if spin.length_squared() > 0.0 {
            k.orientation = (Quat::from_scaled_axis(spin) * k.orientation).normalize();
        }

        if k.position.y - r < floor {
            k.position.y = floor + r;
            if k.velocity.y < 0.0 {
                k.velocity.y = -k.velocity.y * c.floor_restitution;
                if k.velocity.y < c.rest_speed {
                    k.velocity.y = 0.0;
                }
            }
        }

        let Some(b) = bounds else {
            return;
        };

        let goal_line = b.half_length - r;
        let mouth_fits = |p: Vec3| {
            p.z.abs() <= b.mouth_half_width - r && p.y - b.floor <= b.mouth_height - r
        };
        let was_in_net = previous.x.abs() > goal_line;

        if k.position.x.abs() > goal_line && (was_in_net || mouth_fits(k.position)) {
            // Inside a net: the net's back, sides and roof bound the body.
            let back = b.net_depth - r;
            clamp_axis(&mut k.position.x, &mut k.velocity.x, back, c.wall_restitution);
            clamp_axis(
                &mut k.position.z,
                &mut k.velocity.z,
                b.mouth_half_width - r,
                c.wall_restitution,
            );
            let roof = b.floor + b.mouth_height - r;
            if k.position.y > roof {
                k.position.y = roof;
                k.velocity.y = k.velocity.y.min(0.0);
            }
        } else {
            clamp_axis(&mut k.position.x, &mut k.velocity.x, goal_line, c.wall_restitution);
        }

        clamp_axis(
            &mut k.position.z,
            &mut k.velocity.z,
            b.half_width - r,
            c.wall_restitution,
        );
    }

    /// Sphere-sphere contacts between dynamic bodies
    fn resolve_contacts(&self, world: &mut World) {
        let mut bodies: Vec<&mut GameObject> =
            world.objects_mut().filter(|o| !o.body.is_static).collect();

        for i in 0..bodies.len() {
            let (head, tail) = bodies.split_at_mut(i + 1);
            let a = &mut head[i];
            for b in tail.iter_mut() {
                self.resolve_pair(a, b);
            }
        }
    }

    fn resolve_pair(&self, a: &mut GameObject, b: &mut GameObject) {
        let delta = b.body.kinematics.position - a.body.kinematics.position;
        let dist = delta.length();
        let reach = a.body.radius + b.body.radius;
        if dist >= reach {
            return;
        }

        let normal = if dist < 1e-4 { Vec3::X } else { delta / dist };
        let inv_a = inverse_mass(a.body.mass);
        let inv_b = inverse_mass(b.body.mass);
        let inv_sum = inv_a + inv_b;
        if inv_sum == 0.0 {
            return;
        }

        let overlap = reach - dist;
        a.body.kinematics.position -= normal * overlap * (inv_a / inv_sum);
        b.body.kinematics.position += normal * overlap * (inv_b / inv_sum);

        let closing = (b.body.kinematics.velocity - a.body.kinematics.velocity).dot(normal);
        if closing < 0.0 {
            let impulse = -(1.0 + self.config.contact_restitution) * closing / inv_sum;
            a.body.kinematics.velocity -= normal * impulse * inv_a;
            b.body.kinematics.velocity += normal * impulse * inv_b;
        }
    }
}

fn inverse_mass(mass: f32) -> f32 {
    if mass > 0.0 {
        1.0 / mass
    } else {
        0.0
    }
}

/// Keep `pos` within `[-limit, limit]`, bouncing the velocity off the wall
fn clamp_axis(pos: &mut f32, vel: &mut f32, limit: f32, restitution: f32) {
    if *pos > limit {
        *pos = limit;
        if *vel > 0.0 {
            *vel = -*vel * restitution;
        }
    } else if *pos < -limit {
        *pos = -limit;
        if *vel < 0.0 {
            *vel = -*vel * restitution;
        }
    }
}
