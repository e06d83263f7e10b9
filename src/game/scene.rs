//! Arena geometry - collision layers, ray queries, physics props

use uuid::Uuid;

use crate::util::time::tick_delta;
use crate::ws::protocol::Vec3;

/// Character hitbox radius (capsule approximated as a sphere)
pub const CHARACTER_RADIUS: f32 = 0.5;

/// Velocity retained by a moving prop each tick
const PROP_DRAG: f32 = 0.92;

/// Named collision layers. Shot traces run on their own layer so damage
/// resolution stays independent of movement collision tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionLayer {
    Movement,
    ShotTrace,
}

impl CollisionLayer {
    fn bit(self) -> u8 {
        match self {
            CollisionLayer::Movement => 1 << 0,
            CollisionLayer::ShotTrace => 1 << 1,
        }
    }
}

/// Set of collision layers an entity participates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerMask(u8);

impl LayerMask {
    pub const EMPTY: LayerMask = LayerMask(0);

    pub fn of(layers: &[CollisionLayer]) -> Self {
        LayerMask(layers.iter().fold(0, |mask, layer| mask | layer.bit()))
    }

    pub fn contains(self, layer: CollisionLayer) -> bool {
        self.0 & layer.bit() != 0
    }
}

/// Where respawned characters and joining players are placed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub position: Vec3,
    pub yaw: f32,
}

/// A movable physics body (crate, barrel) that shots can push around
#[derive(Debug, Clone)]
pub struct PhysicsProp {
    pub id: Uuid,
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
    pub mass: f32,
    pub layers: LayerMask,
    /// Only simulated bodies react to impulses
    pub simulated: bool,
}

impl PhysicsProp {
    pub fn new(position: Vec3, radius: f32, mass: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            velocity: Vec3::ZERO,
            radius,
            mass,
            layers: LayerMask::of(&[CollisionLayer::Movement, CollisionLayer::ShotTrace]),
            simulated: true,
        }
    }

    /// Apply an instantaneous impulse at full strength
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if !self.simulated || self.mass <= 0.0 {
            return;
        }
        self.velocity = self.velocity.add(impulse.scale(1.0 / self.mass));
    }

    /// Advance one simulation tick: move, drag, never sink below the floor
    pub fn integrate(&mut self) {
        let dt = tick_delta();
        self.position = self.position.add(self.velocity.scale(dt));
        self.velocity = self.velocity.scale(PROP_DRAG);
        if self.position.z < self.radius {
            self.position.z = self.radius;
            self.velocity.z = 0.0;
        }
    }
}

/// Static axis-aligned geometry (walls, cover)
#[derive(Debug, Clone)]
pub struct Block {
    pub min: Vec3,
    pub max: Vec3,
    pub layers: LayerMask,
}

impl Block {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min,
            max,
            layers: LayerMask::of(&[CollisionLayer::Movement, CollisionLayer::ShotTrace]),
        }
    }
}

/// A surface struck by a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Distance along the ray
    pub t: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

/// Nearest intersection of a ray with a sphere, if within range.
/// `direction` must be unit length. Origins inside the sphere miss.
pub fn ray_sphere(
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    center: Vec3,
    radius: f32,
) -> Option<SurfaceHit> {
    let to_center = center.sub(origin);
    let projection = to_center.dot(direction);
    if projection < 0.0 {
        return None;
    }

    let closest_sq = to_center.dot(to_center) - projection * projection;
    let radius_sq = radius * radius;
    if closest_sq > radius_sq {
        return None;
    }

    let t = projection - (radius_sq - closest_sq).sqrt();
    if t < 0.0 || t > max_distance {
        return None;
    }

    let point = origin.add(direction.scale(t));
    let normal = point.sub(center).normalized()?;
    Some(SurfaceHit { t, point, normal })
}

/// Nearest intersection of a ray with an axis-aligned box, if within
/// range. `direction` must be unit length. Origins inside the box miss.
pub fn ray_block(
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    min: Vec3,
    max: Vec3,
) -> Option<SurfaceHit> {
    let mut t_enter = 0.0f32;
    let mut t_exit = max_distance;
    let mut entry_axis = 0;
    let mut entry_sign = 0.0f32;

    let origins = [origin.x, origin.y, origin.z];
    let dirs = [direction.x, direction.y, direction.z];
    let mins = [min.x, min.y, min.z];
    let maxs = [max.x, max.y, max.z];

    for axis in 0..3 {
        if dirs[axis].abs() < f32::EPSILON {
            if origins[axis] < mins[axis] || origins[axis] > maxs[axis] {
                return None;
            }
            continue;
        }

        let inv = 1.0 / dirs[axis];
        let mut t0 = (mins[axis] - origins[axis]) * inv;
        let mut t1 = (maxs[axis] - origins[axis]) * inv;
        let mut sign = -1.0;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
            sign = 1.0;
        }

        if t0 > t_enter {
            t_enter = t0;
            entry_axis = axis;
            entry_sign = sign;
        }
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    // t_enter stayed at zero: the origin is inside the box
    if t_enter <= 0.0 || entry_sign == 0.0 {
        return None;
    }

    let mut normal = Vec3::ZERO;
    match entry_axis {
        0 => normal.x = entry_sign,
        1 => normal.y = entry_sign,
        _ => normal.z = entry_sign,
    }

    let point = origin.add(direction.scale(t_enter));
    Some(SurfaceHit {
        t: t_enter,
        point,
        normal,
    })
}

/// Static and movable geometry of one arena
#[derive(Debug, Clone)]
pub struct ArenaScene {
    pub props: Vec<PhysicsProp>,
    pub blocks: Vec<Block>,
    pub spawn_points: Vec<SpawnPoint>,
}

impl ArenaScene {
    /// The default arena: a walled square room with a few crates
    pub fn default_layout() -> Self {
        let wall = |min, max| Block::new(min, max);
        Self {
            blocks: vec![
                wall(Vec3::new(-20.0, -21.0, 0.0), Vec3::new(20.0, -20.0, 4.0)),
                wall(Vec3::new(-20.0, 20.0, 0.0), Vec3::new(20.0, 21.0, 4.0)),
                wall(Vec3::new(-21.0, -20.0, 0.0), Vec3::new(-20.0, 20.0, 4.0)),
                wall(Vec3::new(20.0, -20.0, 0.0), Vec3::new(21.0, 20.0, 4.0)),
                // Center cover
                wall(Vec3::new(-1.0, -4.0, 0.0), Vec3::new(1.0, 4.0, 1.5)),
            ],
            props: vec![
                PhysicsProp::new(Vec3::new(5.0, 5.0, 0.4), 0.4, 10.0),
                PhysicsProp::new(Vec3::new(-5.0, 5.0, 0.4), 0.4, 10.0),
                PhysicsProp::new(Vec3::new(0.0, -8.0, 0.4), 0.4, 10.0),
            ],
            spawn_points: vec![
                SpawnPoint {
                    position: Vec3::new(-15.0, -15.0, 0.9),
                    yaw: 0.8,
                },
                SpawnPoint {
                    position: Vec3::new(15.0, -15.0, 0.9),
                    yaw: 2.4,
                },
                SpawnPoint {
                    position: Vec3::new(15.0, 15.0, 0.9),
                    yaw: 3.9,
                },
                SpawnPoint {
                    position: Vec3::new(-15.0, 15.0, 0.9),
                    yaw: 5.5,
                },
            ],
        }
    }

    /// An empty scene for tests and custom layouts
    pub fn empty() -> Self {
        Self {
            props: Vec::new(),
            blocks: Vec::new(),
            spawn_points: Vec::new(),
        }
    }

    /// Advance all simulated props one tick
    pub fn integrate_props(&mut self) {
        for prop in &mut self.props {
            if prop.simulated {
                prop.integrate();
            }
        }
    }
}
