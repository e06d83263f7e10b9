//! Hit resolution - authoritative ray casting and effect selection
//!
//! Runs only inside the arena task. Clients send a ray; the authority
//! decides what was struck and which single effect applies. Observers
//! never compute damage or impulses themselves, they only draw the
//! relayed tracer.

use uuid::Uuid;

use crate::game::scene::{ray_block, ray_sphere, ArenaScene, CollisionLayer, CHARACTER_RADIUS};
use crate::ws::protocol::Vec3;

/// A character eligible to be struck by a shot
#[derive(Debug, Clone, Copy)]
pub struct CharacterTarget {
    pub id: Uuid,
    pub position: Vec3,
}

/// Parameters of one authoritative shot
#[derive(Debug, Clone, Copy)]
pub struct ShotParams {
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_distance: f32,
    pub damage: i32,
    pub impact_modifier: f32,
    pub impulse_base: f32,
}

/// What kind of entity the shot struck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    None,
    DamageableCharacter,
    PhysicsBody,
}

/// First blocking surface along the shot ray, if any
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitOutcome {
    Miss,
    Hit {
        point: Vec3,
        normal: Vec3,
        target: TargetKind,
    },
}

/// The single effect a resolved shot applies. Exactly one of damage,
/// impulse, or nothing - never a combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShotEffect {
    None,
    Damage {
        target: Uuid,
        amount: i32,
    },
    Impulse {
        prop: Uuid,
        impulse: Vec3,
        at: Vec3,
    },
}

/// A fully resolved shot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotResolution {
    pub outcome: HitOutcome,
    pub effect: ShotEffect,
    /// Far end of the trace, relayed to observers for the tracer line
    pub endpoint: Vec3,
}

enum Struck {
    Character(Uuid),
    Prop { id: Uuid, simulated: bool },
    Static,
}

/// Resolves shots against a scene on one collision layer
#[derive(Debug, Clone, Copy)]
pub struct HitResolver {
    layer: CollisionLayer,
}

impl HitResolver {
    pub fn new(layer: CollisionLayer) -> Self {
        Self { layer }
    }

    /// Cast the shot ray and pick the nearest blocking surface among
    /// characters, props, and static geometry on the resolver's layer.
    /// Returns the outcome plus the one effect to apply.
    pub fn resolve(
        &self,
        scene: &ArenaScene,
        targets: &[CharacterTarget],
        shot: &ShotParams,
    ) -> ShotResolution {
        let endpoint_of = |direction: Vec3| shot.origin.add(direction.scale(shot.max_distance));

        let direction = match shot.direction.normalized() {
            Some(direction) => direction,
            None => {
                return ShotResolution {
                    outcome: HitOutcome::Miss,
                    effect: ShotEffect::None,
                    endpoint: shot.origin,
                }
            }
        };

        let mut nearest: Option<(crate::game::scene::SurfaceHit, Struck)> = None;
        let mut consider = |surface: Option<crate::game::scene::SurfaceHit>, struck: Struck| {
            if let Some(surface) = surface {
                let closer = match &nearest {
                    Some((best, _)) => surface.t < best.t,
                    None => true,
                };
                if closer {
                    nearest = Some((surface, struck));
                }
            }
        };

        for target in targets {
            consider(
                ray_sphere(
                    shot.origin,
                    direction,
                    shot.max_distance,
                    target.position,
                    CHARACTER_RADIUS,
                ),
                Struck::Character(target.id),
            );
        }

        for prop in &scene.props {
            if !prop.layers.contains(self.layer) {
                continue;
            }
            consider(
                ray_sphere(
                    shot.origin,
                    direction,
                    shot.max_distance,
                    prop.position,
                    prop.radius,
                ),
                Struck::Prop {
                    id: prop.id,
                    simulated: prop.simulated,
                },
            );
        }

        for block in &scene.blocks {
            if !block.layers.contains(self.layer) {
                continue;
            }
            consider(
                ray_block(
                    shot.origin,
                    direction,
                    shot.max_distance,
                    block.min,
                    block.max,
                ),
                Struck::Static,
            );
        }

        let endpoint = endpoint_of(direction);
        let (surface, struck) = match nearest {
            Some(found) => found,
            None => {
                return ShotResolution {
                    outcome: HitOutcome::Miss,
                    effect: ShotEffect::None,
                    endpoint,
                }
            }
        };

        let (target_kind, effect) = match struck {
            Struck::Character(id) => (
                TargetKind::DamageableCharacter,
                ShotEffect::Damage {
                    target: id,
                    amount: shot.damage,
                },
            ),
            Struck::Prop { id, simulated } if simulated => (
                TargetKind::PhysicsBody,
                ShotEffect::Impulse {
                    prop: id,
                    impulse: surface
                        .normal
                        .scale(-shot.impulse_base * shot.impact_modifier),
                    at: surface.point,
                },
            ),
            Struck::Prop { .. } | Struck::Static => (TargetKind::None, ShotEffect::None),
        };

        ShotResolution {
            outcome: HitOutcome::Hit {
                point: surface.point,
                normal: surface.normal,
                target: target_kind,
            },
            effect,
            endpoint,
        }
    }
}
