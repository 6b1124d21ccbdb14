//! Simulation module
//!
//! All gameplay logic lives here:
//! - Fixed timestep only, shared by live stepping and the aim preview
//! - Seeded RNG only
//! - Stable iteration order (by body and record id)
//! - No rendering or platform dependencies beyond CPU-side instance buffers

pub mod aim;
pub mod anim;
pub mod objects;
pub mod populate;
pub mod projectile;
pub mod shapes;
pub mod stage;
pub mod state;
pub mod tick;
pub mod world;

pub use aim::{AimController, AimOutcome, AimState, PointerEvent, PointerHit, PointerPhase};
pub use anim::{AnimationFrame, AnimationId, Animator, Easing};
pub use objects::{DefeatCause, ObjectLifecycle, ObjectPhase, ScoreEvent, StageObjectRecord};
pub use projectile::{Projectile, ProjectilePool};
pub use shapes::{FurnitureTemplate, ObjectKind, ShapePart};
pub use stage::{GroundDef, ObjectPlacement, StageDefinition, StageSettings, builtin_stages};
pub use state::{GameEvent, GamePhase, GameState, PlayTransition};
pub use tick::{FrameInput, Game, MenuAction};
pub use world::{
    BodyDesc, BodyId, BodyShape, BodyState, BodyTag, ContactEvent, ContactFilter, PhysicsBackend,
    PhysicsWorld,
};
