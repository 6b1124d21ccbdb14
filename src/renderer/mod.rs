//! CPU-side render state
//!
//! Instance and line buffers laid out for direct upload; the GPU side lives
//! with whatever renderer consumes them.

pub mod instances;
pub mod trajectory;
pub mod vertex;

pub use instances::{Aabb, InstanceKind, InstanceMirror, InstanceRaw, InstanceTransform, Rotation};
pub use trajectory::TrajectoryLine;
pub use vertex::LineVertex;
