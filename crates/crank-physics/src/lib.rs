//! Crank-Slider Physics Engine
//!
//! Simulates a single-cylinder rotating crank at a fixed time step and
//! publishes each tick's [`StatePayload`] to other threads without locks.
//!
//! ```text
//! control (any thread) ──► EngineHandle::set_rpm_target ──┐
//!                                                         ▼
//! sim thread ──► PhysicsEngine::step ──► history (RingBuffer)
//!                                    └─► SnapshotCell ──► readers
//! ```

pub mod constants;
mod engine;
mod handle;
pub mod kinematics;
mod payload;
mod snapshot;

pub use engine::{smoothing_alpha, stress_max_pa, PhysicsEngine};
pub use handle::{EngineHandle, ReplayMode, ReplayRequest};
pub use payload::StatePayload;
pub use snapshot::SnapshotCell;

/// History store type owned by the engine
pub type History = ring_buffer::RingBuffer<StatePayload>;
