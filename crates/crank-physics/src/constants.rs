//! Mechanical and timing constants

/// Rotating assembly mass (kg)
pub const MASS_KG: f32 = 2.5;
/// Rotating assembly radius (m)
pub const RADIUS_M: f32 = 0.08;
/// Stressed cross-section (m²)
pub const AREA_M2: f32 = 0.0004;

/// Crank throw (m), 40 mm throw gives an 80 mm stroke
pub const CRANK_THROW_M: f32 = 0.04;
/// Connecting rod length (m)
pub const CON_ROD_LENGTH_M: f32 = 0.128;
/// Piston plus wrist pin mass (kg)
pub const PISTON_MASS_KG: f32 = 0.4;
/// Crank throw to rod length ratio
pub const LAMBDA: f32 = CRANK_THROW_M / CON_ROD_LENGTH_M;

/// Throttle response time constant (s)
pub const TAU_S: f32 = 0.35;
pub const RPM_MIN: f32 = 0.0;
pub const RPM_MAX: f32 = 8000.0;
pub const DEFAULT_RPM_TARGET: f32 = 1200.0;

/// Fixed simulation step (s), 100 Hz
pub const DT_S: f32 = 0.01;
/// History length in ticks (10 s at 100 Hz)
pub const HISTORY_CAPACITY: usize = 1000;

/// Below this `cos φ` the rod and side-thrust forces are reported as zero
pub const ROD_ANGLE_EPSILON: f32 = 1e-4;

pub const TWO_PI: f32 = std::f32::consts::TAU;
