//! State payload published once per tick

use serde::{Deserialize, Serialize};

/// Simulated state at one instant.
///
/// Plain `Copy` value: every field is derived from the engine's scalar
/// state at capture time and never changes afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    pub rpm: f32,
    /// Shaft angle in `[0, 2π)`
    pub angle_rad: f32,
    pub stress_pa: f32,
    /// `stress_pa / stress_max_pa`, clamped to `[0, 1]`
    pub stress_factor: f32,
    pub piston_force_n: f32,
    pub rod_force_n: f32,
    pub tangential_force_n: f32,
    pub torque_nm: f32,
    pub side_thrust_n: f32,
    /// Monotonic, Unix-anchored milliseconds
    pub timestamp_ms: u64,
}

impl StatePayload {
    /// Number of `f32` fields, used by the snapshot cell layout
    pub(crate) const SCALARS: usize = 9;

    pub(crate) fn scalars(&self) -> [f32; Self::SCALARS] {
        [
            self.rpm,
            self.angle_rad,
            self.stress_pa,
            self.stress_factor,
            self.piston_force_n,
            self.rod_force_n,
            self.tangential_force_n,
            self.torque_nm,
            self.side_thrust_n,
        ]
    }

    pub(crate) fn from_scalars(s: [f32; Self::SCALARS], timestamp_ms: u64) -> Self {
        Self {
            rpm: s[0],
            angle_rad: s[1],
            stress_pa: s[2],
            stress_factor: s[3],
            piston_force_n: s[4],
            rod_force_n: s[5],
            tangential_force_n: s[6],
            torque_nm: s[7],
            side_thrust_n: s[8],
            timestamp_ms,
        }
    }
}
