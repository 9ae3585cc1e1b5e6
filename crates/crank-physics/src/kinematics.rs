//! Closed-form crank-slider relations
//!
//! Inertial forces only, no gas pressure. Piston acceleration uses the
//! usual second-order approximation:
//!
//! ```text
//! a = -R·ω²·(cos θ + λ·cos 2θ)
//! ```

use crate::constants::{
    AREA_M2, CRANK_THROW_M, LAMBDA, MASS_KG, PISTON_MASS_KG, RADIUS_M, ROD_ANGLE_EPSILON, TWO_PI,
};

/// Forces acting on the linkage at one crank angle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CrankForces {
    /// Piston inertial force along the bore (N)
    pub piston_force_n: f32,
    /// Force along the connecting rod (N)
    pub rod_force_n: f32,
    /// Force at the crank pin perpendicular to the crank arm (N)
    pub tangential_force_n: f32,
    /// Instantaneous shaft torque (N·m)
    pub torque_nm: f32,
    /// Piston side thrust on the cylinder wall (N)
    pub side_thrust_n: f32,
}

/// Shaft speed in rad/s for a given rpm
pub fn angular_velocity(rpm: f32) -> f32 {
    rpm * TWO_PI / 60.0
}

/// Centrifugal stress (Pa) of the rotating assembly at `omega` rad/s
pub fn centrifugal_stress(omega: f32) -> f32 {
    let force = MASS_KG * RADIUS_M * omega * omega;
    force / AREA_M2
}

/// Inertial crank-slider forces at angle `theta` and speed `omega`
pub fn crank_slider(theta: f32, omega: f32) -> CrankForces {
    let omega2 = omega * omega;
    let (sin_theta, cos_theta) = theta.sin_cos();

    let piston_accel = -CRANK_THROW_M * omega2 * (cos_theta + LAMBDA * (2.0 * theta).cos());
    let piston_force_n = PISTON_MASS_KG * piston_accel;

    // Rod angle from the bore axis
    let sin_phi = LAMBDA * sin_theta;
    let phi = sin_phi.clamp(-1.0, 1.0).asin();
    let cos_phi = phi.cos();

    let (rod_force_n, side_thrust_n) = if cos_phi > ROD_ANGLE_EPSILON {
        (piston_force_n / cos_phi, piston_force_n * sin_phi / cos_phi)
    } else {
        (0.0, 0.0)
    };

    let tangential_force_n = rod_force_n * (theta + phi).sin();

    CrankForces {
        piston_force_n,
        rod_force_n,
        tangential_force_n,
        torque_nm: tangential_force_n * CRANK_THROW_M,
        side_thrust_n,
    }
}
