//! Physics Engine Implementation

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::constants::{DT_S, HISTORY_CAPACITY, RPM_MAX, RPM_MIN, TAU_S, TWO_PI};
use crate::kinematics::{angular_velocity, centrifugal_stress, crank_slider, CrankForces};
use crate::{EngineHandle, History, StatePayload};

/// Per-tick smoothing factor `α = 1 − e^(−dt/τ)`
pub fn smoothing_alpha() -> f32 {
    1.0 - (-DT_S / TAU_S).exp()
}

/// Stress at maximum rated speed, the saturation point of `stress_factor`
pub fn stress_max_pa() -> f32 {
    centrifugal_stress(angular_velocity(RPM_MAX))
}

/// Unix-anchored millisecond clock that never goes backwards
#[derive(Debug, Clone, Copy)]
struct MonotonicClock {
    origin: Instant,
    origin_unix_ms: u64,
}

impl MonotonicClock {
    fn new() -> Self {
        let origin_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            origin: Instant::now(),
            origin_unix_ms,
        }
    }

    fn now_ms(&self) -> u64 {
        self.origin_unix_ms + self.origin.elapsed().as_millis() as u64
    }
}

/// Single-cylinder crank-slider simulation.
///
/// Owned by the simulation thread; `step()` takes `&mut self`. Everything
/// other threads need goes through the [`EngineHandle`].
pub struct PhysicsEngine {
    rpm: f32,
    angle_rad: f32,
    omega_rad_s: f32,
    stress_pa: f32,
    stress_factor: f32,
    stress_max_pa: f32,
    forces: CrankForces,
    alpha: f32,
    tick: u64,
    last_timestamp_ms: u64,
    history: History,
    handle: Arc<EngineHandle>,
    clock: MonotonicClock,
}

impl PhysicsEngine {
    /// Create an engine at rest
    pub fn new() -> Self {
        Self::with_rpm(0.0)
    }

    /// Create an engine already spinning at `rpm` (clamped)
    pub fn with_rpm(rpm: f32) -> Self {
        let stress_max_pa = stress_max_pa();
        info!(
            stress_max_pa,
            history = HISTORY_CAPACITY,
            "Physics engine created"
        );
        Self {
            rpm: rpm.clamp(RPM_MIN, RPM_MAX),
            angle_rad: 0.0,
            omega_rad_s: 0.0,
            stress_pa: 0.0,
            stress_factor: 0.0,
            stress_max_pa,
            forces: CrankForces::default(),
            alpha: smoothing_alpha(),
            tick: 0,
            last_timestamp_ms: 0,
            history: History::new(HISTORY_CAPACITY),
            handle: Arc::new(EngineHandle::new(StatePayload::default())),
            clock: MonotonicClock::new(),
        }
    }

    /// Shared handle for control input and snapshot reads
    pub fn handle(&self) -> Arc<EngineHandle> {
        Arc::clone(&self.handle)
    }

    /// Clamp and store the control target; applied on the next step
    pub fn set_rpm_target(&self, target: f32) {
        self.handle.set_rpm_target(target);
    }

    pub fn rpm_target(&self) -> f32 {
        self.handle.rpm_target()
    }

    /// Latest published state
    pub fn snapshot(&self) -> StatePayload {
        self.handle.snapshot()
    }

    /// Read-only view of the retained history, oldest first
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Current rpm as seen by the simulation thread
    pub fn rpm(&self) -> f32 {
        self.rpm
    }

    /// Ticks advanced since construction
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stress_max(&self) -> f32 {
        self.stress_max_pa
    }

    /// Advance one fixed step, timestamped with the engine clock
    pub fn step(&mut self) -> StatePayload {
        let now = self.clock.now_ms();
        self.step_at(now)
    }

    /// Advance one fixed step with an explicit timestamp.
    ///
    /// Timestamps earlier than the previous tick are raised to it so the
    /// published sequence stays non-decreasing.
    pub fn step_at(&mut self, timestamp_ms: u64) -> StatePayload {
        let requested = self.handle.rpm_target();

        self.rpm += (requested - self.rpm) * self.alpha;
        self.rpm = self.rpm.clamp(RPM_MIN, RPM_MAX);

        self.omega_rad_s = angular_velocity(self.rpm);

        // One correction is enough: ω·dt at RPM_MAX is ~5 rad
        self.angle_rad += self.omega_rad_s * DT_S;
        if self.angle_rad >= TWO_PI {
            self.angle_rad -= TWO_PI;
        }
        if self.angle_rad < 0.0 {
            self.angle_rad += TWO_PI;
        }
        // f32 rounding can land exactly on 2π after the subtraction
        if self.angle_rad >= TWO_PI {
            self.angle_rad = 0.0;
        }

        self.stress_pa = centrifugal_stress(self.omega_rad_s);
        self.stress_factor = (self.stress_pa / self.stress_max_pa).clamp(0.0, 1.0);

        self.forces = crank_slider(self.angle_rad, self.omega_rad_s);

        self.last_timestamp_ms = timestamp_ms.max(self.last_timestamp_ms);
        self.tick += 1;

        let state = StatePayload {
            rpm: self.rpm,
            angle_rad: self.angle_rad,
            stress_pa: self.stress_pa,
            stress_factor: self.stress_factor,
            piston_force_n: self.forces.piston_force_n,
            rod_force_n: self.forces.rod_force_n,
            tangential_force_n: self.forces.tangential_force_n,
            torque_nm: self.forces.torque_nm,
            side_thrust_n: self.forces.side_thrust_n,
            timestamp_ms: self.last_timestamp_ms,
        };

        self.history.push(state);
        self.handle.publish(&state);
        state
    }
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self::new()
    }
}
