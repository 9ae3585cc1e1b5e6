//! Thread-safe view of the engine shared with I/O tasks

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use tracing::{debug, info};

use crate::constants::{DEFAULT_RPM_TARGET, RPM_MAX, RPM_MIN};
use crate::{SnapshotCell, StatePayload};

/// Playback mode requested by a viewer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ReplayMode {
    /// Follow the simulation in real time
    #[default]
    Live = 0,
    /// Hold the current frame
    Freeze = 1,
    /// Jump to a point in the history window
    Seek = 2,
}

impl ReplayMode {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ReplayMode::Freeze,
            2 => ReplayMode::Seek,
            _ => ReplayMode::Live,
        }
    }
}

/// Last replay request received from any consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayRequest {
    pub mode: ReplayMode,
    /// Seek target (ms), 0 when not given
    pub t_ms: u64,
}

/// State shared between the simulation thread and everything else.
///
/// The control target is a single `f32` stored as bits in an atomic with
/// relaxed ordering: the engine tolerates a target that is one tick stale.
#[derive(Debug)]
pub struct EngineHandle {
    rpm_target: AtomicU32,
    snapshot: SnapshotCell,
    replay_mode: AtomicU8,
    replay_t_ms: AtomicU64,
    replay_requests: AtomicU64,
}

impl EngineHandle {
    pub(crate) fn new(initial: StatePayload) -> Self {
        Self {
            rpm_target: AtomicU32::new(DEFAULT_RPM_TARGET.to_bits()),
            snapshot: SnapshotCell::new(initial),
            replay_mode: AtomicU8::new(ReplayMode::Live as u8),
            replay_t_ms: AtomicU64::new(0),
            replay_requests: AtomicU64::new(0),
        }
    }

    /// Set the speed the engine should converge to, clamped to the rated range.
    ///
    /// NaN is ignored. Takes effect on the next `step()`.
    pub fn set_rpm_target(&self, target: f32) {
        if target.is_nan() {
            debug!("Ignoring NaN rpm target");
            return;
        }
        let clamped = target.clamp(RPM_MIN, RPM_MAX);
        self.rpm_target.store(clamped.to_bits(), Ordering::Relaxed);
        debug!(requested = target, applied = clamped, "rpm target updated");
    }

    /// Last stored control target
    pub fn rpm_target(&self) -> f32 {
        f32::from_bits(self.rpm_target.load(Ordering::Relaxed))
    }

    /// Most recently published state
    pub fn snapshot(&self) -> StatePayload {
        self.snapshot.load()
    }

    /// Number of ticks published so far
    pub fn published_ticks(&self) -> u64 {
        self.snapshot.generation()
    }

    pub(crate) fn publish(&self, payload: &StatePayload) {
        self.snapshot.publish(payload);
    }

    /// Record a replay request.
    ///
    /// Playback from history is not wired yet; the request is stored so it
    /// can be inspected and is logged.
    pub fn request_replay(&self, request: ReplayRequest) {
        self.replay_t_ms.store(request.t_ms, Ordering::Relaxed);
        self.replay_mode.store(request.mode as u8, Ordering::Release);
        let count = self.replay_requests.fetch_add(1, Ordering::Relaxed) + 1;
        info!(mode = ?request.mode, t_ms = request.t_ms, count, "Replay requested");
    }

    /// Most recent replay request (defaults to live)
    pub fn replay_request(&self) -> ReplayRequest {
        let mode = ReplayMode::from_u8(self.replay_mode.load(Ordering::Acquire));
        ReplayRequest {
            mode,
            t_ms: self.replay_t_ms.load(Ordering::Relaxed),
        }
    }

    /// Total replay requests received
    pub fn replay_request_count(&self) -> u64 {
        self.replay_requests.load(Ordering::Relaxed)
    }
}
