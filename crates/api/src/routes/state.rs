//! Current State Route

use axum::{extract::State, Json};
use crank_physics::{ReplayMode, StatePayload};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Response for the state endpoint
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub data: StatePayload,
    pub meta: StateMeta,
}

#[derive(Debug, Serialize)]
pub struct StateMeta {
    pub rpm_target: f32,
    pub replay_mode: ReplayMode,
    pub clients: usize,
    pub ticks: u64,
    pub uptime_seconds: u64,
}

/// Latest published snapshot plus control state
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(StateResponse {
        data: state.engine.snapshot(),
        meta: StateMeta {
            rpm_target: state.engine.rpm_target(),
            replay_mode: state.engine.replay_request().mode,
            clients: state.registry.len(),
            ticks: state.engine.published_ticks(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        },
    })
}
