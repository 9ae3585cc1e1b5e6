//! Outbound state message

use std::io::{Cursor, Write};

use crank_physics::StatePayload;

use crate::ProtocolError;

/// Buffer size that always fits a formatted state message
pub const STATE_MESSAGE_CAPACITY: usize = 512;

/// Non-finite values would produce invalid JSON
fn finite(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Format `state` into `buf`, returning the number of bytes written.
///
/// ```text
/// {"type":"state","payload":{"rpm":1200.00,"angle_rad":0.125664,...,"timestamp_ms":1700000000000}}
/// ```
pub fn try_serialize_state(state: &StatePayload, buf: &mut [u8]) -> Result<usize, ProtocolError> {
    let capacity = buf.len();
    let mut cursor = Cursor::new(buf);
    write!(
        cursor,
        concat!(
            r#"{{"type":"state","payload":{{"#,
            r#""rpm":{:.2},"angle_rad":{:.6},"stress_pa":{:.2},"stress_factor":{:.6},"#,
            r#""piston_force_n":{:.2},"rod_force_n":{:.2},"tangential_force_n":{:.2},"#,
            r#""torque_nm":{:.4},"side_thrust_n":{:.2},"#,
            r#""timestamp_ms":{}}}}}"#,
        ),
        finite(state.rpm),
        finite(state.angle_rad),
        finite(state.stress_pa),
        finite(state.stress_factor),
        finite(state.piston_force_n),
        finite(state.rod_force_n),
        finite(state.tangential_force_n),
        finite(state.torque_nm),
        finite(state.side_thrust_n),
        state.timestamp_ms,
    )
    .map_err(|_| ProtocolError::BufferTooSmall { capacity })?;
    Ok(cursor.position() as usize)
}

/// Hot-path variant: returns 0 when the message does not fit, meaning
/// "nothing to send this tick".
pub fn serialize_state(state: &StatePayload, buf: &mut [u8]) -> usize {
    try_serialize_state(state, buf).unwrap_or(0)
}
