//! The Unix-socket IPC wire protocol: framing, request/response envelopes,
//! and the static action allowlist enforced before any handler runs.

pub mod actions;
pub mod envelope;
pub mod frame;
pub mod schema;

pub use actions::is_valid_action;
pub use envelope::{IpcRequest, IpcResponse};
pub use frame::{read_frame, write_frame, MAX_FRAME_BYTES};
pub use schema::validate_payload;
