//! Unix-socket IPC gateway: the only channel the sandboxed agent process
//! has back into the host. See [`gateway`] for the listener/dispatch loop
//! and [`handlers`] for the one-function-per-action implementations.

pub mod gateway;
pub mod handlers;
