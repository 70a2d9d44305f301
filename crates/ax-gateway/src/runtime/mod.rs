//! Host-side runtime support: the per-session write lock and the scheduled
//! delivery store. Turn execution itself happens inside the sandboxed agent
//! process, on the other side of the IPC gateway, and is out of scope here.

pub mod schedules;
pub mod session_lock;
