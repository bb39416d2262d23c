pub mod fetch_worker;

mod comms;
mod descriptor;
mod in_flight;
mod worker_fsm;

pub use comms::*;
pub use fetch_worker::{FetchWorker, WorkerReport, WorkerResources};

pub type WorkerId = usize;

/// consecutive failed attempts tolerated per segment, the next failure is fatal.
pub const MAX_RETRIES: u32 = 3;

/// size of the reads from a response body, and so of each positioned write.
pub const CHUNK_SIZE: usize = 8 * 1024;
