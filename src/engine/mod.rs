//! Crawl orchestration
//!
//! The engine ties the other modules together: it seeds and drains the work
//! queue in two phases, runs workers under a shared concurrency limit, and
//! decides when a pass is complete enough to clear the queue.

mod coordinator;
mod snapshot;

pub use coordinator::Engine;
pub use snapshot::save_snapshot;
