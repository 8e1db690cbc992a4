//! Keeping the catalog and audio cache warm.
//!
//! [`BatchRefresher`] pulls a trailing window of episodes for a set of
//! programs from the origin, upserts them, and prefetches their audio through
//! the shared [`airwaves_cache::AudioCache`] with a fixed-size worker pool.
//! [`Scheduler`] runs the refresher for all followed programs on an interval.

pub mod refresh;
pub mod scheduler;

pub use refresh::{BatchRefresher, RefreshError, RefreshOptions, DEFAULT_CONCURRENCY, DEFAULT_WINDOW};
pub use scheduler::{RefreshJob, Scheduler, TickOutcome, DEFAULT_INTERVAL};
