//! # timerec
//!
//! Activity timer and job time recording.
//!
//! A user tracks at most one activity. Finished activities are recorded as
//! time entries on named jobs, and completed jobs are archived as records.
//! A background reconcile loop watches estimate deadlines and the daily
//! missed-work alarm and notifies through a pluggable backend.

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod notify;
pub mod state;
pub mod telemetry;
pub mod templates;
