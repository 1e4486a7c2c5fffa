//! Engines: activity/job state machine, reconciliation, and the control loop.
//!
//! Every engine receives its collaborators explicitly through [`Providers`];
//! there is no process-wide state.

pub mod activity;
pub mod checks;
pub mod control;
pub mod job;
pub mod reconcile;
pub mod user;

pub use activity::{ActivityEngine, ExtendActivity, FinishActivity, FinishOutcome, StartActivity};
pub use checks::{MissedWorkCheck, TimerCheck};
pub use control::{LoopConfig, ReconcileLoop};
pub use job::{CompleteJob, CompletedJob, CreatedJob, JobEngine, JobStatus, UpdateJob};
pub use reconcile::{Check, CheckOutcome, PassReport, ReconcileResult, Reconciler};
pub use user::{CreatedUser, UserEngine};

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::notify::{MemoryNotifier, Notifier};
use crate::state::{MemoryState, Recorder, State, TemplateProvider};

/// The external capabilities the engines run against.
#[derive(Clone)]
pub struct Providers {
    pub state: Arc<dyn State>,
    pub templates: Arc<dyn TemplateProvider>,
    pub recorder: Arc<dyn Recorder>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl Providers {
    pub fn new(
        state: Arc<dyn State>,
        templates: Arc<dyn TemplateProvider>,
        recorder: Arc<dyn Recorder>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            state,
            templates,
            recorder,
            notifier,
            clock: Arc::new(SystemClock),
        }
    }

    /// Everything in memory: one [`MemoryState`] serves as state, template
    /// provider and recorder. The concrete handles are returned for
    /// inspection.
    pub fn in_memory() -> (Self, Arc<MemoryState>, Arc<MemoryNotifier>) {
        let state = Arc::new(MemoryState::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let providers = Self::new(
            state.clone(),
            state.clone(),
            state.clone(),
            notifier.clone(),
        );
        (providers, state, notifier)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
