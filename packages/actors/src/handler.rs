//! Job handler trait and the built-in simulated handler.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use queue_core::Job;

/// Result of one unit of work: the step's data text, or an error message.
pub type HandlerResult = Result<String, String>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Trait for job handlers.
///
/// A job is processed as a fixed number of steps, run one after another.
/// Any step returning an error fails the whole job.
pub trait JobHandler: Send + Sync + 'static {
    /// Number of steps the job takes.
    fn total_steps(&self, job: &Job) -> u32;

    /// Run step `step` (1-based) of the job.
    fn run_step(&self, job: &Job, step: u32) -> HandlerFuture;
}

/// Handler that pretends to process the payload in fixed-length chunks.
#[derive(Debug, Clone)]
pub struct SimulatedHandler {
    steps: u32,
    step_delay: Duration,
}

impl SimulatedHandler {
    pub const DEFAULT_STEPS: u32 = 60;
    pub const DEFAULT_STEP_DELAY: Duration = Duration::from_secs(1);

    pub fn new(steps: u32, step_delay: Duration) -> Self {
        Self { steps, step_delay }
    }
}

impl Default for SimulatedHandler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STEPS, Self::DEFAULT_STEP_DELAY)
    }
}

impl JobHandler for SimulatedHandler {
    fn total_steps(&self, _job: &Job) -> u32 {
        self.steps
    }

    fn run_step(&self, job: &Job, step: u32) -> HandlerFuture {
        let delay = self.step_delay;
        let preview: String = job.data.to_string().chars().take(20).collect();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(format!("Processed chunk {} of data: {}...", step, preview))
        })
    }
}

/// A simple function-based job handler.
pub struct FnHandler<F>
where
    F: Fn(&Job, u32) -> HandlerFuture + Send + Sync + 'static,
{
    steps: u32,
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Job, u32) -> HandlerFuture + Send + Sync + 'static,
{
    /// Create a handler running `handler` for each of `steps` steps.
    pub fn new(steps: u32, handler: F) -> Self {
        Self { steps, handler }
    }
}

impl<F> JobHandler for FnHandler<F>
where
    F: Fn(&Job, u32) -> HandlerFuture + Send + Sync + 'static,
{
    fn total_steps(&self, _job: &Job) -> u32 {
        self.steps
    }

    fn run_step(&self, job: &Job, step: u32) -> HandlerFuture {
        (self.handler)(job, step)
    }
}
