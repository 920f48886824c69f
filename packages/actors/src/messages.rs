//! Message types for actor communication.

use queue_core::Job;
use ractor::RpcReplyPort;

use crate::relay_actor::RelayStream;

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Look for the next queued job and process it.
    Poll,

    /// Shutdown the worker.
    Shutdown,
}

/// Messages for the RelayActor.
#[derive(Debug)]
pub enum RelayMessage {
    /// Read new log entries and forward them.
    Poll,

    /// Send the next synthesized event.
    ReplayNext,

    /// Close the observer's stream.
    Close,

    /// The observer went away.
    ObserverGone,
}

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Start relaying events for a job to a new observer.
    OpenStream {
        job: Box<Job>,
        reply: RpcReplyPort<Result<RelayStream, String>>,
    },

    /// Number of relays currently running.
    ActiveRelays { reply: RpcReplyPort<usize> },

    /// Stop all relays, let the worker finish its current step, then stop.
    Shutdown,
}
