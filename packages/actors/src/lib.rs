//! Actor system for the job queue.
//!
//! This crate provides the Ractor-based actors that process jobs and stream
//! their progress to observers.
//!
//! # Architecture
//!
//! - `Supervisor` - Top-level actor that keeps the worker alive and spawns relays
//! - `WorkerActor` - Drains the pending queue, logging each job's events
//! - `RelayActor` - Forwards one job's events to one observer
//!
//! # Usage
//!
//! ```ignore
//! use actors::{SupervisorArgs, SupervisorMessage, start_supervisor};
//!
//! let (supervisor, handle) = start_supervisor(args).await?;
//!
//! let stream = ractor::call!(supervisor, |reply| SupervisorMessage::OpenStream {
//!     job: Box::new(job),
//!     reply,
//! })??;
//! ```

mod handler;
mod messages;
mod relay_actor;
mod supervisor;
mod worker_actor;

pub use handler::{FnHandler, HandlerFuture, HandlerResult, JobHandler, SimulatedHandler};
pub use messages::{RelayMessage, SupervisorMessage, WorkerMessage};
pub use relay_actor::{RelayActor, RelayArgs, RelayConfig, RelayStream, spawn_relay};
pub use supervisor::{Supervisor, SupervisorArgs, start_supervisor};
pub use worker_actor::{JobOutcome, WorkerActor, WorkerArgs, WorkerConfig, WorkerContext, WorkerError};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
