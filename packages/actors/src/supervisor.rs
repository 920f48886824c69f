//! Supervisor actor owning the worker and every live relay.

use std::collections::HashMap;
use std::sync::Arc;

use db::{EventLog, JobStore};
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio_util::sync::CancellationToken;

use crate::handler::JobHandler;
use crate::messages::{RelayMessage, SupervisorMessage, WorkerMessage};
use crate::relay_actor::{RelayConfig, spawn_relay};
use crate::worker_actor::{WorkerActor, WorkerArgs, WorkerConfig, WorkerContext};

/// Supervisor arguments.
pub struct SupervisorArgs {
    pub store: Arc<JobStore>,
    pub log: Arc<dyn EventLog>,
    pub handler: Arc<dyn JobHandler>,
    pub worker: WorkerConfig,
    pub relay: RelayConfig,
}

/// State for the supervisor actor.
pub struct SupervisorState {
    worker_ctx: WorkerContext,
    relay_config: RelayConfig,
    /// Current worker, if running.
    worker: Option<ActorRef<WorkerMessage>>,
    /// Cancelled on shutdown so the worker stops after its current step.
    worker_shutdown: CancellationToken,
    /// Live relays by actor ID.
    relays: HashMap<ActorId, ActorRef<RelayMessage>>,
    /// Times the worker has been restarted.
    restarts: u64,
    shutting_down: bool,
}

async fn spawn_worker(
    myself: &ActorRef<SupervisorMessage>,
    state: &mut SupervisorState,
) -> Result<(), ActorProcessingErr> {
    let args = WorkerArgs {
        ctx: state.worker_ctx.clone(),
        shutdown: state.worker_shutdown.clone(),
    };

    let (worker, _handle) = Actor::spawn_linked(None, WorkerActor, args, myself.get_cell())
        .await
        .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn worker: {}", e)))?;

    state.worker = Some(worker);
    Ok(())
}

/// Supervisor actor that keeps one worker alive and spawns relays.
pub struct Supervisor;

impl Actor for Supervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = SupervisorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting job queue supervisor");

        let mut state = SupervisorState {
            worker_ctx: WorkerContext {
                store: args.store,
                log: args.log,
                handler: args.handler,
                config: args.worker,
            },
            relay_config: args.relay,
            worker: None,
            worker_shutdown: CancellationToken::new(),
            relays: HashMap::new(),
            restarts: 0,
            shutting_down: false,
        };

        spawn_worker(&myself, &mut state).await?;

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::OpenStream { job, reply } => {
                if state.shutting_down {
                    let _ = reply.send(Err("Supervisor is shutting down".into()));
                    return Ok(());
                }

                let job_id = job.id;
                match spawn_relay(
                    *job,
                    state.worker_ctx.log.clone(),
                    state.relay_config.clone(),
                    Some(myself.get_cell()),
                )
                .await
                {
                    Ok((stream, relay)) => {
                        tracing::info!("Opened relay for job {}", job_id);
                        state.relays.insert(relay.get_id(), relay);
                        let _ = reply.send(Ok(stream));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(format!("Failed to spawn relay: {}", e)));
                    }
                }
            }

            SupervisorMessage::ActiveRelays { reply } => {
                let _ = reply.send(state.relays.len());
            }

            SupervisorMessage::Shutdown => {
                tracing::info!(
                    "Shutting down supervisor ({} relays, {} worker restarts)",
                    state.relays.len(),
                    state.restarts
                );
                state.shutting_down = true;

                for relay in state.relays.values() {
                    relay.stop(Some("shutdown".to_string()));
                }

                state.worker_shutdown.cancel();
                match &state.worker {
                    Some(worker) => {
                        // The supervisor stops once the worker reports terminated.
                        let _ = worker.send_message(WorkerMessage::Shutdown);
                    }
                    None => myself.stop(None),
                }
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let (cell, failure) = match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => (cell, reason),
            SupervisionEvent::ActorFailed(cell, err) => (cell, Some(err.to_string())),
            _ => return Ok(()),
        };
        let id = cell.get_id();

        if state.relays.remove(&id).is_some() {
            tracing::debug!("Relay {} stopped: {:?}", id, failure);
            return Ok(());
        }

        let is_worker = state.worker.as_ref().is_some_and(|w| w.get_id() == id);
        if !is_worker {
            return Ok(());
        }
        state.worker = None;

        if state.shutting_down {
            tracing::info!("Worker stopped");
            myself.stop(None);
            return Ok(());
        }

        state.restarts += 1;
        tracing::warn!(
            "Worker stopped unexpectedly ({:?}), restarting (restart #{})",
            failure,
            state.restarts
        );
        spawn_worker(&myself, state).await
    }
}

/// Start the supervisor, which in turn starts the worker.
pub async fn start_supervisor(
    args: SupervisorArgs,
) -> Result<(ActorRef<SupervisorMessage>, tokio::task::JoinHandle<()>), ractor::SpawnErr> {
    let (actor, handle) = Actor::spawn(None, Supervisor, args).await?;

    Ok((actor, handle))
}
