//! Relay actor that forwards one job's events to one observer.
//!
//! A relay first sends the `initial` snapshot, then either tails the job's
//! event log until a terminal entry shows up, or, for a job that already
//! finished, replays a timeline synthesized from the stored record.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use db::EventLog;
use futures_util::Stream;
use queue_core::{EntryId, Job, JobEvent, JobId, replay_timeline, stream_key};
use ractor::{Actor, ActorCell, ActorProcessingErr, ActorRef, SpawnErr};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::messages::RelayMessage;

/// Events buffered between a relay and its observer.
const CHANNEL_CAPACITY: usize = 64;

/// Floor for the tailing cadence.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Relay cadences.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// How often a tailing relay reads the log.
    pub poll_interval: Duration,
    /// Entries per log read.
    pub batch_size: usize,
    /// Delay between the terminal event and closing the stream.
    pub close_grace: Duration,
    /// Delay before a replay starts.
    pub replay_settle: Duration,
    /// Delay between the replayed `started` and the first `progress`.
    pub replay_start_delay: Duration,
    /// Delay between replayed `progress` events.
    pub replay_pacing: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            batch_size: 10,
            close_grace: Duration::from_millis(100),
            replay_settle: Duration::from_millis(500),
            replay_start_delay: Duration::from_millis(200),
            replay_pacing: Duration::from_millis(100),
        }
    }
}

/// Observer end of a relay.
///
/// Dropping it stops the relay.
pub struct RelayStream {
    job_id: JobId,
    receiver: mpsc::Receiver<JobEvent>,
    _observer: DropGuard,
}

impl RelayStream {
    fn channel(job_id: JobId) -> (Self, mpsc::Sender<JobEvent>, CancellationToken) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let observer = CancellationToken::new();
        let stream = Self {
            job_id,
            receiver,
            _observer: observer.clone().drop_guard(),
        };
        (stream, sender, observer)
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Next event, or `None` once the relay closed.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        self.receiver.recv().await
    }
}

impl std::fmt::Debug for RelayStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayStream")
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}

impl Stream for RelayStream {
    type Item = JobEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

enum RelayPhase {
    Tailing { cursor: EntryId },
    Replaying { remaining: VecDeque<JobEvent> },
    Closed,
}

/// State for the relay actor.
pub struct RelayState {
    job_id: JobId,
    key: String,
    log: Arc<dyn EventLog>,
    sender: mpsc::Sender<JobEvent>,
    config: RelayConfig,
    phase: RelayPhase,
    ticker: Option<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
}

impl RelayState {
    /// Enter `Closed` and close the stream after the grace delay.
    fn finish(&mut self, myself: &ActorRef<RelayMessage>) {
        self.phase = RelayPhase::Closed;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.schedule(myself, self.config.close_grace, || RelayMessage::Close);
    }

    fn schedule(
        &mut self,
        myself: &ActorRef<RelayMessage>,
        delay: Duration,
        message: fn() -> RelayMessage,
    ) {
        let myself = myself.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = myself.send_message(message());
        });
        if let Some(previous) = self.timer.replace(timer) {
            previous.abort();
        }
    }
}

/// Relay actor arguments.
pub struct RelayArgs {
    pub job: Job,
    pub log: Arc<dyn EventLog>,
    pub sender: mpsc::Sender<JobEvent>,
    pub observer: CancellationToken,
    pub config: RelayConfig,
}

/// Relay actor for a single observer.
pub struct RelayActor;

impl Actor for RelayActor {
    type Msg = RelayMessage;
    type State = RelayState;
    type Arguments = RelayArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let RelayArgs {
            job,
            log,
            sender,
            observer,
            config,
        } = args;

        let watcher = {
            let myself = myself.clone();
            tokio::spawn(async move {
                observer.cancelled().await;
                let _ = myself.send_message(RelayMessage::ObserverGone);
            })
        };

        let mut state = RelayState {
            job_id: job.id,
            key: stream_key(job.id),
            log,
            sender,
            config,
            phase: RelayPhase::Closed,
            ticker: None,
            watcher: Some(watcher),
            timer: None,
        };

        if state.sender.send(JobEvent::initial(&job)).await.is_err() {
            myself.send_message(RelayMessage::ObserverGone)?;
            return Ok(state);
        }

        match replay_timeline(&job) {
            Some(events) => {
                tracing::debug!("Replaying {} events for job {}", events.len(), job.id);
                state.phase = RelayPhase::Replaying {
                    remaining: events.into(),
                };
                let settle = state.config.replay_settle;
                state.schedule(&myself, settle, || RelayMessage::ReplayNext);
            }
            None => {
                tracing::debug!("Tailing log for job {}", job.id);
                state.phase = RelayPhase::Tailing {
                    cursor: EntryId::ZERO,
                };
                let period = state.config.poll_interval.max(MIN_POLL_INTERVAL);
                let ticker_ref = myself.clone();
                state.ticker = Some(tokio::spawn(async move {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        interval.tick().await;
                        if ticker_ref.send_message(RelayMessage::Poll).is_err() {
                            break;
                        }
                    }
                }));
            }
        }

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            RelayMessage::Poll => {
                let RelayPhase::Tailing { cursor } = state.phase else {
                    return Ok(());
                };
                let mut cursor = cursor;
                let limit = state.config.batch_size.max(1);

                loop {
                    let batch = match state
                        .log
                        .read_range(&state.key, cursor, limit)
                        .await
                    {
                        Ok(batch) => batch,
                        Err(e) => {
                            tracing::warn!("Relay read failed for job {}: {}", state.job_id, e);
                            break;
                        }
                    };
                    let drained = batch.len() < limit;

                    for entry in batch {
                        cursor = entry.id;
                        let event = match JobEvent::from_fields(&entry.fields) {
                            Ok(event) => event,
                            Err(e) => {
                                tracing::warn!(
                                    "Skipping undecodable entry {} for job {}: {}",
                                    entry.id,
                                    state.job_id,
                                    e
                                );
                                continue;
                            }
                        };

                        let terminal = event.is_terminal();
                        if state.sender.send(event).await.is_err() {
                            myself.stop(Some("observer gone".to_string()));
                            return Ok(());
                        }
                        if terminal {
                            state.finish(&myself);
                            return Ok(());
                        }
                    }

                    if drained {
                        break;
                    }
                }

                state.phase = RelayPhase::Tailing { cursor };
            }

            RelayMessage::ReplayNext => {
                let RelayPhase::Replaying { remaining } = &mut state.phase else {
                    return Ok(());
                };
                let Some(event) = remaining.pop_front() else {
                    state.finish(&myself);
                    return Ok(());
                };
                let more = !remaining.is_empty();

                let delay = match &event {
                    JobEvent::Started { .. } => state.config.replay_start_delay,
                    _ => state.config.replay_pacing,
                };
                let terminal = event.is_terminal();

                if state.sender.send(event).await.is_err() {
                    myself.stop(Some("observer gone".to_string()));
                    return Ok(());
                }

                if terminal || !more {
                    state.finish(&myself);
                } else {
                    state.schedule(&myself, delay, || RelayMessage::ReplayNext);
                }
            }

            RelayMessage::Close => {
                tracing::debug!("Closing relay for job {}", state.job_id);
                myself.stop(None);
            }

            RelayMessage::ObserverGone => {
                tracing::debug!("Observer of job {} disconnected", state.job_id);
                state.phase = RelayPhase::Closed;
                myself.stop(Some("observer gone".to_string()));
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        for task in [state.ticker.take(), state.watcher.take(), state.timer.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        Ok(())
    }
}

/// Spawn a relay for `job` and return the observer's stream.
///
/// With a `supervisor`, the relay is linked to it.
pub async fn spawn_relay(
    job: Job,
    log: Arc<dyn EventLog>,
    config: RelayConfig,
    supervisor: Option<ActorCell>,
) -> Result<(RelayStream, ActorRef<RelayMessage>), SpawnErr> {
    let (stream, sender, observer) = RelayStream::channel(job.id);
    let args = RelayArgs {
        job,
        log,
        sender,
        observer,
        config,
    };

    let (relay, _handle) = match supervisor {
        Some(supervisor) => Actor::spawn_linked(None, RelayActor, args, supervisor).await?,
        None => Actor::spawn(None, RelayActor, args).await?,
    };

    Ok((stream, relay))
}
