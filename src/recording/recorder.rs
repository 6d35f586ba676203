use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::device::{AudioInput, EncoderEvent};
use super::error::RecordingError;
use super::event::EventSink;
use super::machine::{RecorderOptions, RecordingMachine};
use super::meter::LevelSample;
use super::state::{RecordingState, Transition};
use super::stopwatch::format_elapsed;
use crate::model::SessionParticipant;

type Reply = oneshot::Sender<Result<(), RecordingError>>;

enum Command {
    Start(Reply),
    Pause(Reply),
    Resume(Reply),
    Stop(Reply),
    Snapshot(oneshot::Sender<RecorderSnapshot>),
}

/// Point-in-time view of a recorder
#[derive(Debug, Clone, Serialize)]
pub struct RecorderSnapshot {
    pub session_id: String,
    pub state: RecordingState,
    pub label: &'static str,
    pub elapsed_secs: f64,
    pub elapsed_display: String,
    pub level: LevelSample,
    pub chunks_count: usize,
    pub participants: Vec<SessionParticipant>,
}

/// Async handle to a recording machine running on its own task
///
/// Commands, encoder chunks and meter ticks are all processed by that one
/// task, in the order they are received. Dropping the handle closes the
/// command queue; the task then tears the machine down and releases the
/// input device without emitting events.
pub struct Recorder {
    session_id: String,
    commands: mpsc::UnboundedSender<Command>,
    level: watch::Receiver<LevelSample>,
}

impl Recorder {
    pub fn spawn(
        session_id: impl Into<String>,
        participants: Vec<SessionParticipant>,
        input: Arc<dyn AudioInput>,
        options: RecorderOptions,
        sink: impl EventSink,
    ) -> Self {
        let session_id = session_id.into();
        let machine = RecordingMachine::new(session_id.clone(), options, sink);
        let level = machine.subscribe_level();
        let (commands, command_rx) = mpsc::unbounded_channel();

        info!(
            "Recorder for session {} created (input: {})",
            session_id,
            input.name()
        );

        tokio::spawn(run(machine, participants, input, command_rx));

        Self {
            session_id,
            commands,
            level,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Acquire the input device and begin recording
    ///
    /// The machine stays `Idle` until acquisition resolves.
    pub async fn start(&self) -> Result<(), RecordingError> {
        self.request(Command::Start).await
    }

    pub async fn pause(&self) -> Result<(), RecordingError> {
        self.request(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<(), RecordingError> {
        self.request(Command::Resume).await
    }

    pub async fn stop(&self) -> Result<(), RecordingError> {
        self.request(Command::Stop).await
    }

    pub async fn snapshot(&self) -> Result<RecorderSnapshot, RecordingError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(tx))
            .map_err(|_| RecordingError::Closed)?;
        rx.await.map_err(|_| RecordingError::Closed)
    }

    /// Latest published level sample
    pub fn level(&self) -> LevelSample {
        *self.level.borrow()
    }

    pub fn subscribe_level(&self) -> watch::Receiver<LevelSample> {
        self.level.clone()
    }

    async fn request(&self, command: fn(Reply) -> Command) -> Result<(), RecordingError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| RecordingError::Closed)?;
        rx.await.map_err(|_| RecordingError::Closed)?
    }
}

async fn run(
    mut machine: RecordingMachine,
    participants: Vec<SessionParticipant>,
    input: Arc<dyn AudioInput>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let (encoder_tx, mut encoder_rx) = mpsc::unbounded_channel::<EncoderEvent>();
    let mut meter = tokio::time::interval(machine.options().meter_interval());
    meter.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let sampling = machine.state() == RecordingState::Recording;

        tokio::select! {
            biased;

            command = commands.recv() => {
                let Some(command) = command else {
                    machine.teardown();
                    info!("Recorder for session {} shut down", machine.session_id());
                    break;
                };
                match command {
                    Command::Start(reply) => {
                        let result = start(&mut machine, input.as_ref(), &encoder_tx).await;
                        let _ = reply.send(result);
                    }
                    Command::Pause(reply) => {
                        let _ = reply.send(machine.pause());
                    }
                    Command::Resume(reply) => {
                        let _ = reply.send(machine.resume());
                    }
                    Command::Stop(reply) => {
                        let _ = reply.send(machine.stop_draining(&mut encoder_rx));
                    }
                    Command::Snapshot(reply) => {
                        let _ = reply.send(snapshot(&machine, &participants));
                    }
                }
            }

            Some(event) = encoder_rx.recv() => {
                machine.on_encoder_event(event);
            }

            _ = meter.tick(), if sampling => {
                machine.sample_level();
            }
        }
    }
}

async fn start(
    machine: &mut RecordingMachine,
    input: &dyn AudioInput,
    encoder_tx: &mpsc::UnboundedSender<EncoderEvent>,
) -> Result<(), RecordingError> {
    machine.check(Transition::Start)?;

    let constraints = machine.options().constraints;
    let stream = match input.acquire(&constraints).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(
                "Session {}: could not acquire {}: {}",
                machine.session_id(),
                input.name(),
                e
            );
            return Err(e);
        }
    };

    machine.begin(stream, encoder_tx.clone())
}

fn snapshot(machine: &RecordingMachine, participants: &[SessionParticipant]) -> RecorderSnapshot {
    let elapsed: Duration = machine.elapsed();
    RecorderSnapshot {
        session_id: machine.session_id().to_string(),
        state: machine.state(),
        label: machine.state().label(),
        elapsed_secs: elapsed.as_secs_f64(),
        elapsed_display: format_elapsed(elapsed),
        level: machine.level(),
        chunks_count: machine.chunk_count(),
        participants: participants.to_vec(),
    }
}
