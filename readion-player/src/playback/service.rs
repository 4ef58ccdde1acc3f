//! Playback service - single task owning the controller
//!
//! Commands, platform events and the progress ticker are all handled by
//! one task, one at a time, so no controller state is ever shared. Callers
//! talk to it through a cloneable [`PlaybackHandle`].
//!
//! The progress ticker only exists while the controller is Playing; it is
//! dropped as soon as playback leaves that state so no stale position is
//! saved after a stop.

use std::time::Duration;

use readion_common::events::PlaybackState;
use readion_common::{TextSource, VoiceSettings, VoiceSettingsUpdate};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::playback::controller::{PlaybackController, PlaybackStatus};
use crate::speech::SynthesisEvent;

/// Default period of the progress save while playing
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(5000);

const COMMAND_QUEUE_DEPTH: usize = 32;

enum PlaybackCommand {
    OpenSource {
        source: TextSource,
        response_tx: oneshot::Sender<Result<usize>>,
    },
    Play {
        response_tx: oneshot::Sender<Result<()>>,
    },
    PlayText {
        content: String,
        source_id: Option<Uuid>,
        position: i64,
        response_tx: oneshot::Sender<Result<()>>,
    },
    Pause {
        response_tx: oneshot::Sender<Result<()>>,
    },
    Resume {
        response_tx: oneshot::Sender<()>,
    },
    Stop {
        response_tx: oneshot::Sender<()>,
    },
    Jump {
        position: i64,
        response_tx: oneshot::Sender<Result<usize>>,
    },
    SkipForward {
        response_tx: oneshot::Sender<Result<usize>>,
    },
    SkipBack {
        response_tx: oneshot::Sender<Result<usize>>,
    },
    UpdateSettings {
        update: VoiceSettingsUpdate,
        response_tx: oneshot::Sender<Result<VoiceSettings>>,
    },
    Status {
        response_tx: oneshot::Sender<PlaybackStatus>,
    },
    Shutdown {
        response_tx: oneshot::Sender<()>,
    },
}

/// Cloneable client for the playback service
#[derive(Clone)]
pub struct PlaybackHandle {
    tx: mpsc::Sender<PlaybackCommand>,
}

impl PlaybackHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> PlaybackCommand,
    ) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(build(response_tx))
            .await
            .map_err(|_| Error::ServiceStopped)?;
        response_rx.await.map_err(|_| Error::ServiceStopped)
    }

    pub async fn open_source(&self, source: TextSource) -> Result<usize> {
        self.request(|response_tx| PlaybackCommand::OpenSource { source, response_tx })
            .await?
    }

    pub async fn play(&self) -> Result<()> {
        self.request(|response_tx| PlaybackCommand::Play { response_tx })
            .await?
    }

    pub async fn play_text(
        &self,
        content: impl Into<String>,
        source_id: Option<Uuid>,
        position: i64,
    ) -> Result<()> {
        let content = content.into();
        self.request(|response_tx| PlaybackCommand::PlayText {
            content,
            source_id,
            position,
            response_tx,
        })
        .await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|response_tx| PlaybackCommand::Pause { response_tx })
            .await?
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(|response_tx| PlaybackCommand::Resume { response_tx })
            .await
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(|response_tx| PlaybackCommand::Stop { response_tx })
            .await
    }

    pub async fn jump(&self, position: i64) -> Result<usize> {
        self.request(|response_tx| PlaybackCommand::Jump { position, response_tx })
            .await?
    }

    pub async fn skip_forward(&self) -> Result<usize> {
        self.request(|response_tx| PlaybackCommand::SkipForward { response_tx })
            .await?
    }

    pub async fn skip_back(&self) -> Result<usize> {
        self.request(|response_tx| PlaybackCommand::SkipBack { response_tx })
            .await?
    }

    pub async fn update_settings(&self, update: VoiceSettingsUpdate) -> Result<VoiceSettings> {
        self.request(|response_tx| PlaybackCommand::UpdateSettings { update, response_tx })
            .await?
    }

    pub async fn status(&self) -> Result<PlaybackStatus> {
        self.request(|response_tx| PlaybackCommand::Status { response_tx })
            .await
    }

    /// Stop speech, save progress and end the service task
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|response_tx| PlaybackCommand::Shutdown { response_tx })
            .await
    }
}

/// Spawn the service task
///
/// Returns the client handle and the task's join handle. The task ends on
/// `shutdown` or when every handle is dropped.
pub fn spawn(
    mut controller: PlaybackController,
    progress_interval: Duration,
) -> (PlaybackHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let synthesis_rx = controller.take_synthesis_events();

    let task = tokio::spawn(run(controller, rx, synthesis_rx, progress_interval));
    (PlaybackHandle { tx }, task)
}

async fn run(
    mut controller: PlaybackController,
    mut commands: mpsc::Receiver<PlaybackCommand>,
    synthesis_rx: Option<mpsc::UnboundedReceiver<SynthesisEvent>>,
    progress_interval: Duration,
) {
    info!(
        "Playback service started (progress every {}ms)",
        progress_interval.as_millis()
    );

    let mut synthesis_rx = match synthesis_rx {
        Some(rx) => rx,
        None => {
            warn!("Synthesis events already taken; positions will not advance");
            // Keep a receiver whose sender is gone so the select branch disables itself
            mpsc::unbounded_channel().1
        }
    };
    let mut ticker: Option<Interval> = None;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("All playback handles dropped");
                    controller.shutdown().await;
                    break;
                };
                if !handle_command(&mut controller, command).await {
                    break;
                }
            }
            Some(event) = synthesis_rx.recv() => {
                if let Err(e) = controller.handle_synthesis_event(event).await {
                    warn!("Synthesis event handling: {}", e);
                }
            }
            _ = next_tick(&mut ticker) => {
                if let Err(e) = controller.on_progress_tick().await {
                    warn!("Periodic progress save failed: {}", e);
                }
            }
        }

        match (controller.state(), ticker.is_some()) {
            (PlaybackState::Playing, false) => {
                let mut interval = interval_at(Instant::now() + progress_interval, progress_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker = Some(interval);
            }
            (PlaybackState::Playing, true) => {}
            (_, true) => ticker = None,
            (_, false) => {}
        }
    }

    info!("Playback service stopped");
}

/// Run one command; returns false when the service should exit
async fn handle_command(controller: &mut PlaybackController, command: PlaybackCommand) -> bool {
    // Send errors mean the caller gave up waiting; the command still ran
    match command {
        PlaybackCommand::OpenSource { source, response_tx } => {
            let _ = response_tx.send(controller.open_source(&source).await);
        }
        PlaybackCommand::Play { response_tx } => {
            let _ = response_tx.send(controller.play().await);
        }
        PlaybackCommand::PlayText {
            content,
            source_id,
            position,
            response_tx,
        } => {
            let _ = response_tx.send(controller.play_text(content, source_id, position).await);
        }
        PlaybackCommand::Pause { response_tx } => {
            let _ = response_tx.send(controller.pause().await);
        }
        PlaybackCommand::Resume { response_tx } => {
            controller.resume();
            let _ = response_tx.send(());
        }
        PlaybackCommand::Stop { response_tx } => {
            controller.stop();
            let _ = response_tx.send(());
        }
        PlaybackCommand::Jump {
            position,
            response_tx,
        } => {
            let _ = response_tx.send(controller.jump(position).await);
        }
        PlaybackCommand::SkipForward { response_tx } => {
            let _ = response_tx.send(controller.skip_forward().await);
        }
        PlaybackCommand::SkipBack { response_tx } => {
            let _ = response_tx.send(controller.skip_back().await);
        }
        PlaybackCommand::UpdateSettings {
            update,
            response_tx,
        } => {
            let _ = response_tx.send(controller.update_settings(&update).await);
        }
        PlaybackCommand::Status { response_tx } => {
            let _ = response_tx.send(controller.status());
        }
        PlaybackCommand::Shutdown { response_tx } => {
            controller.shutdown().await;
            let _ = response_tx.send(());
            return false;
        }
    }
    true
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
