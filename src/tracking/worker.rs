//! CameraWorker
//!
//! Per-camera dispatch queue. Inbound messages and the status, watchdog and
//! delayed-home timers are handled one at a time on a dedicated task, so
//! commands to a camera are issued in order.
//!
//! Operator commands travel on their own channel, stamped on arrival, and
//! are served before feed batches. A full feed inbox only drops feed data.

use super::context::TrackingContext;
use crate::transport::RemoteCommand;
use crate::v2x_feed::{EventBatch, VehicleBatch};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Duration, Instant, MissedTickBehavior};

/// Feed batches buffered per camera
pub const INBOX_CAPACITY: usize = 64;
pub const STATUS_INTERVAL: Duration = Duration::from_secs(1);
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(2);

/// Message queued for one camera
#[derive(Debug, Clone)]
pub enum CameraMessage {
    Command(RemoteCommand),
    Vehicles(Arc<VehicleBatch>),
    Events(Arc<EventBatch>),
}

/// Feed data held in a camera's bounded inbox
#[derive(Debug)]
enum FeedMessage {
    Vehicles(Arc<VehicleBatch>),
    Events(Arc<EventBatch>),
}

/// Remote command with its arrival time in epoch milliseconds
#[derive(Debug)]
struct ReceivedCommand {
    command: RemoteCommand,
    received_ms: i64,
}

/// Sending side of a camera's queues
#[derive(Clone)]
pub struct CameraHandle {
    sn: String,
    commands: mpsc::UnboundedSender<ReceivedCommand>,
    feed: mpsc::Sender<FeedMessage>,
}

impl CameraHandle {
    pub fn sn(&self) -> &str {
        &self.sn
    }

    /// Queue `message`
    ///
    /// Commands are never dropped while the worker runs. Feed batches are
    /// dropped with a warning when the inbox is full.
    pub fn deliver(&self, message: CameraMessage) -> bool {
        match message {
            CameraMessage::Command(command) => {
                self.deliver_command_at(command, chrono::Utc::now().timestamp_millis())
            }
            CameraMessage::Vehicles(batch) => self.deliver_feed(FeedMessage::Vehicles(batch)),
            CameraMessage::Events(batch) => self.deliver_feed(FeedMessage::Events(batch)),
        }
    }

    fn deliver_command_at(&self, command: RemoteCommand, received_ms: i64) -> bool {
        let received = ReceivedCommand {
            command,
            received_ms,
        };
        if self.commands.send(received).is_err() {
            tracing::warn!(camera = %self.sn, "Camera worker stopped, dropping command");
            return false;
        }
        true
    }

    fn deliver_feed(&self, message: FeedMessage) -> bool {
        match self.feed.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(camera = %self.sn, "Camera inbox full, dropping feed batch");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(camera = %self.sn, "Camera worker stopped, dropping feed batch");
                false
            }
        }
    }
}

pub struct CameraWorker {
    context: TrackingContext,
    commands: mpsc::UnboundedReceiver<ReceivedCommand>,
    inbox: mpsc::Receiver<FeedMessage>,
}

impl CameraWorker {
    pub fn new(context: TrackingContext) -> (Self, CameraHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (feed, inbox) = mpsc::channel(INBOX_CAPACITY);
        let handle = CameraHandle {
            sn: context.camera().to_string(),
            commands: commands_tx,
            feed,
        };
        (
            Self {
                context,
                commands,
                inbox,
            },
            handle,
        )
    }

    /// Process messages and timers until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!(camera = %self.context.camera(), "Camera worker started");

        let mut status = interval(STATUS_INTERVAL);
        status.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watchdog = interval(WATCHDOG_INTERVAL);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let home_deadline = self.context.next_home_timer();

            tokio::select! {
                biased;

                received = self.commands.recv() => match received {
                    Some(ReceivedCommand { command, received_ms }) => {
                        self.context.on_remote_command_at(&command, received_ms).await
                    }
                    None => break,
                },
                _ = wait_for(home_deadline) => self.context.fire_due_timers(Instant::now()).await,
                _ = watchdog.tick() => self.context.idle_watchdog(Instant::now()),
                _ = status.tick() => self.context.publish_status().await,
                message = self.inbox.recv() => match message {
                    Some(message) => self.dispatch(message).await,
                    None => break,
                },
            }
        }

        tracing::info!(camera = %self.context.camera(), "Camera worker stopped");
    }

    async fn dispatch(&mut self, message: FeedMessage) {
        match message {
            FeedMessage::Vehicles(batch) => self.context.on_vehicle_batch(&batch).await,
            FeedMessage::Events(batch) => self.context.on_traffic_event_batch(&batch).await,
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
