//! In-memory publisher and uploader

use super::{CameraStatus, ImageUploader, Publisher};
use crate::error::{Error, Result};
use crate::v2x_feed::EventBatch;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingPublisher {
    statuses: Mutex<Vec<CameraStatus>>,
    events: Mutex<Vec<EventBatch>>,
    fail_events: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<CameraStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<EventBatch> {
        self.events.lock().unwrap().clone()
    }

    /// Reject every event publication
    pub fn fail_events(&self, fail: bool) {
        self.fail_events.store(fail, Ordering::SeqCst);
    }
}

impl Publisher for RecordingPublisher {
    fn publish_status(&self, status: CameraStatus) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.statuses.lock().unwrap().push(status);
            Ok(())
        })
    }

    fn publish_event(&self, batch: EventBatch) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.fail_events.load(Ordering::SeqCst) {
                return Err(Error::Transport("broker unavailable".to_string()));
            }
            self.events.lock().unwrap().push(batch);
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct StubUploader {
    fail: AtomicBool,
    uploads: AtomicUsize,
}

impl StubUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

impl ImageUploader for StubUploader {
    fn upload(&self, _image: Vec<u8>) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Upload("gateway unavailable".to_string()));
            }
            Ok(format!("http://minio.test/event/{}.jpg", n))
        })
    }
}
