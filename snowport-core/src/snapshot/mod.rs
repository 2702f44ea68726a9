//! Snapshot requests, staging files and completion notifications.
//!
//! Lifecycle of one request:
//! 1. A producer calls [`SnapshotRequester::request_save`] or
//!    [`SnapshotRequester::request_load`] (which first stages the snapshot bytes).
//! 2. The core polls the mailbox through `js_snapshot_take_kind` /
//!    `js_snapshot_take_request_id`.
//! 3. The core writes (save) or reads (load) the staging file for that request id.
//! 4. The core reports back; [`SnapshotBridge`] turns that into exactly one
//!    [`SnapshotEvent`] and removes the staging file.
//!
//! Staging cleanup is best effort and never changes the outcome already reported.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;

use crate::abi;
use crate::host::SnapshotNotifier;
use crate::mailbox::{SnapshotKind, SnapshotMailbox};


/// Notification sent to the requester once the core is done with a request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SnapshotEvent {
    Saved { request_id: u32, data: Vec<u8> },
    Loaded { request_id: u32 },
    Error { request_id: u32, message: String },
}

impl SnapshotEvent {
    pub fn request_id(&self) -> u32 {
        match self {
            SnapshotEvent::Saved { request_id, .. }
            | SnapshotEvent::Loaded { request_id }
            | SnapshotEvent::Error { request_id, .. } => *request_id,
        }
    }
}

/// Deliver events to another thread, e.g. the UI that issued the request.
///
/// A disconnected receiver drops the event.
impl SnapshotNotifier for mpsc::Sender<SnapshotEvent> {
    fn notify(&mut self, event: SnapshotEvent) {
        let request_id = event.request_id();
        if self.send(event).is_err() {
            log::warn!("snapshot {request_id}: notification receiver is gone");
        }
    }
}

/// Errors returned to snapshot requesters.
#[derive(Debug)]
pub enum SnapshotError {
    /// `0` is reserved as the "no request" sentinel.
    ZeroRequestId,
    /// The staging directory does not exist and could not be created.
    StagingUnavailable { dir: PathBuf, source: io::Error },
    /// Writing the staged snapshot failed.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::ZeroRequestId => write!(f, "snapshot request id must be non-zero"),
            SnapshotError::StagingUnavailable { dir, source } => {
                write!(f, "snapshot staging directory {} unavailable: {source}", dir.display())
            }
            SnapshotError::Io { path, source } => {
                write!(f, "failed to stage snapshot {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::ZeroRequestId => None,
            SnapshotError::StagingUnavailable { source, .. } | SnapshotError::Io { source, .. } => {
                Some(source)
            }
        }
    }
}

/// Host directory holding request-scoped snapshot files.
#[derive(Clone, Debug)]
pub struct SnapshotStaging {
    dir: PathBuf,
}

impl SnapshotStaging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed. An existing directory is fine.
    pub fn ensure_ready(&self) -> Result<(), SnapshotError> {
        fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::StagingUnavailable {
            dir: self.dir.clone(),
            source,
        })
    }

    /// Where the core writes the snapshot for a save request.
    pub fn save_path(&self, request_id: u32) -> PathBuf {
        self.dir.join(abi::staging::save_file_name(request_id))
    }

    /// Where the host puts the snapshot for a load request.
    pub fn load_path(&self, request_id: u32) -> PathBuf {
        self.dir.join(abi::staging::load_file_name(request_id))
    }

    fn stage_load(&self, request_id: u32, data: &[u8]) -> Result<(), SnapshotError> {
        self.ensure_ready()?;
        let path = self.load_path(request_id);
        fs::write(&path, data).map_err(|source| SnapshotError::Io { path, source })
    }

    fn discard(path: &Path) {
        if let Err(err) = fs::remove_file(path) {
            log::debug!("could not remove staged snapshot {}: {err}", path.display());
        }
    }
}

/// Producer handle: anything that wants a snapshot saved or loaded holds one.
#[derive(Clone, Debug)]
pub struct SnapshotRequester {
    mailbox: Arc<SnapshotMailbox>,
    staging: SnapshotStaging,
}

impl SnapshotRequester {
    /// Ask the core to save its state. Fire and forget; the outcome arrives as a
    /// [`SnapshotEvent`].
    pub fn request_save(&self, request_id: u32) -> Result<(), SnapshotError> {
        if request_id == abi::snapshot_codes::NO_REQUEST {
            return Err(SnapshotError::ZeroRequestId);
        }
        self.mailbox.enqueue(SnapshotKind::Save, request_id);
        Ok(())
    }

    /// Stage `data` for the core and ask it to load it.
    ///
    /// Nothing is queued if staging fails.
    pub fn request_load(&self, request_id: u32, data: &[u8]) -> Result<(), SnapshotError> {
        if request_id == abi::snapshot_codes::NO_REQUEST {
            return Err(SnapshotError::ZeroRequestId);
        }
        self.staging.stage_load(request_id, data)?;
        self.mailbox.enqueue(SnapshotKind::Load, request_id);
        Ok(())
    }

    pub fn mailbox(&self) -> &Arc<SnapshotMailbox> {
        &self.mailbox
    }
}

/// Core-facing side: polling plus completion reporting.
pub struct SnapshotBridge {
    mailbox: Arc<SnapshotMailbox>,
    staging: SnapshotStaging,
    notifier: Box<dyn SnapshotNotifier>,
}

impl SnapshotBridge {
    pub fn new(staging: SnapshotStaging, notifier: impl SnapshotNotifier + 'static) -> Self {
        Self::with_mailbox(Arc::new(SnapshotMailbox::new()), staging, notifier)
    }

    pub fn with_mailbox(
        mailbox: Arc<SnapshotMailbox>,
        staging: SnapshotStaging,
        notifier: impl SnapshotNotifier + 'static,
    ) -> Self {
        Self {
            mailbox,
            staging,
            notifier: Box::new(notifier),
        }
    }

    /// A new producer handle sharing this bridge's mailbox and staging directory.
    pub fn requester(&self) -> SnapshotRequester {
        SnapshotRequester {
            mailbox: Arc::clone(&self.mailbox),
            staging: self.staging.clone(),
        }
    }

    pub fn mailbox(&self) -> &SnapshotMailbox {
        &self.mailbox
    }

    pub fn staging(&self) -> &SnapshotStaging {
        &self.staging
    }

    pub fn take_kind(&self) -> Option<SnapshotKind> {
        self.mailbox.peek_kind()
    }

    pub fn take_request_id(&self) -> Option<u32> {
        self.mailbox.consume_request_id()
    }

    /// The core finished writing the save file for `request_id`.
    pub fn complete_save(&mut self, request_id: u32) {
        let path = self.staging.save_path(request_id);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) => {
                self.notifier.notify(SnapshotEvent::Error {
                    request_id,
                    message: format!("failed to read {}: {err}", path.display()),
                });
                return;
            }
        };
        self.notifier.notify(SnapshotEvent::Saved { request_id, data });
        SnapshotStaging::discard(&path);
    }

    /// The core finished loading the staged file for `request_id`.
    pub fn complete_loaded(&mut self, request_id: u32) {
        self.notifier.notify(SnapshotEvent::Loaded { request_id });
        SnapshotStaging::discard(&self.staging.load_path(request_id));
    }

    /// The core gave up on `request_id`.
    pub fn complete_error(&mut self, request_id: u32, message: &str) {
        self.notifier.notify(SnapshotEvent::Error {
            request_id,
            message: message.to_owned(),
        });
    }
}
