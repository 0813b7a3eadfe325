use std::env;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use davsync_core::{ChunkOutcome, DavClient, DavError, etag_from_headers};
use flate2::write::GzDecoder;
use futures_util::StreamExt;
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bandwidth::Limiter;
use crate::item::{Instruction, Status, SyncItem};
use crate::journal::{DownloadInfo, FileRecord, Journal, UploadInfo};
use crate::localfs;
use crate::paths;
use crate::planner::{self, DirectoryJob, ItemJob, Job, JobKind};
use crate::progress::{Event, ProgressKind, Reporter};
use crate::status::{classify_dav_error, classify_http, classify_transport};

const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;
const MAX_SOURCE_CHANGE_RETRIES: u32 = 30;
const MAX_UPLOAD_ATTEMPTS: u32 = 10;
const MAX_DOWNLOAD_TIMEOUT_RETRIES: u32 = 3;
const SOURCE_CHANGE_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct PropagateConfig {
    /// Upper bound on the bytes carried by one chunk PUT.
    pub chunk_size: u64,
    /// Signed upload rate: > 0 is bytes/second, (-100, 0) a percentage,
    /// anything else disables shaping.
    pub upload_limit: i64,
    pub download_limit: i64,
}

impl Default for PropagateConfig {
    fn default() -> Self {
        Self {
            chunk_size: read_chunk_size("DAVSYNC_CHUNK_SIZE", DEFAULT_CHUNK_SIZE),
            upload_limit: read_rate("DAVSYNC_UPLOAD_LIMIT", 0),
            download_limit: read_rate("DAVSYNC_DOWNLOAD_LIMIT", 0),
        }
    }
}

/// Executes a synchronization plan as an ordered tree of jobs.
///
/// Jobs run sequentially: the journal and the local tree have exactly one
/// mutator, so neither needs locking. Cancellation is cooperative through
/// the shared token, observed between jobs and at chunk boundaries.
pub struct Propagator {
    client: DavClient,
    journal: Journal,
    local_root: PathBuf,
    config: PropagateConfig,
    abort: CancellationToken,
    events: Reporter,
}

impl Propagator {
    pub fn new(client: DavClient, journal: Journal, local_root: PathBuf) -> Self {
        Self {
            client,
            journal,
            local_root,
            config: PropagateConfig::default(),
            abort: CancellationToken::new(),
            events: Reporter::disabled(),
        }
    }

    pub fn with_config(mut self, config: PropagateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Clones the cancellation handle. Cancelling it makes the in-flight
    /// transfer fail with "Aborted by user" and every later job terminate
    /// without touching the remote; resume state stays journaled.
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Installs an event channel and hands back the receiving end.
    pub fn subscribe(&mut self) -> UnboundedReceiver<Event> {
        let (reporter, rx) = Reporter::channel();
        self.events = reporter;
        rx
    }

    /// Runs the whole plan and reports the aggregate status.
    pub async fn run(&self, items: Vec<SyncItem>) -> Status {
        let root = planner::plan(items);
        let status = self.run_directory(root).await;
        self.events.finished(status.clone());
        status
    }

    fn run_job<'a>(&'a self, job: Job) -> Pin<Box<dyn Future<Output = Status> + Send + 'a>> {
        Box::pin(async move {
            match job {
                Job::Directory(dir) => self.run_directory(dir).await,
                Job::Item(leaf) => self.run_item(leaf).await,
            }
        })
    }

    async fn run_directory(&self, dir: DirectoryJob) -> Status {
        let mut has_error = false;
        if let Some(first) = dir.first {
            match self.run_item(first).await {
                Status::FatalError(message) => return Status::FatalError(message),
                status if status.is_error() => has_error = true,
                _ => {}
            }
        }
        for child in dir.children {
            match self.run_job(child).await {
                Status::FatalError(message) => return Status::FatalError(message),
                status if status.is_error() => has_error = true,
                _ => {}
            }
        }
        if has_error {
            return Status::NormalError(String::new());
        }
        if let Some(item) = dir.item {
            let local = paths::local_path_for(&self.local_root, &item.file);
            let record = FileRecord::from_item(&item, &local);
            if let Err(err) = self.journal.set_file_record(&record).await {
                return Status::NormalError(err.to_string());
            }
        }
        Status::Success
    }

    async fn run_item(&self, job: ItemJob) -> Status {
        let ItemJob { mut item, kind } = job;
        let status = if self.abort.is_cancelled() {
            Status::NormalError("Aborted by user".into())
        } else {
            match kind {
                JobKind::LocalRemove => self.local_remove(&mut item).await,
                JobKind::LocalMkdir => self.local_mkdir(&item).await,
                JobKind::LocalRename => self.local_rename(&mut item).await,
                JobKind::RemoteRemove => self.remote_remove(&item).await,
                JobKind::RemoteMkdir => self.remote_mkdir(&item).await,
                JobKind::RemoteRename => self.remote_rename(&mut item).await,
                JobKind::Upload => self.upload_file(&mut item).await,
                JobKind::Download => self.download_file(&mut item).await,
                JobKind::Ignore => Status::Success,
            }
        };
        self.events.completed(item, status.clone());
        status
    }
}

include!("propagate_jobs.rs");
include!("propagate_transfer.rs");

/// Outcome of one download dispatch, before finalization.
enum FetchOutcome {
    /// Body fully streamed; carries the response ETag if one was sent.
    Done(Option<String>),
    RetryTimeout(String),
    Failed(Status),
}

/// Streams a response body into the temp file, unwrapping gzip when the
/// server compressed the payload.
enum BodySink {
    Plain(std::fs::File),
    Gzip(GzDecoder<std::fs::File>),
}

impl BodySink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<()> {
        use std::io::Write;
        match self {
            BodySink::Plain(file) => file.write_all(buf),
            BodySink::Gzip(decoder) => decoder.write_all(buf),
        }
    }

    fn finish(self) -> std::io::Result<()> {
        match self {
            BodySink::Plain(file) => file.sync_all(),
            BodySink::Gzip(decoder) => decoder.finish()?.sync_all(),
        }
    }
}

async fn read_chunk(
    file: &mut tokio::fs::File,
    offset: u64,
    len: usize,
) -> std::io::Result<Vec<u8>> {
    file.seek(std::io::SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}

fn unix_mtime(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn read_rate(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

fn read_chunk_size(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
