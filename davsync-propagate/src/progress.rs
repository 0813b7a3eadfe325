use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::item::{Status, SyncItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    StartUpload,
    StartDownload,
    Context,
    EndUpload,
    EndDownload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Progress {
        kind: ProgressKind,
        file: String,
        current: u64,
        total: u64,
    },
    Completed {
        item: SyncItem,
        status: Status,
    },
    Finished {
        status: Status,
    },
}

/// Fire-and-forget event publisher. A dropped receiver silently discards
/// events; jobs never block on observers.
#[derive(Clone, Default)]
pub struct Reporter {
    tx: Option<UnboundedSender<Event>>,
}

impl Reporter {
    pub fn channel() -> (Self, UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn progress(&self, kind: ProgressKind, file: &str, current: u64, total: u64) {
        self.send(Event::Progress {
            kind,
            file: file.to_string(),
            current,
            total,
        });
    }

    pub fn completed(&self, item: SyncItem, status: Status) {
        self.send(Event::Completed { item, status });
    }

    pub fn finished(&self, status: Status) {
        self.send(Event::Finished { status });
    }

    fn send(&self, event: Event) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
