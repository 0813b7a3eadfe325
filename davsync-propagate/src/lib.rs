pub mod bandwidth;
pub mod item;
pub mod journal;
pub mod localfs;
pub mod paths;
pub mod planner;
pub mod progress;
pub mod propagator;
pub mod status;

pub use item::{Direction, Instruction, Status, SyncItem};
pub use journal::{DownloadInfo, FileKind, FileRecord, Journal, JournalError, UploadInfo};
pub use progress::{Event, ProgressKind};
pub use propagator::{PropagateConfig, Propagator};
