//! # pathmover
//!
//! Resilient directory moving between local and remote file stores,
//! built around a supervised rsync subprocess.
//!
//! ## Core Features
//!
//! - **Supervised copying**: An activity monitor watches the destination
//!   and kills the copy process when the transfer stalls
//! - **Resumable transfers**: Incremental rsync with `--append` where the
//!   installed rsync supports it, whole-file mode otherwise
//! - **Hard-link copies**: Immutable directory snapshots via
//!   `--link-dest`, no data duplicated on disk
//! - **Bounded retries**: Fixed-backoff retry for copies, moves, and
//!   removals, with fatal errors aborting immediately
//! - **Crash recovery**: Zero-byte marker files checkpoint the
//!   move-and-clean sequence; an interrupted run resumes without
//!   re-copying
//! - **Safe by construction**: The source is deleted only after a
//!   confirmed-complete copy
//!
//! ## Quick Start
//!
//! ```no_run
//! use pathmover::{
//!     LocalStore, RemotePathMover, RemoteStore, RsyncCopier, StoreItem, TimingParameters,
//! };
//! use std::sync::Arc;
//!
//! let copier = Arc::new(RsyncCopier::new("/usr/bin/rsync").with_ssh_executable("/usr/bin/ssh"));
//! let mover = RemotePathMover::new(
//!     Arc::new(LocalStore::new("/data/outgoing")),
//!     Arc::new(RemoteStore::new("archive-host", "/vol/archive")),
//!     copier,
//!     TimingParameters::default(),
//! )?;
//!
//! if mover.handle(&StoreItem::new("run-17")) {
//!     println!("run-17 moved and marked finished");
//! }
//! # Ok::<(), pathmover::Error>(())
//! ```
//!
//! ## Error Model
//!
//! Two layers, deliberately separate:
//!
//! | Layer | Type | Meaning |
//! |-------|------|---------|
//! | Setup | [`Error`] | Missing/too-old rsync, invalid configuration |
//! | Runtime | [`Status`] | Per-item outcomes: OK, retriable, fatal |
//!
//! A failed item is never silently dropped: it stays in the source store
//! and the give-up is logged at error level for an operator.
//!
//! ## Logging
//!
//! All components log through [`tracing`]: `trace`/`debug` for process
//! and timing detail, `info`/`warn` for operational progress and
//! retries, `error` strictly for final give-ups that need human
//! attention.
//!
//! ## Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Serialize/Deserialize for [`TimingParameters`] |

#![cfg_attr(docsrs, feature(doc_cfg))]

mod bounded;
mod copier;
mod error;
mod monitor;
mod mover;
mod process;
mod retry;
pub mod rsync;
mod status;
mod store;
mod timing;

pub use copier::{DestinationMode, PathCopier};
pub use error::{Error, Result};
pub use monitor::{ActivityMonitor, MonitorHandle, MonitorState};
pub use mover::RemotePathMover;
pub use process::{ProcessHandle, ProcessResult, ProcessRunner, Terminable};
pub use retry::{RetryOutcome, RetryingOperation};
pub use rsync::RsyncCopier;
pub use rsync::version::RsyncVersion;
pub use status::{Status, StatusKind};
pub use store::{
    ExtendedFileStore, FileStore, LocalStore, RemoteMountedStore, RemoteStore, StoreItem,
    DELETION_IN_PROGRESS_PREFIX, FINISHED_PREFIX,
};
pub use timing::TimingParameters;
