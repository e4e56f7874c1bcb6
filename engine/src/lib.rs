//! # Colsync Engine
//!
//! A deterministic sync engine for ordered lists and unordered sets of scalar
//! values.
//!
//! This crate holds the core logic for offline-first collection sync. It
//! captures local changes as operations, orders them through a sync service
//! and replays the ordered log on every replica with guaranteed determinism:
//! the same log always produces the same state.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of files, network, or platform
//! - **Deterministic**: Same log always produces same state
//! - **Testable**: Pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Objects and collections
//!
//! A [`SyncObject`] is identified by a primary key and owns one [`List`] and
//! one [`Set`] per scalar type described by its [`Schema`]. Elements are
//! [`Value`]s, including `Null` for `any` properties.
//!
//! ### Operations
//!
//! Every local mutation is captured inside a write transaction as one
//! [`Operation`]. Operations name list elements by [`ElementId`], never by
//! index, and name set operands by property, so they stay meaningful after
//! other replicas' changes are merged in.
//!
//! ### Sequencing and replay
//!
//! The [`SyncService`] gives every accepted operation a sequence number per
//! partition. Replicas download the sequenced log and the [`Reconciler`]
//! replays it in order. Conflicts are settled by that order; an operation
//! whose target was removed earlier in the log is discarded as a no-op.
//!
//! ## Quick Start
//!
//! ```rust
//! use colsync_engine::{DownloadQuery, Schema, Store, SyncService};
//!
//! let schema = Schema::collection_sync_object();
//! let mut service = SyncService::new(schema.clone());
//! let mut child = Store::new(schema.clone(), "child", "partition");
//! let mut parent = Store::new(schema, "parent", "partition");
//!
//! // 1. Write locally
//! child
//!     .write(|s| {
//!         s.create_object("pk")?;
//!         s.list_append("pk", "intList", [1, 2, 3])
//!     })
//!     .unwrap();
//!
//! // 2. Upload pending operations
//! let ack = service.upload("partition", &child.upload_request());
//! child.acknowledge(&ack);
//!
//! // 3. Download on another replica
//! let batch = service.download("partition", DownloadQuery::default());
//! parent.integrate(batch).unwrap();
//!
//! assert_eq!(parent.list("pk", "intList").unwrap().len(), 3);
//! ```
//!
//! ## Persistence
//!
//! Use [`Store::export_state`] and [`Store::import_state`] with [`StoreSnapshot`]
//! for persistence. Snapshots are serializable to JSON with deterministic ordering.

pub mod clock;
pub mod error;
pub mod list;
pub mod object;
pub mod operation;
pub mod protocol;
pub mod reconcile;
pub mod schema;
pub mod service;
pub mod set;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod value;

// Re-export main types at crate root
pub use clock::LogicalClock;
pub use error::{Error, Result};
pub use list::List;
pub use object::{Metadata, Origin, SyncObject};
pub use operation::{ElementId, Operation, OperationId, OperationKind, SequencedOp};
pub use protocol::{AcceptedOp, DownloadBatch, DownloadQuery, UploadAck, UploadRequest};
pub use reconcile::{ReconcileResult, Reconciler, SkippedOp};
pub use schema::{CollectionKind, ObjectSchema, PropertyDef, Schema};
pub use service::{PartitionLog, SyncService, DEFAULT_DOWNLOAD_LIMIT, MAX_DOWNLOAD_LIMIT};
pub use set::Set;
pub use snapshot::{SnapshotMetadata, StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use state::{ApplyOutcome, PartitionState};
pub use store::{CollectionState, PendingOp, Store};
pub use value::{Decimal128, ObjectId, Value, ValueType};

/// Type aliases for clarity
pub type PrimaryKey = String;
pub type PropertyName = String;
pub type PartitionKey = String;
pub type NodeId = String;
pub type Timestamp = u64;
pub type SeqNo = u64;
pub type SchemaVersion = u32;
