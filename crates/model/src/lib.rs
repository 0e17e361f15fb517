//! # svcnav model
//!
//! Derived in-memory model of a project's service-configuration artifacts.
//!
//! ## Shape
//!
//! ```text
//! Project root
//!     │
//!     ├──> service.yaml ─────────> RootDescriptor (attributes + children)
//!     │
//!     └──> cron.yaml, queue.yaml, ... ──> ConfigElement (one per present file)
//! ```
//!
//! The model holds no persistent state: it is rebuilt from the filesystem
//! on demand and reconciled in place against batches of changed-file
//! notifications. Reconciliation preserves `Arc` identity for every node
//! whose observable state did not change, so a tree UI never repaints
//! unaffected rows.

mod accessor;
mod descriptor;
mod error;
mod handle;
mod node;
mod root;

pub use accessor::{is_layout_file, ConfigAccessor, FsAccessor, LAYOUT_FILE};
pub use descriptor::{
    ServiceDescriptor, DEFAULT_RUNTIME, DEFAULT_SERVICE, DESCRIPTOR_FILE,
};
pub use error::{ModelError, ParseError, Result};
pub use handle::{FileHandle, Project, ProjectId};
pub use node::{ConfigElement, ConfigKind, ElementRef, ModelNode, NodeSet};
pub use root::RootDescriptor;
