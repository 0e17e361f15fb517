//! # svcnav provider
//!
//! Keeps cached configuration models in sync with filesystem change
//! notifications and exposes them through a tree-provider protocol.
//!
//! ## Flow
//!
//! ```text
//! notify events
//!     │
//!     ├──> ChangeSource (debounce, group by project)
//!     │      └─> ChangeBatch
//!     │
//!     ├──> ChangeReconciler (peek cache, isValid / resourcesChanged)
//!     │      └─> RefreshTarget set
//!     │
//!     └──> RefreshDispatcher ──> UI observers
//! ```
//!
//! Models are materialized only through [`TreeModelProvider`] reads; change
//! processing never forces a load.

mod cache;
mod dispatch;
mod error;
mod reconciler;
mod tree;
mod watch;
mod workspace;

pub use cache::ModelCache;
pub use dispatch::RefreshDispatcher;
pub use error::{ProviderError, Result};
pub use reconciler::{ChangeBatch, ChangeReconciler, RefreshTarget};
pub use tree::{TreeItem, TreeModelProvider};
pub use watch::{ChangeSource, ChangeSourceConfig};
pub use workspace::Workspace;
