use crate::accessor::ConfigAccessor;
use crate::error::Result;
use crate::handle::FileHandle;
use sha2::{Digest, Sha256};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Base contract shared by the root descriptor and configuration elements.
///
/// A node is bound to exactly one source file at construction and never
/// rebinds. For UI-stability purposes two nodes are "the same node" iff
/// they are the same allocation; the reconciliation engine exists to avoid
/// allocating a replacement when nothing observable changed.
pub trait ModelNode {
    /// The source file this node was built from.
    fn file(&self) -> &FileHandle;

    /// Human-readable title.
    fn label(&self) -> String;

    /// Display qualifier derived from parsed content.
    fn qualifier(&self) -> Option<String>;
}

/// The closed set of recognized ancillary configuration files.
///
/// Variant order matches the lexical order of the file names; the child
/// mapping is keyed by this, which is what makes rebuilt listings
/// independent of discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigKind {
    Cron,
    Dispatch,
    Dos,
    Index,
    Queue,
}

impl ConfigKind {
    pub const ALL: [ConfigKind; 5] = [
        ConfigKind::Cron,
        ConfigKind::Dispatch,
        ConfigKind::Dos,
        ConfigKind::Index,
        ConfigKind::Queue,
    ];

    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            ConfigKind::Cron => "cron.yaml",
            ConfigKind::Dispatch => "dispatch.yaml",
            ConfigKind::Dos => "dos.yaml",
            ConfigKind::Index => "index.yaml",
            ConfigKind::Queue => "queue.yaml",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            ConfigKind::Cron => "Scheduled Tasks",
            ConfigKind::Dispatch => "Dispatch Routing Rules",
            ConfigKind::Dos => "Denial of Service Protection",
            ConfigKind::Index => "Datastore Indexes",
            ConfigKind::Queue => "Task Queue Definitions",
        }
    }

    /// Top-level key under which the file lists its entries.
    #[must_use]
    pub fn section_key(self) -> &'static str {
        match self {
            ConfigKind::Cron => "cron",
            ConfigKind::Dispatch => "dispatch",
            ConfigKind::Dos => "blacklist",
            ConfigKind::Index => "indexes",
            ConfigKind::Queue => "queue",
        }
    }

    #[must_use]
    pub fn from_file_name(name: &str) -> Option<ConfigKind> {
        Self::ALL.into_iter().find(|kind| kind.file_name() == name)
    }
}

/// Model element for one present ancillary configuration file.
///
/// Elements are immutable: [`ConfigElement::reload`] hands back the same
/// `Arc` while the file content is unchanged and a fresh element otherwise,
/// so object identity tracks observable change.
#[derive(Debug)]
pub struct ConfigElement {
    kind: ConfigKind,
    file: FileHandle,
    fingerprint: u64,
    entries: Option<usize>,
}

impl ConfigElement {
    pub(crate) fn from_file(
        kind: ConfigKind,
        file: FileHandle,
        accessor: &dyn ConfigAccessor,
    ) -> Result<Arc<Self>> {
        let bytes = accessor.read(&file)?;
        Ok(Arc::new(Self {
            kind,
            file,
            fingerprint: fingerprint(&bytes),
            entries: count_entries(kind, &bytes),
        }))
    }

    /// Re-derive from current file state.
    pub(crate) fn reload(self: &Arc<Self>, accessor: &dyn ConfigAccessor) -> Result<Arc<Self>> {
        let bytes = accessor.read(&self.file)?;
        if fingerprint(&bytes) == self.fingerprint {
            return Ok(Arc::clone(self));
        }
        Ok(Arc::new(Self {
            kind: self.kind,
            file: self.file.clone(),
            fingerprint: fingerprint(&bytes),
            entries: count_entries(self.kind, &bytes),
        }))
    }

    #[must_use]
    pub fn kind(&self) -> ConfigKind {
        self.kind
    }

    /// Entry count under the file's section key; `None` when the content
    /// does not parse or carries no such section.
    #[must_use]
    pub fn entries(&self) -> Option<usize> {
        self.entries
    }
}

impl ModelNode for ConfigElement {
    fn file(&self) -> &FileHandle {
        &self.file
    }

    fn label(&self) -> String {
        self.kind.title().to_string()
    }

    fn qualifier(&self) -> Option<String> {
        self.entries.map(|n| match n {
            1 => "1 entry".to_string(),
            n => format!("{n} entries"),
        })
    }
}

/// Stable truncated SHA-256 content fingerprint.
fn fingerprint(bytes: &[u8]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ])
}

fn count_entries(kind: ConfigKind, bytes: &[u8]) -> Option<usize> {
    let value: serde_yaml::Value = serde_yaml::from_slice(bytes).ok()?;
    value
        .get(kind.section_key())
        .and_then(serde_yaml::Value::as_sequence)
        .map(Vec::len)
}

/// Reference to a configuration element with pointer-identity semantics,
/// usable as a set member or map key.
#[derive(Debug, Clone)]
pub struct ElementRef(Arc<ConfigElement>);

impl ElementRef {
    #[must_use]
    pub fn new(element: Arc<ConfigElement>) -> Self {
        Self(element)
    }

    #[must_use]
    pub fn element(&self) -> &Arc<ConfigElement> {
        &self.0
    }
}

impl PartialEq for ElementRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ElementRef {}

impl Hash for ElementRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

/// Set of model nodes reported as changed by one reconciliation pass.
///
/// Elements are deduplicated by pointer identity; the root is tracked as a
/// flag since at most one exists per pass.
#[derive(Debug, Default)]
pub struct NodeSet {
    root: bool,
    elements: Vec<Arc<ConfigElement>>,
}

impl NodeSet {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub(crate) fn root_only() -> Self {
        Self {
            root: true,
            elements: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, element: Arc<ConfigElement>) {
        if !self.elements.iter().any(|e| Arc::ptr_eq(e, &element)) {
            self.elements.push(element);
        }
    }

    #[must_use]
    pub fn contains_root(&self) -> bool {
        self.root
    }

    #[must_use]
    pub fn elements(&self) -> &[Arc<ConfigElement>] {
        &self.elements
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.root && self.elements.is_empty()
    }
}
