use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opaque identity of a project-like container.
///
/// Cheap to clone and hash; used as the model-cache key throughout.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectId(Arc<str>);

impl ProjectId {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A project registered with the workspace: identity plus filesystem root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    id: ProjectId,
    root: PathBuf,
}

impl Project {
    pub fn new(id: ProjectId, root: impl Into<PathBuf>) -> Self {
        Self {
            id,
            root: root.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the given path lies under this project's root.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Handle for a path inside this project.
    #[must_use]
    pub fn handle(&self, path: impl Into<PathBuf>) -> FileHandle {
        FileHandle::new(self.id.clone(), path)
    }
}

/// Identifies a single file by (project, path).
///
/// Two handles are equal iff they name the same file. Existence is queried
/// at point of use, never cached on the handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle {
    project: ProjectId,
    path: PathBuf,
}

impl FileHandle {
    pub fn new(project: ProjectId, path: impl Into<PathBuf>) -> Self {
        Self {
            project,
            path: path.into(),
        }
    }

    #[must_use]
    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, the logical name the file resolves under.
    #[must_use]
    pub fn base_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}
