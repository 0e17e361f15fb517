use dashmap::DashMap;
use std::path::Path;
use svcnav_model::{Project, ProjectId};

/// Concurrent registry of open projects.
///
/// Closing a project is the explicit lifecycle event that replaces
/// weak-key reclamation: the provider evicts the model cache entry for a
/// closed project instead of waiting for its key to become unreachable.
#[derive(Debug, Default)]
pub struct Workspace {
    projects: DashMap<ProjectId, Project>,
}

impl Workspace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project rooted at `root`.
    ///
    /// The root is canonicalized so paths reported by the notification
    /// source compare equal to resolved file handles.
    pub fn open(&self, name: &str, root: impl AsRef<Path>) -> Project {
        let root = root.as_ref();
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let project = Project::new(ProjectId::new(name), root);
        self.projects.insert(project.id().clone(), project.clone());
        project
    }

    pub fn close(&self, id: &ProjectId) -> Option<Project> {
        self.projects.remove(id).map(|(_, project)| project)
    }

    #[must_use]
    pub fn project(&self, id: &ProjectId) -> Option<Project> {
        self.projects.get(id).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn contains(&self, id: &ProjectId) -> bool {
        self.projects.contains_key(id)
    }

    #[must_use]
    pub fn projects(&self) -> Vec<Project> {
        self.projects
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Project owning the given path, preferring the longest matching root
    /// when workspaces nest.
    #[must_use]
    pub fn project_for_path(&self, path: &Path) -> Option<Project> {
        self.projects
            .iter()
            .filter(|entry| entry.value().contains(path))
            .max_by_key(|entry| entry.value().root().as_os_str().len())
            .map(|entry| entry.value().clone())
    }
}
