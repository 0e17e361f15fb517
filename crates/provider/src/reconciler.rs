use crate::cache::ModelCache;
use crate::workspace::Workspace;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use svcnav_model::{ElementRef, FileHandle, ProjectId, DESCRIPTOR_FILE};

/// One pre-grouped delta from the notification source: changed files per
/// project, plus projects whose root itself disappeared.
#[derive(Debug, Default, Clone)]
pub struct ChangeBatch {
    changed: HashMap<ProjectId, HashSet<FileHandle>>,
    removed_projects: HashSet<ProjectId>,
}

impl ChangeBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, file: FileHandle) {
        self.changed
            .entry(file.project().clone())
            .or_default()
            .insert(file);
    }

    pub fn record_removed_project(&mut self, id: ProjectId) {
        self.removed_projects.insert(id);
    }

    #[must_use]
    pub fn changed(&self) -> &HashMap<ProjectId, HashSet<FileHandle>> {
        &self.changed
    }

    #[must_use]
    pub fn removed_projects(&self) -> &HashSet<ProjectId> {
        &self.removed_projects
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed_projects.is_empty()
    }
}

/// Opaque handle signaled to the UI as needing re-display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefreshTarget {
    /// Re-query the project's model rows; the root descriptor refreshes as
    /// its project.
    Project(ProjectId),
    /// Repaint a single configuration element.
    Node(ElementRef),
}

/// Maps change batches onto cached models and computes the refresh-target
/// set for the UI.
///
/// Never forces a model load: projects nobody is viewing stay
/// unmaterialized no matter how often their files change.
pub struct ChangeReconciler {
    workspace: Arc<Workspace>,
    cache: Arc<ModelCache>,
}

impl ChangeReconciler {
    pub fn new(workspace: Arc<Workspace>, cache: Arc<ModelCache>) -> Self {
        Self { workspace, cache }
    }

    /// Process one batch, aggregating a deduplicated target set across all
    /// of its projects.
    pub fn on_change_batch(&self, batch: &ChangeBatch) -> HashSet<RefreshTarget> {
        let mut targets = HashSet::new();

        for id in batch.removed_projects() {
            self.cache.invalidate(id);
            targets.insert(RefreshTarget::Project(id.clone()));
        }

        for (id, files) in batch.changed() {
            if batch.removed_projects().contains(id) {
                continue;
            }
            let project = self.workspace.project(id);
            let Some(_project) = project.filter(|p| p.root().is_dir()) else {
                // gone from the workspace, or the root itself vanished
                self.cache.invalidate(id);
                targets.insert(RefreshTarget::Project(id.clone()));
                continue;
            };

            let Some(root) = self.cache.peek(id) else {
                // No model to reconcile. A descriptor appearing may make
                // the project applicable, so let the UI re-query; anything
                // else is noise.
                if files
                    .iter()
                    .any(|file| file.base_name() == DESCRIPTOR_FILE)
                {
                    targets.insert(RefreshTarget::Project(id.clone()));
                }
                continue;
            };

            if !root.is_valid(files) {
                self.cache.invalidate(id);
                targets.insert(RefreshTarget::Project(id.clone()));
                continue;
            }

            match root.resources_changed(files) {
                Ok(Some(nodes)) => {
                    if nodes.contains_root() {
                        targets.insert(RefreshTarget::Project(id.clone()));
                    }
                    for element in nodes.elements() {
                        targets.insert(RefreshTarget::Node(ElementRef::new(Arc::clone(element))));
                    }
                }
                // descriptor mid-edit: the previous model stays visible
                Ok(None) => {}
                Err(err) => {
                    log::warn!("{id}: reconciliation aborted, keeping previous model: {err}");
                }
            }
        }

        targets
    }
}
