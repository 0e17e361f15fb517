use crate::cache::ModelCache;
use crate::dispatch::RefreshDispatcher;
use crate::reconciler::RefreshTarget;
use crate::workspace::Workspace;
use std::collections::HashSet;
use std::sync::Arc;
use svcnav_model::{ElementRef, ModelNode, ProjectId, RootDescriptor};
use tokio::sync::broadcast;

/// One row in the tree.
#[derive(Debug, Clone)]
pub enum TreeItem {
    Project(ProjectId),
    Root(Arc<RootDescriptor>),
    Element(ElementRef),
}

/// Tree-provider protocol over the cached models.
///
/// To avoid unnecessary repaints the provider strives to hand back the
/// same `Arc`s between calls for anything that did not change; observers
/// are told which handles to re-query via [`TreeModelProvider::subscribe`].
pub struct TreeModelProvider {
    workspace: Arc<Workspace>,
    cache: Arc<ModelCache>,
    dispatcher: RefreshDispatcher,
}

impl TreeModelProvider {
    pub fn new(
        workspace: Arc<Workspace>,
        cache: Arc<ModelCache>,
        dispatcher: RefreshDispatcher,
    ) -> Self {
        Self {
            workspace,
            cache,
            dispatcher,
        }
    }

    /// Top-level model rows for a project, forcing a load. Empty when the
    /// project is closed or not applicable.
    #[must_use]
    pub fn roots(&self, id: &ProjectId) -> Vec<TreeItem> {
        let Some(project) = self.workspace.project(id) else {
            return Vec::new();
        };
        match self.cache.get(&project) {
            Some(root) => vec![TreeItem::Root(root)],
            None => Vec::new(),
        }
    }

    #[must_use]
    pub fn children(&self, item: &TreeItem) -> Vec<TreeItem> {
        match item {
            TreeItem::Project(id) => self.roots(id),
            TreeItem::Root(root) => root
                .configurations()
                .into_iter()
                .map(|element| TreeItem::Element(ElementRef::new(element)))
                .collect(),
            TreeItem::Element(_) => Vec::new(),
        }
    }

    /// Optimistically `true` for an open project whose model has not been
    /// materialized yet: expansion is what triggers the load.
    #[must_use]
    pub fn has_children(&self, item: &TreeItem) -> bool {
        match item {
            TreeItem::Project(id) => match self.cache.peek(id) {
                Some(root) => root.has_configurations(),
                None => self.workspace.contains(id),
            },
            TreeItem::Root(root) => root.has_configurations(),
            TreeItem::Element(_) => false,
        }
    }

    #[must_use]
    pub fn parent(&self, item: &TreeItem) -> Option<TreeItem> {
        match item {
            TreeItem::Project(_) => None,
            TreeItem::Root(root) => Some(TreeItem::Project(root.project().id().clone())),
            TreeItem::Element(element) => self
                .cache
                .peek(element.element().file().project())
                .map(TreeItem::Root),
        }
    }

    /// Observer registration for refresh pushes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HashSet<RefreshTarget>> {
        self.dispatcher.subscribe()
    }

    /// Drop a project from the workspace, evict its model and tell
    /// observers to re-query; they will find nothing.
    pub fn close_project(&self, id: &ProjectId) {
        self.workspace.close(id);
        self.cache.invalidate(id);
        let mut targets = HashSet::new();
        targets.insert(RefreshTarget::Project(id.clone()));
        self.dispatcher.dispatch(targets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use svcnav_model::{ConfigKind, FsAccessor, DESCRIPTOR_FILE};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        provider: TreeModelProvider,
        id: ProjectId,
    }

    impl Fixture {
        fn new(descriptor: Option<&str>) -> Self {
            let temp = TempDir::new().expect("tempdir");
            if let Some(content) = descriptor {
                std::fs::write(temp.path().join(DESCRIPTOR_FILE), content).expect("write");
            }
            let workspace = Arc::new(Workspace::new());
            let project = workspace.open("web", temp.path());
            let cache = Arc::new(ModelCache::new(Arc::new(FsAccessor)));
            let provider =
                TreeModelProvider::new(workspace, cache, RefreshDispatcher::default());
            Self {
                _temp: temp,
                provider,
                id: project.id().clone(),
            }
        }
    }

    #[test]
    fn roots_expose_the_model_once() {
        let fx = Fixture::new(Some("runtime: rust\n"));
        std::fs::write(fx._temp.path().join("cron.yaml"), "cron: []\n").expect("write");

        let roots = fx.provider.roots(&fx.id);
        assert_eq!(roots.len(), 1);
        let TreeItem::Root(root) = &roots[0] else {
            panic!("expected a root item");
        };

        let children = fx.provider.children(&roots[0]);
        assert_eq!(children.len(), 1);
        let TreeItem::Element(element) = &children[0] else {
            panic!("expected an element item");
        };
        assert!(fx.provider.children(&children[0]).is_empty());

        // parent links close the loop
        match fx.provider.parent(&children[0]) {
            Some(TreeItem::Root(parent)) => assert!(Arc::ptr_eq(&parent, root)),
            other => panic!("unexpected parent: {other:?}"),
        }
        match fx.provider.parent(&roots[0]) {
            Some(TreeItem::Project(id)) => assert_eq!(id, fx.id),
            other => panic!("unexpected parent: {other:?}"),
        }
        assert_eq!(element.element().kind(), ConfigKind::Cron);
    }

    #[test]
    fn inapplicable_project_has_no_roots() {
        let fx = Fixture::new(None);
        assert!(fx.provider.roots(&fx.id).is_empty());
    }

    #[test]
    fn has_children_is_optimistic_before_the_first_load() {
        let fx = Fixture::new(Some("runtime: rust\n"));
        let item = TreeItem::Project(fx.id.clone());
        assert!(fx.provider.has_children(&item));

        // once materialized the answer is exact
        fx.provider.roots(&fx.id);
        assert!(!fx.provider.has_children(&item));
    }

    #[tokio::test]
    async fn close_project_evicts_and_notifies() {
        let fx = Fixture::new(Some("runtime: rust\n"));
        fx.provider.roots(&fx.id);
        let mut observer = fx.provider.subscribe();

        fx.provider.close_project(&fx.id);
        assert!(fx.provider.roots(&fx.id).is_empty());

        let targets = observer.recv().await.expect("received");
        assert!(targets.contains(&RefreshTarget::Project(fx.id.clone())));
    }
}
