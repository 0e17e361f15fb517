use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use svcnav_model::{ConfigAccessor, Project, ProjectId, RootDescriptor};

/// Memoizing map from project identity to its root descriptor.
///
/// `get` loads lazily and memoizes; `peek` never loads, so change
/// processing cannot accidentally materialize a model for a project nobody
/// is viewing. A failed load caches nothing. Entries are evicted
/// explicitly via [`ModelCache::invalidate`]; there is no capacity bound.
pub struct ModelCache {
    accessor: Arc<dyn ConfigAccessor>,
    entries: DashMap<ProjectId, Arc<RootDescriptor>>,
}

impl ModelCache {
    pub fn new(accessor: Arc<dyn ConfigAccessor>) -> Self {
        Self {
            accessor,
            entries: DashMap::new(),
        }
    }

    /// Memoized lookup, loading on first use.
    ///
    /// `None` means the project has no applicable descriptor.
    pub fn get(&self, project: &Project) -> Option<Arc<RootDescriptor>> {
        match self.entries.entry(project.id().clone()) {
            Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
            Entry::Vacant(slot) => {
                let root = RootDescriptor::load(project.clone(), Arc::clone(&self.accessor))?;
                slot.insert(Arc::clone(&root));
                Some(root)
            }
        }
    }

    /// Current entry, never forcing a load.
    #[must_use]
    pub fn peek(&self, id: &ProjectId) -> Option<Arc<RootDescriptor>> {
        self.entries.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn invalidate(&self, id: &ProjectId) {
        self.entries.remove(id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
