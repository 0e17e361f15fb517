use crate::accessor::{is_layout_file, ConfigAccessor};
use crate::descriptor::{ServiceDescriptor, DESCRIPTOR_FILE};
use crate::error::Result;
use crate::handle::{FileHandle, Project};
use crate::node::{ConfigElement, ConfigKind, ModelNode, NodeSet};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Root of a project's configuration model.
///
/// Owns the parsed descriptor attributes and the keyed mapping of
/// ancillary configuration elements, and reconciles both against batches
/// of changed-file notifications. The mapping and attributes are guarded
/// by one mutex per instance: reconciliation and UI reads of the same
/// model may race.
///
/// Ancillary configuration is defined to belong only to the default
/// service; a non-default service always has an empty child mapping.
pub struct RootDescriptor {
    project: Project,
    /// The descriptor file this model is bound to. A model never rebinds:
    /// once resolution yields a different file, [`RootDescriptor::is_valid`]
    /// turns false and the cache entry is rebuilt from scratch.
    descriptor_file: FileHandle,
    accessor: Arc<dyn ConfigAccessor>,
    state: Mutex<RootState>,
}

struct RootState {
    descriptor: ServiceDescriptor,
    configurations: BTreeMap<ConfigKind, Arc<ConfigElement>>,
}

impl RootDescriptor {
    /// Locate and parse the project's descriptor and populate the child
    /// mapping.
    ///
    /// `None` means the project has no readable, well-formed descriptor:
    /// not an applicable project rather than an error.
    pub fn load(project: Project, accessor: Arc<dyn ConfigAccessor>) -> Option<Arc<Self>> {
        let descriptor_file = accessor.resolve(&project, DESCRIPTOR_FILE)?;
        if !accessor.exists(&descriptor_file) {
            return None;
        }
        let bytes = match accessor.read(&descriptor_file) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::debug!("{}: unreadable {DESCRIPTOR_FILE}: {err}", project.id());
                return None;
            }
        };
        let descriptor = match ServiceDescriptor::parse(&bytes) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                log::debug!("{}: malformed {DESCRIPTOR_FILE}: {err}", project.id());
                return None;
            }
        };

        let root = Arc::new(Self {
            project,
            descriptor_file,
            accessor,
            state: Mutex::new(RootState {
                descriptor,
                configurations: BTreeMap::new(),
            }),
        });
        {
            let mut state = root.state.lock();
            if let Err(err) = root.rebuild_configurations(&mut state) {
                log::debug!(
                    "{}: failed to probe configuration files: {err}",
                    root.project.id()
                );
                return None;
            }
        }
        Some(root)
    }

    #[must_use]
    pub fn project(&self) -> &Project {
        &self.project
    }

    #[must_use]
    pub fn descriptor(&self) -> ServiceDescriptor {
        self.state.lock().descriptor.clone()
    }

    /// Current child elements, in recognized-name order.
    #[must_use]
    pub fn configurations(&self) -> Vec<Arc<ConfigElement>> {
        self.state.lock().configurations.values().cloned().collect()
    }

    #[must_use]
    pub fn has_configurations(&self) -> bool {
        !self.state.lock().configurations.is_empty()
    }

    /// Whether this model can still absorb changes, or must be evicted and
    /// rebuilt.
    ///
    /// False once the bound descriptor file no longer exists, or when a
    /// changed file means resolution now yields a different descriptor
    /// than the one this model is bound to.
    #[must_use]
    pub fn is_valid(&self, changed: &HashSet<FileHandle>) -> bool {
        if !self.accessor.exists(&self.descriptor_file) {
            return false;
        }
        // A layout edit, or a descriptor appearing at another location, can
        // redirect resolution away from the bound file.
        let needs_reresolve = changed.iter().any(|file| {
            is_layout_file(file)
                || (file.base_name() == DESCRIPTOR_FILE && *file != self.descriptor_file)
        });
        if needs_reresolve {
            return self
                .accessor
                .resolve(&self.project, DESCRIPTOR_FILE)
                .as_ref()
                == Some(&self.descriptor_file);
        }
        true
    }

    /// Apply a batch of changed files and return the nodes whose
    /// observable state changed. Callers must have checked
    /// [`RootDescriptor::is_valid`] first.
    ///
    /// `None` means the descriptor failed to parse (mid-edit); the
    /// previous model stays published. I/O failures propagate, and the
    /// caller must likewise publish nothing.
    pub fn resources_changed(&self, changed: &HashSet<FileHandle>) -> Result<Option<NodeSet>> {
        let mut state = self.state.lock();

        // A descriptor edit dominates the batch: every attribute and child
        // binding may be different afterwards.
        if changed.contains(&self.descriptor_file) {
            let bytes = self.accessor.read(&self.descriptor_file)?;
            let descriptor = match ServiceDescriptor::parse(&bytes) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    log::debug!(
                        "{}: {DESCRIPTOR_FILE} mid-edit, keeping previous model: {err}",
                        self.project.id()
                    );
                    return Ok(None);
                }
            };
            state.descriptor = descriptor;
            self.rebuild_configurations(&mut state)?;
            return Ok(Some(NodeSet::root_only()));
        }

        // Targeted pass: reload children whose bound file changed, and note
        // any recognized name whose current binding no longer lines up.
        let mut replaced = NodeSet::new();
        let mut structural = Self::has_layout_changed(changed);
        for file in changed {
            let Some(kind) = ConfigKind::from_file_name(file.base_name()) else {
                continue;
            };
            let current = state.configurations.get(&kind).cloned();
            match current {
                Some(existing) if existing.file() == file => {
                    if !self.accessor.exists(file) {
                        structural = true;
                        continue;
                    }
                    let reloaded = existing.reload(self.accessor.as_ref())?;
                    if !Arc::ptr_eq(&existing, &reloaded) {
                        state.configurations.insert(kind, Arc::clone(&reloaded));
                        replaced.insert(reloaded);
                    }
                }
                // A file appeared that we do not track, or the tracked
                // binding for its name differs: the child list itself may
                // be different. Only the default service carries children,
                // so anything else is noise.
                _ if state.descriptor.is_default_service() => structural = true,
                _ => {}
            }
        }

        if structural && self.rebuild_configurations(&mut state)? {
            return Ok(Some(NodeSet::root_only()));
        }
        Ok(Some(replaced))
    }

    /// Recompute the child mapping from current file state; returns whether
    /// any entry was added, removed, or replaced.
    ///
    /// Entries keep their element instance when both binding and content
    /// are unchanged. A non-default service unconditionally clears the
    /// mapping.
    fn rebuild_configurations(&self, state: &mut RootState) -> Result<bool> {
        if !state.descriptor.is_default_service() {
            let had_children = !state.configurations.is_empty();
            state.configurations.clear();
            return Ok(had_children);
        }

        let mut changed = false;
        for kind in ConfigKind::ALL {
            let resolved = self
                .accessor
                .resolve(&self.project, kind.file_name())
                .filter(|file| self.accessor.exists(file));
            match resolved {
                None => {
                    changed |= state.configurations.remove(&kind).is_some();
                }
                Some(file) => {
                    let current = state.configurations.get(&kind).cloned();
                    let next = match current {
                        Some(existing) if *existing.file() == file => {
                            existing.reload(self.accessor.as_ref())?
                        }
                        _ => ConfigElement::from_file(kind, file, self.accessor.as_ref())?,
                    };
                    let replaced = match state.configurations.get(&kind) {
                        Some(existing) => !Arc::ptr_eq(existing, &next),
                        None => true,
                    };
                    if replaced {
                        state.configurations.insert(kind, next);
                        changed = true;
                    }
                }
            }
        }
        Ok(changed)
    }

    fn has_layout_changed(changed: &HashSet<FileHandle>) -> bool {
        changed.iter().any(is_layout_file)
    }
}

impl ModelNode for RootDescriptor {
    fn file(&self) -> &FileHandle {
        &self.descriptor_file
    }

    fn label(&self) -> String {
        "Service".to_string()
    }

    fn qualifier(&self) -> Option<String> {
        Some(self.state.lock().descriptor.runtime_label().to_string())
    }
}

impl fmt::Debug for RootDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootDescriptor")
            .field("project", &self.project)
            .field("descriptor_file", &self.descriptor_file)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ProjectId;
    use parking_lot::RwLock;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io;
    use std::path::PathBuf;

    /// In-memory accessor: a flat name -> content map per project, with a
    /// switch to make reads fail.
    #[derive(Default)]
    struct StubAccessor {
        files: RwLock<HashMap<String, Vec<u8>>>,
        fail_reads: RwLock<bool>,
    }

    impl StubAccessor {
        fn put(&self, name: &str, content: &[u8]) {
            self.files
                .write()
                .insert(name.to_string(), content.to_vec());
        }

        fn remove(&self, name: &str) {
            self.files.write().remove(name);
        }

        fn set_fail_reads(&self, fail: bool) {
            *self.fail_reads.write() = fail;
        }
    }

    impl ConfigAccessor for StubAccessor {
        fn resolve(&self, project: &Project, name: &str) -> Option<FileHandle> {
            Some(project.handle(PathBuf::from("/stub").join(name)))
        }

        fn exists(&self, handle: &FileHandle) -> bool {
            self.files.read().contains_key(handle.base_name())
        }

        fn read(&self, handle: &FileHandle) -> io::Result<Vec<u8>> {
            if *self.fail_reads.read() {
                return Err(io::Error::new(io::ErrorKind::Other, "injected failure"));
            }
            self.files
                .read()
                .get(handle.base_name())
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, handle.base_name().to_string()))
        }
    }

    fn fixture() -> (Arc<StubAccessor>, Project) {
        let accessor = Arc::new(StubAccessor::default());
        accessor.put(DESCRIPTOR_FILE, b"runtime: rust\n");
        (accessor, Project::new(ProjectId::new("web"), "/stub"))
    }

    fn changed(root: &RootDescriptor, names: &[&str]) -> HashSet<FileHandle> {
        names
            .iter()
            .map(|name| {
                root.project()
                    .handle(PathBuf::from("/stub").join(name))
            })
            .collect()
    }

    #[test]
    fn load_without_descriptor_is_not_applicable() {
        let accessor = Arc::new(StubAccessor::default());
        let project = Project::new(ProjectId::new("web"), "/stub");
        assert!(RootDescriptor::load(project, accessor).is_none());
    }

    #[test]
    fn load_with_malformed_descriptor_is_not_applicable() {
        let (accessor, project) = fixture();
        accessor.put(DESCRIPTOR_FILE, b"runtime: [unclosed\n");
        assert!(RootDescriptor::load(project, accessor).is_none());
    }

    #[test]
    fn is_valid_fails_once_descriptor_is_gone() {
        let (accessor, project) = fixture();
        let root = RootDescriptor::load(project, accessor.clone()).expect("load");
        assert!(root.is_valid(&HashSet::new()));

        accessor.remove(DESCRIPTOR_FILE);
        assert!(!root.is_valid(&HashSet::new()));
    }

    #[test]
    fn read_failure_propagates_and_leaves_model_intact() {
        let (accessor, project) = fixture();
        accessor.put("queue.yaml", b"queue:\n- name: q\n");
        let root =
            RootDescriptor::load(project, accessor.clone()).expect("load");
        let before = root.configurations();
        assert_eq!(before.len(), 1);

        accessor.set_fail_reads(true);
        accessor.put("queue.yaml", b"queue:\n- name: q2\n");
        let result = root.resources_changed(&changed(&root, &["queue.yaml"]));
        assert!(result.is_err());

        // previous model unchanged, and a retry succeeds
        let after = root.configurations();
        assert_eq!(after.len(), 1);
        assert!(Arc::ptr_eq(&before[0], &after[0]));

        accessor.set_fail_reads(false);
        let set = root
            .resources_changed(&changed(&root, &["queue.yaml"]))
            .expect("reconcile")
            .expect("published");
        assert_eq!(set.elements().len(), 1);
    }

    #[test]
    fn descriptor_mid_edit_publishes_nothing() {
        let (accessor, project) = fixture();
        accessor.put("cron.yaml", b"cron: []\n");
        let root =
            RootDescriptor::load(project, accessor.clone()).expect("load");

        accessor.put(DESCRIPTOR_FILE, b"service: [unclosed\n");
        let result = root
            .resources_changed(&changed(&root, &[DESCRIPTOR_FILE]))
            .expect("no io failure");
        assert!(result.is_none());

        // attributes and children are untouched
        assert_eq!(root.descriptor().runtime.as_deref(), Some("rust"));
        assert_eq!(root.configurations().len(), 1);
    }

    #[test]
    fn service_identity_change_cascades_to_children() {
        let (accessor, project) = fixture();
        accessor.put("cron.yaml", b"cron: []\n");
        accessor.put("queue.yaml", b"queue: []\n");
        let root =
            RootDescriptor::load(project, accessor.clone()).expect("load");
        assert_eq!(root.configurations().len(), 2);

        accessor.put(DESCRIPTOR_FILE, b"service: billing\nruntime: rust\n");
        let set = root
            .resources_changed(&changed(&root, &[DESCRIPTOR_FILE]))
            .expect("reconcile")
            .expect("published");
        assert!(set.contains_root());
        assert!(set.elements().is_empty());
        assert_eq!(root.configurations().len(), 0);
    }

    #[test]
    fn ancillary_noise_is_ignored_for_non_default_service() {
        let (accessor, project) = fixture();
        accessor.put(DESCRIPTOR_FILE, b"service: billing\n");
        let root =
            RootDescriptor::load(project, accessor.clone()).expect("load");
        assert_eq!(root.configurations().len(), 0);

        accessor.put("cron.yaml", b"cron: []\n");
        let set = root
            .resources_changed(&changed(&root, &["cron.yaml"]))
            .expect("reconcile")
            .expect("published");
        assert!(set.is_empty());
        assert_eq!(root.configurations().len(), 0);
    }

    #[test]
    fn descriptor_batch_dominates_mixed_batches() {
        let (accessor, project) = fixture();
        accessor.put("queue.yaml", b"queue: []\n");
        let root =
            RootDescriptor::load(project, accessor.clone()).expect("load");

        accessor.put(DESCRIPTOR_FILE, b"runtime: go\n");
        accessor.put("queue.yaml", b"queue:\n- name: q\n");
        let set = root
            .resources_changed(&changed(&root, &[DESCRIPTOR_FILE, "queue.yaml"]))
            .expect("reconcile")
            .expect("published");
        assert!(set.contains_root());
        assert_eq!(root.descriptor().runtime.as_deref(), Some("go"));
        // the queue child picked up the new content during the rebuild
        assert_eq!(root.configurations()[0].entries(), Some(1));
    }
}
