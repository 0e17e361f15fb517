use crate::handle::{FileHandle, Project};
use serde::Deserialize;
use std::io;
use std::path::PathBuf;

/// Per-project layout file controlling where logical names resolve.
pub const LAYOUT_FILE: &str = "layout.toml";

/// Resolves logical file names to concrete files within a project.
///
/// Resolution is re-evaluated at every call: the layout can change under
/// a live model, and detecting that is the reconciliation engine's job.
pub trait ConfigAccessor: Send + Sync {
    /// The concrete file this project currently uses for `name`.
    ///
    /// Returns the first existing candidate across the project's config
    /// directories, falling back to the candidate in the highest-priority
    /// directory so callers know where the file would appear.
    fn resolve(&self, project: &Project, name: &str) -> Option<FileHandle>;

    fn exists(&self, handle: &FileHandle) -> bool;

    fn read(&self, handle: &FileHandle) -> io::Result<Vec<u8>>;
}

/// Whether the handle names the project layout file.
#[must_use]
pub fn is_layout_file(handle: &FileHandle) -> bool {
    handle.base_name() == LAYOUT_FILE
}

#[derive(Debug, Deserialize)]
struct Layout {
    #[serde(default = "default_config_dirs")]
    config_dirs: Vec<String>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            config_dirs: default_config_dirs(),
        }
    }
}

fn default_config_dirs() -> Vec<String> {
    vec![".".to_string()]
}

/// Filesystem-backed accessor.
///
/// Consults the project's `layout.toml` on every resolution, so a layout
/// edit can redirect a logical name to a different concrete file.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsAccessor;

impl FsAccessor {
    fn layout(&self, project: &Project) -> Layout {
        let path = project.root().join(LAYOUT_FILE);
        let Ok(text) = std::fs::read_to_string(&path) else {
            return Layout::default();
        };
        match toml::from_str(&text) {
            Ok(layout) => layout,
            Err(err) => {
                log::warn!("ignoring malformed {}: {err}", path.display());
                Layout::default()
            }
        }
    }

    fn candidate(&self, project: &Project, dir: &str, name: &str) -> PathBuf {
        if dir == "." {
            project.root().join(name)
        } else {
            project.root().join(dir).join(name)
        }
    }
}

impl ConfigAccessor for FsAccessor {
    fn resolve(&self, project: &Project, name: &str) -> Option<FileHandle> {
        let layout = self.layout(project);
        let mut fallback = None;
        for dir in &layout.config_dirs {
            let handle = project.handle(self.candidate(project, dir, name));
            if self.exists(&handle) {
                return Some(handle);
            }
            if fallback.is_none() {
                fallback = Some(handle);
            }
        }
        fallback
    }

    fn exists(&self, handle: &FileHandle) -> bool {
        handle.path().is_file()
    }

    fn read(&self, handle: &FileHandle) -> io::Result<Vec<u8>> {
        std::fs::read(handle.path())
    }
}
