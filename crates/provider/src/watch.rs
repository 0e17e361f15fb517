use crate::dispatch::RefreshDispatcher;
use crate::error::{ProviderError, Result};
use crate::reconciler::{ChangeBatch, ChangeReconciler};
use crate::workspace::Workspace;
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use svcnav_model::{FileHandle, Project};
use tokio::sync::mpsc;
use tokio::time;

/// Tuning for the filesystem change source.
#[derive(Debug, Clone, Copy)]
pub struct ChangeSourceConfig {
    pub debounce: Duration,
    pub max_batch_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for ChangeSourceConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(750),
            max_batch_wait: Duration::from_secs(3),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Filesystem-backed notification source.
///
/// Watches every open project root, coalesces raw events into per-project
/// change batches, runs the reconciler and hands the resulting refresh
/// targets to the dispatcher. Batching (debounce plus a max wait so bursts
/// cannot starve delivery) happens here; the reconciler sees pre-grouped
/// deltas only.
#[derive(Clone)]
pub struct ChangeSource {
    inner: Arc<ChangeSourceInner>,
}

struct ChangeSourceInner {
    command_tx: mpsc::Sender<SourceCommand>,
    watcher: Mutex<RecommendedWatcher>,
}

enum SourceCommand {
    Trigger,
    Shutdown,
}

impl ChangeSource {
    /// Start watching the projects currently open in the workspace.
    /// Projects opened later are picked up via [`ChangeSource::watch_project`].
    pub fn start(
        workspace: Arc<Workspace>,
        reconciler: Arc<ChangeReconciler>,
        dispatcher: RefreshDispatcher,
        config: ChangeSourceConfig,
    ) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (command_tx, command_rx) = mpsc::channel(16);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default().with_poll_interval(config.poll_interval),
        )?;
        for project in workspace.projects() {
            if let Err(err) = watcher.watch(project.root(), RecursiveMode::Recursive) {
                log::warn!("failed to watch {}: {err}", project.root().display());
            }
        }

        spawn_reconcile_loop(workspace, reconciler, dispatcher, config, event_rx, command_rx);

        Ok(Self {
            inner: Arc::new(ChangeSourceInner {
                command_tx,
                watcher: Mutex::new(watcher),
            }),
        })
    }

    /// Add a watch for a project opened after `start`.
    pub fn watch_project(&self, project: &Project) -> Result<()> {
        self.inner
            .watcher
            .lock()
            .watch(project.root(), RecursiveMode::Recursive)?;
        Ok(())
    }

    /// Run a reconcile pass for everything pending without waiting out the
    /// debounce.
    pub async fn trigger(&self) -> Result<()> {
        self.inner
            .command_tx
            .send(SourceCommand::Trigger)
            .await
            .map_err(|err| ProviderError::Other(format!("change source stopped: {err}")))
    }
}

impl Drop for ChangeSource {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(SourceCommand::Shutdown);
        }
    }
}

fn spawn_reconcile_loop(
    workspace: Arc<Workspace>,
    reconciler: Arc<ChangeReconciler>,
    dispatcher: RefreshDispatcher,
    config: ChangeSourceConfig,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    mut command_rx: mpsc::Receiver<SourceCommand>,
) {
    tokio::spawn(async move {
        let mut state = DebounceState::new(config.debounce, config.max_batch_wait);

        loop {
            let next_deadline = state.next_deadline();

            tokio::select! {
                Some(event) = event_rx.recv() => {
                    match event {
                        Ok(event) => {
                            for path in event.paths {
                                state.record_path(path);
                            }
                        }
                        Err(err) => log::warn!("watcher error: {err}"),
                    }
                }
                Some(command) = command_rx.recv() => {
                    match command {
                        SourceCommand::Trigger => state.force_run(),
                        SourceCommand::Shutdown => break,
                    }
                }
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if state.should_run() && next_deadline.is_some() => {
                    let paths = state.take_paths();
                    state.reset();

                    let batch = group_into_batch(&workspace, paths);
                    if !batch.is_empty() {
                        let targets = reconciler.on_change_batch(&batch);
                        dispatcher.dispatch(targets);
                    }
                }
            }
        }
    });
}

/// Group raw event paths into a per-project batch. A project whose root
/// itself disappeared is recorded as removed; paths under no open project
/// are dropped.
fn group_into_batch(workspace: &Workspace, paths: HashSet<PathBuf>) -> ChangeBatch {
    let mut batch = ChangeBatch::new();
    for path in paths {
        let Some(project) = workspace.project_for_path(&path) else {
            continue;
        };
        if path == project.root() {
            if !project.root().exists() {
                batch.record_removed_project(project.id().clone());
            }
            continue;
        }
        if path.is_dir() {
            continue;
        }
        batch.record(FileHandle::new(project.id().clone(), path));
    }
    batch
}

struct DebounceState {
    debounce: Duration,
    max_batch: Duration,
    dirty: bool,
    last_event: Option<Instant>,
    first_event: Option<Instant>,
    force_immediate: bool,
    pending_paths: HashSet<PathBuf>,
}

impl DebounceState {
    fn new(debounce: Duration, max_batch: Duration) -> Self {
        Self {
            debounce,
            max_batch,
            dirty: false,
            last_event: None,
            first_event: None,
            force_immediate: false,
            pending_paths: HashSet::new(),
        }
    }

    fn record_path(&mut self, path: PathBuf) {
        self.pending_paths.insert(path);
        self.last_event = Some(Instant::now());
        self.first_event.get_or_insert_with(Instant::now);
        self.dirty = true;
    }

    fn force_run(&mut self) {
        self.force_immediate = true;
        self.dirty = true;
    }

    const fn should_run(&self) -> bool {
        self.dirty
    }

    fn next_deadline(&self) -> Option<time::Instant> {
        if !self.dirty {
            return None;
        }

        if self.force_immediate {
            return Some(time::Instant::now());
        }

        let mut deadline = self.last_event.map(|last| last + self.debounce);

        if let Some(first) = self.first_event {
            let forced = first + self.max_batch;
            deadline = Some(match deadline {
                Some(current) if forced < current => forced,
                Some(current) => current,
                None => forced,
            });
        }

        deadline.map(time::Instant::from_std)
    }

    fn take_paths(&mut self) -> HashSet<PathBuf> {
        std::mem::take(&mut self.pending_paths)
    }

    fn reset(&mut self) {
        self.dirty = false;
        self.last_event = None;
        self.first_event = None;
        self.force_immediate = false;
        self.pending_paths.clear();
    }
}
