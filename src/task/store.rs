#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::task::autosave::Autosave;
use crate::task::model::{Task, decode_tasks, encode_tasks};
use crate::task::storage::{PersistenceGateway, StorageError, StorageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Loading,
    Hydrated,
}

/// Mutations a list row may trigger.
pub trait TaskActions {
    /// Flips completion and returns the new value, `None` if nothing changed.
    fn toggle_complete(&mut self, id: &str) -> Option<bool>;

    /// Returns `true` when a task was removed.
    fn delete_task(&mut self, id: &str) -> bool;
}

/// Owns the in-memory task list and keeps durable storage in step with it.
///
/// Nothing is accepted until the initial load has resolved, so an empty list
/// can never overwrite stored data before it has been read.
pub struct TaskStore {
    tasks: Vec<Task>,
    phase: Phase,
    gateway: Arc<dyn PersistenceGateway>,
    autosave: Option<Autosave>,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("tasks", &self.tasks)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl TaskStore {
    #[must_use]
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            tasks: Vec::new(),
            phase: Phase::Uninitialized,
            gateway,
            autosave: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.phase == Phase::Hydrated
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Loads the stored list and marks the store hydrated. A second call is
    /// a no-op.
    pub async fn initialize(&mut self) {
        let Some(handle) = self.start_loading() else {
            return;
        };
        let loaded = match handle.await {
            Ok(res) => res,
            Err(e) => Err(StorageError::Unavailable(format!("load task failed: {e}"))),
        };
        self.finish_loading(loaded);
    }

    /// Moves to `Loading` and starts reading storage in the background.
    /// Returns `None` if loading already started.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start_loading(&mut self) -> Option<JoinHandle<StorageResult<Option<String>>>> {
        if self.phase != Phase::Uninitialized {
            return None;
        }
        self.phase = Phase::Loading;
        let gateway = Arc::clone(&self.gateway);
        Some(tokio::spawn(async move { gateway.load().await }))
    }

    /// Applies the result of the initial load. Failures and corrupt data
    /// leave the list empty; the store is hydrated either way.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, since hydration starts
    /// the autosave writer.
    pub fn finish_loading(&mut self, loaded: StorageResult<Option<String>>) {
        if self.phase != Phase::Loading {
            tracing::warn!(phase = ?self.phase, "ignoring load result outside of loading phase");
            return;
        }

        self.tasks = match loaded {
            Ok(Some(blob)) if !blob.trim().is_empty() => match decode_tasks(&blob) {
                Ok(tasks) => sanitize(tasks),
                Err(e) => {
                    tracing::error!(error = %e, "stored tasks are corrupt; starting empty");
                    Vec::new()
                }
            },
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::error!(error = %e, "failed to load tasks; starting empty");
                Vec::new()
            }
        };
        self.phase = Phase::Hydrated;
        self.autosave = Some(Autosave::spawn(Arc::clone(&self.gateway)));
        tracing::info!(count = self.tasks.len(), "task store hydrated");
    }

    /// Appends a new open task. Returns its id, or `None` when the title is
    /// blank or the store is not hydrated yet.
    pub fn add_task(
        &mut self,
        title: &str,
        description: &str,
        date: OffsetDateTime,
    ) -> Option<String> {
        if !self.accepting("add") {
            return None;
        }
        if title.trim().is_empty() {
            tracing::debug!("ignoring task with empty title");
            return None;
        }
        let task = Task::new(title, description, date);
        let id = task.id.clone();
        self.tasks.push(task);
        tracing::debug!(%id, "task added");
        self.persist();
        Some(id)
    }

    pub fn delete_task(&mut self, id: &str) -> bool {
        if !self.accepting("delete") {
            return false;
        }
        let Some(idx) = self.tasks.iter().position(|t| t.id == id) else {
            tracing::debug!(%id, "delete of unknown task ignored");
            return false;
        };
        self.tasks.remove(idx);
        tracing::debug!(%id, "task deleted");
        self.persist();
        true
    }

    pub fn toggle_complete(&mut self, id: &str) -> Option<bool> {
        if !self.accepting("toggle") {
            return None;
        }
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            tracing::debug!(%id, "toggle of unknown task ignored");
            return None;
        };
        task.is_completed = !task.is_completed;
        let completed = task.is_completed;
        tracing::debug!(%id, completed, "task toggled");
        self.persist();
        Some(completed)
    }

    /// Waits until every snapshot queued so far has been handed to storage.
    pub async fn flush(&self) {
        if let Some(autosave) = &self.autosave {
            autosave.flush().await;
        }
    }

    fn accepting(&self, op: &str) -> bool {
        if self.is_hydrated() {
            return true;
        }
        tracing::warn!(op, phase = ?self.phase, "mutation rejected before hydration");
        false
    }

    fn persist(&self) {
        let Some(autosave) = &self.autosave else {
            return;
        };
        match encode_tasks(&self.tasks) {
            Ok(blob) => autosave.enqueue(blob),
            Err(e) => tracing::error!(error = %e, "failed to encode tasks"),
        }
    }
}

impl TaskActions for TaskStore {
    fn toggle_complete(&mut self, id: &str) -> Option<bool> {
        TaskStore::toggle_complete(self, id)
    }

    fn delete_task(&mut self, id: &str) -> bool {
        TaskStore::delete_task(self, id)
    }
}

/// Drops records that break list invariants: blank titles and repeated ids.
fn sanitize(mut tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    let before = tasks.len();
    tasks.retain(|t| !t.title.trim().is_empty() && seen.insert(t.id.clone()));
    if tasks.len() != before {
        tracing::warn!(dropped = before - tasks.len(), "skipped invalid stored tasks");
    }
    tasks
}
