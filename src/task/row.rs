#![forbid(unsafe_code)]

use crate::task::model::Task;
use crate::task::store::TaskActions;

pub const DONE_LABEL: &str = "Done";
pub const UNDO_LABEL: &str = "Undo";
pub const DELETE_LABEL: &str = "Delete";

pub const CONFIRM_TITLE: &str = "Delete Task";
pub const CONFIRM_MESSAGE: &str = "Are you sure you want to delete this task?";
pub const CONFIRM_NO: &str = "No";
pub const CONFIRM_YES: &str = "Yes";

/// Label of the complete-side action for `task`, derived fresh on every render.
#[must_use]
pub fn left_action_label(task: &Task) -> &'static str {
    if task.is_completed {
        UNDO_LABEL
    } else {
        DONE_LABEL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Idle,
    /// Revealing the complete/undo action.
    OpenLeft,
    /// Revealing the delete action.
    OpenRight,
    PendingDeleteConfirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwipeThresholds {
    /// Offset at which a side starts to reveal.
    pub activation: u16,
    /// Offset at which the revealed action fires.
    pub full: u16,
}

impl Default for SwipeThresholds {
    fn default() -> Self {
        Self {
            activation: 4,
            full: 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Unchanged,
    Moved,
    Toggled { completed: bool },
    ConfirmDelete,
    Deleted,
    Closed,
}

/// Swipe state machine for one list row.
///
/// Positive offsets drag toward the complete side, negative toward delete.
/// Completing fires as soon as the row is fully open; deleting stops at
/// `PendingDeleteConfirmation` until [`RowController::resolve_confirmation`]
/// gets an explicit answer.
#[derive(Debug, Clone)]
pub struct RowController {
    task_id: String,
    state: RowState,
    offset: i32,
    thresholds: SwipeThresholds,
}

impl RowController {
    #[must_use]
    pub fn new(task_id: impl Into<String>, thresholds: SwipeThresholds) -> Self {
        Self {
            task_id: task_id.into(),
            state: RowState::Idle,
            offset: 0,
            thresholds,
        }
    }

    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    #[must_use]
    pub fn state(&self) -> RowState {
        self.state
    }

    #[must_use]
    pub fn offset(&self) -> i32 {
        self.offset
    }

    #[must_use]
    pub fn awaiting_confirmation(&self) -> bool {
        self.state == RowState::PendingDeleteConfirmation
    }

    pub fn drag(&mut self, dx: i32, actions: &mut impl TaskActions) -> RowOutcome {
        if self.awaiting_confirmation() {
            return RowOutcome::Unchanged;
        }

        let full = i32::from(self.thresholds.full);
        let activation = i32::from(self.thresholds.activation);
        self.offset = self.offset.saturating_add(dx).clamp(-full, full);

        if self.offset >= full {
            let toggled = actions.toggle_complete(&self.task_id);
            self.close();
            return toggled.map_or(RowOutcome::Closed, |completed| RowOutcome::Toggled {
                completed,
            });
        }
        if self.offset <= -full {
            self.state = RowState::PendingDeleteConfirmation;
            return RowOutcome::ConfirmDelete;
        }

        self.state = if self.offset >= activation {
            RowState::OpenLeft
        } else if self.offset <= -activation {
            RowState::OpenRight
        } else {
            RowState::Idle
        };
        RowOutcome::Moved
    }

    /// Gesture ended short of full-open: snap closed.
    pub fn release(&mut self) -> RowOutcome {
        if self.awaiting_confirmation() || (self.state == RowState::Idle && self.offset == 0) {
            return RowOutcome::Unchanged;
        }
        self.close();
        RowOutcome::Closed
    }

    /// "Yes" deletes the task, "No" closes the row. Ignored unless a
    /// confirmation is pending.
    pub fn resolve_confirmation(
        &mut self,
        accepted: bool,
        actions: &mut impl TaskActions,
    ) -> RowOutcome {
        if !self.awaiting_confirmation() {
            return RowOutcome::Unchanged;
        }
        let removed = accepted && actions.delete_task(&self.task_id);
        self.close();
        if removed {
            RowOutcome::Deleted
        } else {
            RowOutcome::Closed
        }
    }

    fn close(&mut self) {
        self.state = RowState::Idle;
        self.offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use time::macros::datetime;

    use crate::task::storage::MemoryGateway;
    use crate::task::store::TaskStore;

    #[derive(Debug, Default)]
    struct Recorder {
        toggled: Vec<String>,
        deleted: Vec<String>,
    }

    impl TaskActions for Recorder {
        fn toggle_complete(&mut self, id: &str) -> Option<bool> {
            self.toggled.push(id.to_owned());
            Some(true)
        }

        fn delete_task(&mut self, id: &str) -> bool {
            self.deleted.push(id.to_owned());
            true
        }
    }

    fn row() -> RowController {
        RowController::new("t1", SwipeThresholds::default())
    }

    #[test]
    fn opens_each_side_past_activation_and_closes_inside_band() {
        let mut rec = Recorder::default();
        let mut row = row();

        assert_eq!(row.drag(3, &mut rec), RowOutcome::Moved);
        assert_eq!(row.state(), RowState::Idle);
        row.drag(1, &mut rec);
        assert_eq!(row.state(), RowState::OpenLeft);

        row.drag(-8, &mut rec);
        assert_eq!(row.state(), RowState::OpenRight);
        row.drag(6, &mut rec);
        assert_eq!(row.state(), RowState::Idle);
        assert!(rec.toggled.is_empty() && rec.deleted.is_empty());
    }

    #[test]
    fn full_left_swipe_toggles_then_settles() {
        let mut rec = Recorder::default();
        let mut row = row();

        row.drag(8, &mut rec);
        assert_eq!(row.drag(8, &mut rec), RowOutcome::Toggled { completed: true });
        assert_eq!(row.state(), RowState::Idle);
        assert_eq!(row.offset(), 0);
        assert_eq!(rec.toggled, ["t1"]);
    }

    #[test]
    fn full_right_swipe_waits_for_confirmation() {
        let mut rec = Recorder::default();
        let mut row = row();

        assert_eq!(row.drag(-16, &mut rec), RowOutcome::ConfirmDelete);
        assert!(row.awaiting_confirmation());
        assert_eq!(row.drag(20, &mut rec), RowOutcome::Unchanged);
        assert_eq!(row.release(), RowOutcome::Unchanged);
        assert!(rec.deleted.is_empty());

        assert_eq!(row.resolve_confirmation(true, &mut rec), RowOutcome::Deleted);
        assert_eq!(rec.deleted, ["t1"]);
        assert!(rec.toggled.is_empty());
    }

    #[test]
    fn release_short_of_full_closes() {
        let mut rec = Recorder::default();
        let mut row = row();

        row.drag(-10, &mut rec);
        assert_eq!(row.release(), RowOutcome::Closed);
        assert_eq!(row.state(), RowState::Idle);
        assert_eq!(row.release(), RowOutcome::Unchanged);
        assert_eq!(
            row.resolve_confirmation(true, &mut rec),
            RowOutcome::Unchanged
        );
        assert!(rec.deleted.is_empty());
    }

    #[test]
    fn labels_follow_completion() {
        let mut task = Task::new("x", "", datetime!(2024-01-01 0:00 UTC));
        assert_eq!(left_action_label(&task), "Done");
        task.is_completed = true;
        assert_eq!(left_action_label(&task), "Undo");
    }

    #[tokio::test]
    async fn declined_delete_leaves_list_untouched() {
        let gw = MemoryGateway::new();
        let mut store = TaskStore::new(Arc::new(gw.clone()));
        store.initialize().await;
        let id = store
            .add_task("Keep me", "", datetime!(2024-01-01 0:00 UTC))
            .unwrap();
        store.flush().await;
        let before = store.tasks().to_vec();

        let mut row = RowController::new(id.clone(), SwipeThresholds::default());
        assert_eq!(row.drag(-16, &mut store), RowOutcome::ConfirmDelete);
        assert_eq!(row.resolve_confirmation(false, &mut store), RowOutcome::Closed);
        store.flush().await;

        assert_eq!(store.tasks(), before.as_slice());
        assert_eq!(row.state(), RowState::Idle);
        assert_eq!(row.offset(), 0);
        assert_eq!(gw.save_count(), 1);

        row.drag(-16, &mut store);
        assert_eq!(row.resolve_confirmation(true, &mut store), RowOutcome::Deleted);
        assert!(store.get(&id).is_none());
    }

    #[tokio::test]
    async fn swipe_toggle_goes_through_the_store() {
        let gw = MemoryGateway::new();
        let mut store = TaskStore::new(Arc::new(gw.clone()));
        store.initialize().await;
        let id = store
            .add_task("Flip", "", datetime!(2024-01-01 0:00 UTC))
            .unwrap();

        let mut row = RowController::new(id.clone(), SwipeThresholds::default());
        assert_eq!(row.drag(16, &mut store), RowOutcome::Toggled { completed: true });
        assert_eq!(left_action_label(store.get(&id).unwrap()), "Undo");
        assert_eq!(row.drag(16, &mut store), RowOutcome::Toggled { completed: false });
    }
}
