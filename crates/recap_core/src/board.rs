//! crates/recap_core/src/board.rs
//!
//! The task board state machine: one user's in-memory task list, grouped by
//! status for display, with remote persistence through the store gateway.
//!
//! Every mutation names its consistency policy explicitly. `update_status`
//! is the one optimistic operation (apply locally, confirm remotely, roll
//! back on failure); add, edit, and delete change local state only after the
//! remote store confirms; a failed `load` keeps the previous list.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::{ActionItem, NewTask, Priority, Task, TaskPatch, TaskStatus};
use crate::ports::{PortError, PortResult, RemoteStoreService};

//=========================================================================================
// Inputs and Views
//=========================================================================================

/// The user-entered fields for a directly added task. The board fills in
/// the owner, status, and defaults.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub assigned_to: Option<String>,
    pub due_date: Option<String>,
    pub priority: Priority,
}

/// The board grouped into display columns. Tasks keep their local list
/// order inside each column; the legacy `pending` status groups under todo.
#[derive(Debug, Clone, Serialize)]
pub struct BoardColumns {
    pub todo: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub done: Vec<Task>,
}

//=========================================================================================
// TaskBoard
//=========================================================================================

/// One user's task board.
pub struct TaskBoard {
    store: Arc<dyn RemoteStoreService>,
    user_id: String,
    tasks: Mutex<Vec<Task>>,
}

impl TaskBoard {
    pub fn new(store: Arc<dyn RemoteStoreService>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the local list with the store's, in the store's sort order
    /// (most recent first). On failure the previous list stays in place,
    /// stale but consistent, and the error surfaces to the caller.
    pub async fn load(&self) -> PortResult<Vec<Task>> {
        let fresh = self.store.list_tasks_for_user(&self.user_id).await?;
        let mut tasks = self.tasks.lock().await;
        *tasks = fresh.clone();
        Ok(fresh)
    }

    /// The current local list, in display order.
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().await.clone()
    }

    /// The current local list grouped into columns.
    pub async fn grouped(&self) -> BoardColumns {
        let tasks = self.tasks.lock().await;
        let mut columns = BoardColumns {
            todo: Vec::new(),
            in_progress: Vec::new(),
            done: Vec::new(),
        };
        for task in tasks.iter() {
            match task.status.normalized() {
                TaskStatus::Todo | TaskStatus::Pending => columns.todo.push(task.clone()),
                TaskStatus::InProgress => columns.in_progress.push(task.clone()),
                TaskStatus::Done => columns.done.push(task.clone()),
            }
        }
        columns
    }

    /// Adds one task. Not optimistic: the task appears locally only once
    /// the store has confirmed it and assigned its id. Appends, so two adds
    /// confirmed in order land in that order.
    pub async fn add_task(&self, draft: TaskDraft) -> PortResult<Task> {
        if draft.title.trim().is_empty() {
            return Err(PortError::Validation("Task title is required".to_string()));
        }

        let new_task = NewTask {
            user_id: self.user_id.clone(),
            title: draft.title,
            description: draft.description,
            status: TaskStatus::Todo,
            priority: draft.priority,
            assigned_to: draft
                .assigned_to
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| "Unassigned".to_string()),
            due_date: draft.due_date.filter(|d| !d.trim().is_empty()),
        };

        let created = self.store.create_task(new_task).await?;
        self.tasks.lock().await.push(created.clone());
        Ok(created)
    }

    /// Adds a batch of extracted action items as tasks in one store call.
    /// All-or-nothing from the board's perspective: on success every task
    /// appears locally and `tasks_created` grows by the batch size; on
    /// failure nothing is added locally and no increment is observed.
    pub async fn add_action_items(&self, items: &[ActionItem]) -> PortResult<Vec<Task>> {
        if items.is_empty() {
            return Err(PortError::Validation(
                "No action items to add".to_string(),
            ));
        }

        let new_tasks: Vec<NewTask> = items
            .iter()
            .map(|item| NewTask {
                user_id: self.user_id.clone(),
                title: item.task.clone(),
                description: item.context.clone(),
                status: TaskStatus::Todo,
                priority: item.priority,
                assigned_to: if item.owner.trim().is_empty() {
                    "Unassigned".to_string()
                } else {
                    item.owner.clone()
                },
                due_date: Some(if item.due.trim().is_empty() {
                    Utc::now().format("%Y-%m-%d").to_string()
                } else {
                    item.due.clone()
                }),
            })
            .collect();

        let created = self
            .store
            .create_tasks_bulk(new_tasks, &self.user_id)
            .await?;
        self.tasks.lock().await.extend(created.iter().cloned());
        Ok(created)
    }

    /// Moves a task to a new column. The one optimistic operation: the new
    /// status is applied locally first, then confirmed with the store; on
    /// failure the task rolls back to its prior status and the error
    /// surfaces so the caller can retry.
    pub async fn update_status(&self, task_id: &str, new_status: TaskStatus) -> PortResult<Task> {
        // The legacy alias is read-only; writes always use the real status.
        let new_status = new_status.normalized();
        let prior = {
            let mut tasks = self.tasks.lock().await;
            let task = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))?;
            let prior = task.status;
            task.status = new_status;
            prior
        };

        match self.store.update_task_status(task_id, new_status).await {
            Ok(confirmed) => {
                self.install(confirmed.clone()).await;
                Ok(confirmed)
            }
            Err(e) => {
                // Compensate: put the prior status back, unless a concurrent
                // load already replaced this entry.
                let mut tasks = self.tasks.lock().await;
                match tasks.iter_mut().find(|t| t.id == task_id) {
                    Some(task) if task.status == new_status => task.status = prior,
                    Some(_) | None => {
                        warn!("Rollback for task {} skipped: entry changed under us", task_id)
                    }
                }
                Err(e)
            }
        }
    }

    /// Edits a task's fields. Not optimistic: the local entry changes only
    /// after the store confirms.
    pub async fn edit_task(&self, task_id: &str, patch: TaskPatch) -> PortResult<Task> {
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(PortError::Validation("Task title is required".to_string()));
            }
        }

        let updated = self.store.update_task(task_id, patch).await?;
        self.install(updated.clone()).await;
        Ok(updated)
    }

    /// Deletes a task. Not optimistic. A task the store no longer knows is
    /// treated as already deleted: the goal state holds, so the local entry
    /// goes away and the call reports success.
    pub async fn delete_task(&self, task_id: &str) -> PortResult<()> {
        match self.store.delete_task(task_id).await {
            Ok(()) => {}
            Err(PortError::NotFound(_)) => {
                warn!("Task {} was already gone remotely; removing locally", task_id);
            }
            Err(e) => return Err(e),
        }
        self.tasks.lock().await.retain(|t| t.id != task_id);
        Ok(())
    }

    /// Replaces the local entry for a confirmed task, keeping its position.
    async fn install(&self, confirmed: Task) {
        let mut tasks = self.tasks.lock().await;
        match tasks.iter_mut().find(|t| t.id == confirmed.id) {
            Some(task) => *task = confirmed,
            None => warn!(
                "Confirmed task {} is no longer on the board; dropping update",
                confirmed.id
            ),
        }
    }
}
