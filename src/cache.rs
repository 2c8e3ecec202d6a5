use std::cell::RefCell;
use std::collections::HashMap;

use uuid::Uuid;

use crate::error::Result;
use crate::models::{Task, TaskCreate, TaskPatch};

/// The seam the optimistic cache mutates through. `TaskService` is the real
/// implementation; tests substitute a scripted one.
#[allow(async_fn_in_trait)]
pub trait TaskBackend {
    async fn fetch_tasks(&self, board_id: &str) -> Result<Vec<Task>>;
    async fn create_task(&self, params: &TaskCreate) -> Result<Task>;
    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<()>;
    async fn delete_task(&self, id: &str) -> Result<()>;
}

#[derive(Default)]
struct BoardEntry {
    tasks: Vec<Task>,
    /// Bumped by every mutation; a refresh started under an older epoch
    /// discards its result instead of overwriting the optimistic list.
    epoch: u64,
    fresh: bool,
}

/// Optimistic mutation cache: per-board task lists that are mutated before
/// the backend confirms. Success invalidates the list so the next read
/// re-fetches the authoritative state (replacing placeholder ids); failure
/// restores the pre-mutation snapshot and surfaces the error.
pub struct TaskCache<B> {
    backend: B,
    boards: RefCell<HashMap<String, BoardEntry>>,
}

impl<B: TaskBackend> TaskCache<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            boards: RefCell::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The currently visible list for a board, without triggering a refresh.
    pub fn cached(&self, board_id: &str) -> Vec<Task> {
        self.boards
            .borrow()
            .get(board_id)
            .map(|entry| entry.tasks.clone())
            .unwrap_or_default()
    }

    /// The task list for a board, fetching from the backend when the cached
    /// copy is missing or invalidated.
    pub async fn tasks(&self, board_id: &str) -> Result<Vec<Task>> {
        let started_epoch = {
            let boards = self.boards.borrow();
            match boards.get(board_id) {
                Some(entry) if entry.fresh => return Ok(entry.tasks.clone()),
                Some(entry) => entry.epoch,
                None => 0,
            }
        };

        // Borrow is released across the await; a mutation may land meanwhile.
        let fetched = self.backend.fetch_tasks(board_id).await?;

        let mut boards = self.boards.borrow_mut();
        let entry = boards.entry(board_id.to_string()).or_default();
        if entry.epoch != started_epoch {
            log::debug!("discarding stale refresh for board {board_id}");
            return Ok(entry.tasks.clone());
        }
        entry.tasks = fetched;
        entry.fresh = true;
        Ok(entry.tasks.clone())
    }

    /// Snapshot the list and speculatively apply a mutation, suspending any
    /// in-flight refresh of this board. Returns the pre-mutation snapshot.
    fn apply_optimistic(&self, board_id: &str, apply: impl FnOnce(&mut Vec<Task>)) -> Vec<Task> {
        let mut boards = self.boards.borrow_mut();
        let entry = boards.entry(board_id.to_string()).or_default();
        entry.epoch += 1;
        let snapshot = entry.tasks.clone();
        apply(&mut entry.tasks);
        snapshot
    }

    fn settle<T>(&self, board_id: &str, result: &Result<T>, snapshot: Vec<Task>) {
        let mut boards = self.boards.borrow_mut();
        let Some(entry) = boards.get_mut(board_id) else {
            return;
        };
        match result {
            Ok(_) => entry.fresh = false,
            Err(err) => {
                log::warn!("mutation on board {board_id} failed, rolling back: {err}");
                entry.tasks = snapshot;
            }
        }
    }

    pub async fn create_task(&self, params: &TaskCreate) -> Result<Task> {
        let board_id = params
            .board
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or(crate::error::StoreError::NoBoardSelected)?
            .to_string();
        let user = String::new(); // stamped by the backend, refreshed on invalidation

        let placeholder = Task {
            id: format!("local-{}", Uuid::new_v4()),
            title: params.title.clone(),
            column: params.column.clone(),
            board: board_id.clone(),
            user,
            project: params.project.clone(),
        };
        let snapshot = self.apply_optimistic(&board_id, |tasks| tasks.push(placeholder));

        let result = self.backend.create_task(params).await;
        self.settle(&board_id, &result, snapshot);
        result
    }

    pub async fn update_task(&self, board_id: &str, id: &str, patch: &TaskPatch) -> Result<()> {
        let snapshot = self.apply_optimistic(board_id, |tasks| {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
                patch.apply_to(task);
            }
        });

        let result = self.backend.update_task(id, patch).await;
        self.settle(board_id, &result, snapshot);
        result
    }

    pub async fn delete_task(&self, board_id: &str, id: &str) -> Result<()> {
        let snapshot = self.apply_optimistic(board_id, |tasks| tasks.retain(|t| t.id != id));

        let result = self.backend.delete_task(id).await;
        self.settle(board_id, &result, snapshot);
        result
    }
}
