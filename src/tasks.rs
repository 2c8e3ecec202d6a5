use serde_json::Value;

use crate::cache::TaskBackend;
use crate::error::{Result, StoreError};
use crate::models::{Board, BoardColumn, Project, Task, TaskCreate, TaskPatch};
use crate::remote::{board_filter, column_filter, RemoteClient};
use crate::session::Session;
use crate::store::{Collection, IndexKey, LocalStore};

/// One CRUD surface per entity type, dispatching per call on the session
/// variant: remote service when authenticated, local store for guests, and
/// empty reads / fast-failing writes with no session at all.
pub struct TaskService {
    session: Session,
    remote: Option<RemoteClient>,
    local: Option<LocalStore>,
}

impl TaskService {
    pub fn new(session: Session, remote: Option<RemoteClient>, local: Option<LocalStore>) -> Self {
        Self {
            session,
            remote,
            local,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn remote(&self) -> Result<&RemoteClient> {
        self.remote
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("remote client not configured".into()))
    }

    fn local(&self) -> Result<&LocalStore> {
        self.local
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("local store not opened".into()))
    }

    pub async fn boards(&self) -> Result<Vec<Board>> {
        match &self.session {
            Session::Remote { .. } => self.remote()?.list("boards", None).await,
            Session::Guest { .. } => self.local()?.get_all(Collection::Boards, None),
            Session::None => Ok(Vec::new()),
        }
    }

    pub async fn projects(&self) -> Result<Vec<Project>> {
        match &self.session {
            Session::Remote { .. } => self.remote()?.list("projects", None).await,
            Session::Guest { .. } => self.local()?.get_all(Collection::Projects, None),
            Session::None => Ok(Vec::new()),
        }
    }

    /// Columns visible on a board: its own plus global columns (empty
    /// `board`). No board selected reads as empty, matching the remote
    /// filter `board = X || board = ""`.
    pub async fn columns(&self, board_id: Option<&str>) -> Result<Vec<BoardColumn>> {
        let Some(board_id) = board_id else {
            return Ok(Vec::new());
        };
        match &self.session {
            Session::Remote { .. } => {
                self.remote()?
                    .list("columns", Some(&column_filter(board_id)))
                    .await
            }
            Session::Guest { .. } => {
                let mut columns: Vec<BoardColumn> =
                    self.local()?.get_all(Collection::Columns, None)?;
                columns.retain(|c| c.board == board_id || c.board.is_empty());
                Ok(columns)
            }
            Session::None => Ok(Vec::new()),
        }
    }

    pub async fn tasks(&self, board_id: Option<&str>) -> Result<Vec<Task>> {
        let Some(board_id) = board_id else {
            return Ok(Vec::new());
        };
        match &self.session {
            Session::Remote { .. } => {
                self.remote()?
                    .list("tasks", Some(&board_filter(board_id)))
                    .await
            }
            Session::Guest { .. } => self
                .local()?
                .get_all(Collection::Tasks, Some(IndexKey::Board(board_id))),
            Session::None => Ok(Vec::new()),
        }
    }

    /// Create a task, stamping `user` with the authenticated user id or the
    /// guest session id. A missing board fails before any I/O.
    pub async fn create_task(&self, params: &TaskCreate) -> Result<Task> {
        let board = params
            .board
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or(StoreError::NoBoardSelected)?;
        let user = self.session.user_id().ok_or(StoreError::NoSession)?;

        let mut task = Task {
            id: String::new(),
            title: params.title.clone(),
            column: params.column.clone(),
            board: board.to_string(),
            user: user.to_string(),
            project: params.project.clone(),
        };

        match &self.session {
            Session::Remote { .. } => {
                log::debug!("creating task '{}' on remote board {board}", task.title);
                // The service assigns the id; the body must not carry one.
                let mut body = serde_json::to_value(&task)?;
                if let Some(obj) = body.as_object_mut() {
                    obj.remove("id");
                }
                self.remote()?.create("tasks", &body).await
            }
            Session::Guest { .. } => {
                log::debug!("creating task '{}' in local board {board}", task.title);
                task.id = self.local()?.add(Collection::Tasks, &task)?;
                Ok(task)
            }
            Session::None => Err(StoreError::NoSession),
        }
    }

    pub async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<()> {
        match &self.session {
            Session::Remote { .. } => {
                let body = serde_json::to_value(patch)?;
                let _: Task = self.remote()?.update("tasks", id, &body).await?;
                Ok(())
            }
            Session::Guest { .. } => {
                let mut partial = serde_json::to_value(patch)?;
                if let Some(obj) = partial.as_object_mut() {
                    obj.insert("id".into(), Value::String(id.to_string()));
                }
                self.local()?.update(Collection::Tasks, &partial)
            }
            Session::None => Err(StoreError::NoSession),
        }
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        match &self.session {
            Session::Remote { .. } => self.remote()?.delete("tasks", id).await,
            Session::Guest { .. } => self.local()?.delete(Collection::Tasks, id),
            Session::None => Err(StoreError::NoSession),
        }
    }
}

impl TaskBackend for TaskService {
    async fn fetch_tasks(&self, board_id: &str) -> Result<Vec<Task>> {
        self.tasks(Some(board_id)).await
    }

    async fn create_task(&self, params: &TaskCreate) -> Result<Task> {
        TaskService::create_task(self, params).await
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<()> {
        TaskService::update_task(self, id, patch).await
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        TaskService::delete_task(self, id).await
    }
}
