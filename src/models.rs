use serde::{Deserialize, Serialize};

/// The single session record kept in the local store. Its id doubles as the
/// `user` field on guest-created tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestSession {
    pub id: String,
    #[serde(default)]
    pub is_guest: bool,
    #[serde(default)]
    pub is_offline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
}

/// A column with an empty `board` is a global column shown on every board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardColumn {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub board: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub column: String,
    pub board: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

/// Parameters for creating a task. `board` stays optional here so the caller
/// error (no board selected) is reported by the service, not by clap.
#[derive(Debug, Clone)]
pub struct TaskCreate {
    pub title: String,
    pub column: String,
    pub board: Option<String>,
    pub project: Option<String>,
}

/// Partial task update. Unset fields are left untouched by both backends.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl TaskPatch {
    pub fn column(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(column) = &self.column {
            task.column = column.clone();
        }
        if let Some(project) = &self.project {
            task.project = Some(project.clone());
        }
    }
}
