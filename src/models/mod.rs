use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Todo {
    pub fn new(id: u64, input: NewTodo) -> Result<Self, TodoError> {
        validate_name(&input.name)?;
        let now = Utc::now();
        Ok(Self {
            id,
            name: input.name,
            description: input.description,
            is_completed: false,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    /// Merges the fields present in `patch`; absent fields keep their value.
    pub fn apply(&mut self, patch: TodoPatch) -> Result<(), TodoError> {
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(is_completed) = patch.is_completed {
            self.is_completed = is_completed;
        }
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_completed(&mut self) {
        self.is_completed = true;
        self.updated_at = Some(Utc::now());
    }
}

fn validate_name(name: &str) -> Result<(), TodoError> {
    if name.trim().is_empty() {
        return Err(TodoError::InvalidTodo("Todo name cannot be empty".to_string()));
    }
    Ok(())
}

/// Body of a create request.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTodo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Opaque token echoed back by the server so a client can match its placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

/// Body of an update request. `None` means the field was omitted (or null).
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TodoPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl TodoPatch {
    pub fn completed() -> Self {
        Self {
            is_completed: Some(true),
            ..Default::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum TodoError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Todo not found: {0}")]
    NotFound(u64),
    #[error("Failed to write store: {0}")]
    StoreWriteFailed(String),
    #[error("Invalid todo: {0}")]
    InvalidTodo(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Everything persisted in one store: the records plus the id sequence.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreData {
    pub version: u32,
    pub next_id: u64,
    pub todos: Vec<Todo>,
}

/// On-disk shapes accepted when reading a JSON store.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StoreFile {
    Versioned(StoreData),
    Legacy(Vec<Todo>),
}

impl From<StoreFile> for StoreData {
    fn from(file: StoreFile) -> Self {
        let mut data = match file {
            StoreFile::Versioned(data) => data,
            StoreFile::Legacy(todos) => StoreData {
                version: STORE_VERSION,
                next_id: 1,
                todos,
            },
        };
        data.repair_sequence();
        data
    }
}

impl Default for StoreData {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreData {
    pub fn new() -> Self {
        Self {
            version: STORE_VERSION,
            next_id: 1,
            todos: Vec::new(),
        }
    }

    /// Raises `next_id` past every stored id so a hand-edited file can't hand out duplicates.
    ///
    /// `u64::MAX` is never handed out; a store already holding it is left
    /// with an exhausted sequence.
    pub fn repair_sequence(&mut self) {
        let floor = self
            .todos
            .iter()
            .map(|t| t.id)
            .max()
            .map_or(1, |max| max.saturating_add(1));
        self.next_id = self.next_id.max(floor);
    }

    pub fn allocate_id(&mut self) -> Result<u64, TodoError> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| TodoError::StoreUnavailable("id sequence exhausted".to_string()))?;
        Ok(id)
    }

    pub fn position(&self, id: u64) -> Option<usize> {
        self.todos.iter().position(|t| t.id == id)
    }
}
