use super::api::{ClientError, TodoApi};
use crate::models::{NewTodo, Todo, TodoPatch};
use chrono::Utc;
use std::fmt::Write;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    todo: Todo,
    /// Set while the entry is an unconfirmed placeholder.
    client_token: Option<String>,
}

impl From<Todo> for Entry {
    fn from(todo: Todo) -> Self {
        Self {
            todo,
            client_token: None,
        }
    }
}

/// Local view of the todo list with optimistic updates.
///
/// Every mutation is applied to local state before the request goes out. A
/// confirmed response replaces the local record; a failed one is compensated
/// by reloading the whole list, except for creates, whose placeholder is
/// dropped by its client token.
pub struct TodoBoard<A> {
    api: A,
    name: String,
    description: String,
    entries: Vec<Entry>,
    editing: Option<u64>,
}

impl<A: TodoApi> TodoBoard<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            name: String::new(),
            description: String::new(),
            entries: Vec::new(),
            editing: None,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn edited_todo_id(&self) -> Option<u64> {
        self.editing
    }

    pub fn todos(&self) -> impl Iterator<Item = &Todo> {
        self.entries.iter().map(|e| &e.todo)
    }

    /// Records shown in the list: everything not yet completed.
    pub fn visible(&self) -> impl Iterator<Item = &Todo> {
        self.todos().filter(|t| !t.is_completed)
    }

    pub fn get(&self, id: u64) -> Option<&Todo> {
        self.todos().find(|t| t.id == id)
    }

    fn replace_all(&mut self, todos: Vec<Todo>) {
        self.entries = todos.into_iter().map(Entry::from).collect();
    }

    fn replace(&mut self, id: u64, todo: Todo) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.todo.id == id) {
            *entry = Entry::from(todo);
        }
    }

    fn reset_form(&mut self) {
        self.name.clear();
        self.description.clear();
        self.editing = None;
    }

    pub async fn load(&mut self) -> Result<(), ClientError> {
        let todos = self.api.list().await?;
        self.replace_all(todos);
        Ok(())
    }

    /// Rollback-by-reload: the server's list becomes the local list again.
    async fn resync(&mut self) {
        if let Err(e) = self.load().await {
            tracing::warn!(error = %e, "could not reload todos after a failed update");
        }
    }

    /// Fills the form from a record and enters edit mode.
    pub fn edit(&mut self, id: u64) -> bool {
        let Some(todo) = self.get(id) else {
            return false;
        };
        let name = todo.name.clone();
        let description = todo.description.clone().unwrap_or_default();

        self.name = name;
        self.description = description;
        self.editing = Some(id);
        true
    }

    pub fn cancel_edit(&mut self) {
        self.reset_form();
    }

    /// Creates or updates from the form, depending on edit mode.
    pub async fn submit(&mut self) -> Result<Todo, ClientError> {
        if self.name.trim().is_empty() {
            return Err(ClientError::Invalid("Todo name is required".to_string()));
        }
        let todo = match self.editing {
            Some(id) => self.submit_update(id).await?,
            None => self.submit_create().await?,
        };
        self.reset_form();
        Ok(todo)
    }

    async fn submit_create(&mut self) -> Result<Todo, ClientError> {
        let token = Uuid::new_v4().to_string();
        let description = Some(self.description.clone()).filter(|d| !d.is_empty());
        let input = NewTodo {
            name: self.name.clone(),
            description: description.clone(),
            client_token: Some(token.clone()),
        };

        self.entries.push(Entry {
            todo: Todo {
                id: Utc::now().timestamp_millis().unsigned_abs(),
                name: input.name.clone(),
                description,
                is_completed: false,
                created_at: None,
                updated_at: None,
            },
            client_token: Some(token.clone()),
        });

        match self.api.create(&input).await {
            Ok(created) => {
                let token = created.client_token.unwrap_or(token);
                let placeholder = self
                    .entries
                    .iter()
                    .position(|e| e.client_token.as_deref() == Some(token.as_str()));
                match placeholder {
                    Some(index) => self.entries[index] = Entry::from(created.todo.clone()),
                    None => self.entries.push(Entry::from(created.todo.clone())),
                }
                Ok(created.todo)
            }
            Err(e) => {
                tracing::warn!(error = %e, "create failed, dropping placeholder");
                self.entries
                    .retain(|entry| entry.client_token.as_deref() != Some(token.as_str()));
                Err(e)
            }
        }
    }

    async fn submit_update(&mut self, id: u64) -> Result<Todo, ClientError> {
        // Only fields the form changed go out; the rest keep their stored value.
        let (name, description) = match self.get(id) {
            Some(current) => (
                Some(self.name.clone()).filter(|n| *n != current.name),
                Some(self.description.clone())
                    .filter(|d| d != current.description.as_deref().unwrap_or_default()),
            ),
            None => (Some(self.name.clone()), Some(self.description.clone())),
        };
        let patch = TodoPatch {
            name,
            description,
            is_completed: None,
        };

        if let Some(entry) = self.entries.iter_mut().find(|e| e.todo.id == id) {
            if let Some(name) = &patch.name {
                entry.todo.name = name.clone();
            }
            if let Some(description) = &patch.description {
                entry.todo.description = Some(description.clone());
            }
        }

        match self.api.update(id, &patch).await {
            Ok(todo) => {
                self.replace(id, todo.clone());
                Ok(todo)
            }
            Err(e) => {
                self.resync().await;
                Err(e)
            }
        }
    }

    /// Deletes after `confirm` agrees. Returns `false` when the user declined.
    pub async fn delete<F>(&mut self, id: u64, confirm: F) -> Result<bool, ClientError>
    where
        F: FnOnce() -> bool,
    {
        if !confirm() {
            return Ok(false);
        }

        self.entries.retain(|e| e.todo.id != id);
        if let Err(e) = self.api.delete(id).await {
            self.resync().await;
            return Err(e);
        }
        Ok(true)
    }

    pub async fn complete(&mut self, id: u64) -> Result<Todo, ClientError> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.todo.id == id) {
            entry.todo.mark_completed();
        }

        match self.api.update(id, &TodoPatch::completed()).await {
            Ok(todo) => {
                self.replace(id, todo.clone());
                Ok(todo)
            }
            Err(e) => {
                self.resync().await;
                Err(e)
            }
        }
    }

    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return "No todos yet!\n".to_string();
        }
        let mut out = String::new();
        for todo in self.visible() {
            let _ = writeln!(out, "[{}] {}", todo.id, todo.name);
            if let Some(description) = todo.description.as_deref().filter(|d| !d.is_empty()) {
                let _ = writeln!(out, "    {}", description);
            }
        }
        out
    }
}
