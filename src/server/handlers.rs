use super::AppState;
use crate::models::{NewTodo, Todo, TodoError, TodoPatch};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Every JSON body the API sends: `{status, data}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct MessagePayload {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TodosPayload {
    pub todos: Vec<Todo>,
}

#[derive(Debug, Serialize)]
pub struct TodoPayload {
    pub todo: Todo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPayload {
    pub message: &'static str,
    pub todo: Todo,
    pub client_token: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    code: StatusCode,
    status: &'static str,
    message: String,
}

impl ApiError {
    fn new(code: StatusCode, status: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
        }
    }

    fn todo_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "fail", "todo not found")
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "fail", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope {
            status: self.status,
            data: MessagePayload {
                message: self.message,
            },
        };
        (self.code, Json(body)).into_response()
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    List,
    Create,
    Update,
    Delete,
}

impl Operation {
    fn unavailable(self) -> ApiError {
        match self {
            Operation::List => ApiError::new(StatusCode::NOT_FOUND, "not found", "not todos found"),
            Operation::Create => ApiError::new(
                StatusCode::NOT_FOUND,
                "not found",
                "not list of todos available",
            ),
            Operation::Update | Operation::Delete => {
                ApiError::new(StatusCode::NOT_FOUND, "fail", "no list of todos available")
            }
        }
    }

    fn write_failed(self) -> ApiError {
        match self {
            Operation::Create => {
                ApiError::new(StatusCode::BAD_REQUEST, "failed", "could not add Todo")
            }
            Operation::Delete => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed",
                "could not delete the todo",
            ),
            Operation::List | Operation::Update => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed",
                "could not save the updated todo",
            ),
        }
    }

    fn map(self, err: TodoError) -> ApiError {
        match err {
            TodoError::StoreUnavailable(_) => self.unavailable(),
            TodoError::StoreWriteFailed(_) => self.write_failed(),
            TodoError::NotFound(_) => ApiError::todo_not_found(),
            TodoError::InvalidTodo(message) => ApiError::bad_request(message),
            TodoError::Internal(message) => {
                tracing::error!(operation = ?self, %message, "internal error");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "error",
                    "internal server error",
                )
            }
        }
    }
}

/// Ids that don't parse can't match any record.
fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.trim().parse().map_err(|_| ApiError::todo_not_found())
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

pub async fn list_todos(
    State(state): State<AppState>,
) -> Result<Json<Envelope<TodosPayload>>, ApiError> {
    let todos = state
        .store
        .list()
        .await
        .map_err(|e| Operation::List.map(e))?;
    Ok(Json(Envelope {
        status: "ok",
        data: TodosPayload { todos },
    }))
}

pub async fn create_todo(
    State(state): State<AppState>,
    payload: Result<Json<NewTodo>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<CreatedPayload>>), ApiError> {
    let input = body(payload)?;
    let client_token = input.client_token.clone();
    let todo = state
        .store
        .create(input)
        .await
        .map_err(|e| Operation::Create.map(e))?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope {
            status: "success",
            data: CreatedPayload {
                message: "add successfully",
                todo,
                client_token,
            },
        }),
    ))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TodoPatch>, JsonRejection>,
) -> Result<Json<Envelope<TodoPayload>>, ApiError> {
    let id = parse_id(&id)?;
    let patch = body(payload)?;
    let todo = state
        .store
        .update(id, patch)
        .await
        .map_err(|e| Operation::Update.map(e))?;
    Ok(Json(Envelope {
        status: "success",
        data: TodoPayload { todo },
    }))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state
        .store
        .delete(id)
        .await
        .map_err(|e| Operation::Delete.map(e))?;
    Ok(StatusCode::NO_CONTENT)
}
