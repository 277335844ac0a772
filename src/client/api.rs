use crate::models::{NewTodo, Todo, TodoPatch};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:1234/api/v1";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server responded with {code}: {message}")]
    Status { code: u16, message: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("{0}")]
    Invalid(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Status { code: 404, .. })
    }
}

/// Server confirmation of a create, carrying the echoed client token.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    pub message: String,
    pub todo: Todo,
    #[serde(default)]
    pub client_token: Option<String>,
}

/// The four calls the board makes. Implemented over HTTP by [`HttpTodoApi`].
#[allow(async_fn_in_trait)]
pub trait TodoApi {
    async fn list(&self) -> Result<Vec<Todo>, ClientError>;
    async fn create(&self, input: &NewTodo) -> Result<Created, ClientError>;
    async fn update(&self, id: u64, patch: &TodoPatch) -> Result<Todo, ClientError>;
    async fn delete(&self, id: u64) -> Result<(), ClientError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TodosData {
    todos: Vec<Todo>,
}

#[derive(Debug, Deserialize)]
struct TodoData {
    todo: Todo,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    message: String,
}

pub struct HttpTodoApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTodoApi {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = match resp.json::<Envelope<MessageData>>().await {
            Ok(envelope) => envelope.data.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        Err(ClientError::Status {
            code: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let resp = Self::check(resp).await?;
        let envelope: Envelope<T> = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }
}

impl TodoApi for HttpTodoApi {
    async fn list(&self) -> Result<Vec<Todo>, ClientError> {
        let resp = self.client.get(self.url("/getAllTodos")).send().await?;
        let data: TodosData = Self::decode(resp).await?;
        Ok(data.todos)
    }

    async fn create(&self, input: &NewTodo) -> Result<Created, ClientError> {
        let resp = self
            .client
            .post(self.url("/addTodo"))
            .json(input)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn update(&self, id: u64, patch: &TodoPatch) -> Result<Todo, ClientError> {
        let resp = self
            .client
            .patch(self.url(&format!("/updateTodo/{}", id)))
            .json(patch)
            .send()
            .await?;
        let data: TodoData = Self::decode(resp).await?;
        Ok(data.todo)
    }

    async fn delete(&self, id: u64) -> Result<(), ClientError> {
        let resp = self
            .client
            .delete(self.url(&format!("/deleteTodo/{}", id)))
            .send()
            .await?;
        Self::check(resp).await.map(|_| ())
    }
}
