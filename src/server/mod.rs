//! HTTP front of the todo store.
//!
//! Four routes under [`API_BASE_PATH`], all sharing one injected [`TodoStore`].

use crate::todo_manager::TodoStore;
use axum::middleware::from_fn;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;

pub mod handlers;
pub mod middleware;

pub const API_BASE_PATH: &str = "/api/v1";

#[derive(Clone)]
pub struct AppState {
    pub store: TodoStore,
}

impl AppState {
    pub fn new(store: TodoStore) -> Self {
        Self { store }
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/getAllTodos", get(handlers::list_todos))
        .route("/addTodo", post(handlers::create_todo))
        .route("/updateTodo/:id", patch(handlers::update_todo))
        .route("/deleteTodo/:id", delete(handlers::delete_todo));

    Router::new()
        .nest(API_BASE_PATH, api)
        .layer(from_fn(middleware::cors))
        .layer(from_fn(middleware::request_tracing))
        .with_state(state)
}

/// Serves the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, store: TodoStore, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("todo api listening on http://{}{}", addr, API_BASE_PATH);
    }
    let app = build_router(AppState::new(store));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn wait_for_shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
