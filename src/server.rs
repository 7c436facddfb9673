use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use std::sync::Arc;

use crate::error::Error;
use crate::groom::{GroomError, Groomer};
use crate::store::Store;

mod handlers;


pub struct Server {
    pub store: Store,
    pub groomer: Option<Groomer>,
}

impl Server {
    pub fn new(store: Store, groomer: Option<Groomer>) -> Self {
        Self { store, groomer }
    }
}


#[derive(Debug)]
pub enum ServerError {
    TaskListNotFound(i64),
    TaskNotFound(String),
    Validation(String),
    BadRequest(String),
    NotConfigured(String),
    Groom(String),
    Conflict(String),
    InternalServerError(String),
}

impl From<Error> for ServerError {
    fn from(err: Error) -> Self {
        match err {
            Error::TaskListNotFound(id) => Self::TaskListNotFound(id),
            Error::TaskNotFound(id) => Self::TaskNotFound(id),
            Error::InvalidStrategy(_) | Error::InvalidPriority(_) => {
                Self::BadRequest(err.to_string())
            }
            Error::CircularDependency { .. } | Error::UnresolvedDependencies(_) => {
                Self::Conflict(err.to_string())
            }
            _ => Self::InternalServerError(err.to_string()),
        }
    }
}

impl From<GroomError> for ServerError {
    fn from(err: GroomError) -> Self {
        match err {
            GroomError::NotConfigured(_) => Self::NotConfigured(err.to_string()),
            GroomError::Request(_) | GroomError::Malformed(_) => Self::Groom(err.to_string()),
            GroomError::Store(err) => err.into(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::http::Response<axum::body::Body> {
        match self {
            ServerError::TaskListNotFound(id) => {
                (
                    StatusCode::NOT_FOUND,
                    format!("Task list not found: {}", id)
                ).into_response()
            }
            ServerError::TaskNotFound(id) => {
                (
                    StatusCode::NOT_FOUND,
                    format!("Task not found: {}", id)
                ).into_response()
            }
            ServerError::Validation(message) => {
                error_body(StatusCode::UNPROCESSABLE_ENTITY, message)
            }
            ServerError::BadRequest(message) => {
                error_body(StatusCode::BAD_REQUEST, message)
            }
            ServerError::NotConfigured(message) => {
                error_body(StatusCode::SERVICE_UNAVAILABLE, message)
            }
            ServerError::Groom(message) => {
                error_body(StatusCode::BAD_GATEWAY, message)
            }
            ServerError::Conflict(message) => {
                error_body(StatusCode::CONFLICT, message)
            }
            ServerError::InternalServerError(message) => {
                tracing::error!(%message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}

fn error_body(
    status: StatusCode,
    message: String
) -> axum::http::Response<axum::body::Body> {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}


pub fn router(server: Arc<Server>) -> axum::Router {
    axum::Router::new()
        .route("/", get(handlers::home))
        .route("/task-lists", get(handlers::list_task_lists).post(handlers::create_task_list))
        .route(
            "/task-lists/:id",
            get(handlers::get_task_list).delete(handlers::delete_task_list)
        )
        .route("/task-lists/:id/dependencies", get(handlers::dependencies))
        .route("/task-lists/:id/timeline", get(handlers::timeline))
        .route("/tasks/:task_id/complete", post(handlers::complete_task))
        .route("/reset-database", post(handlers::reset_database))
        .with_state(server)
}


pub async fn serve(
    server: Arc<Server>,
    listener: tokio::net::TcpListener
) -> Result<(), std::io::Error> {
    axum::serve(listener, router(server)).await
}
