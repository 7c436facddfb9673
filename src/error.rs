#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Task list not found: {0}")]
    TaskListNotFound(i64),
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Circular dependency: {task} cannot depend on {dependency}")]
    CircularDependency { task: String, dependency: String },
    #[error("Invalid priority: {0}")]
    InvalidPriority(String),
    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),
    #[error("Dependency cycle among tasks: {0:?}")]
    UnresolvedDependencies(Vec<String>),
    #[error("Could not generate a unique task id")]
    TaskIdsExhausted,
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
