use axum::extract::{Form, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::Error;
use crate::llm;
use crate::schedule::{self, Strategy, Timeline};
use crate::server::{Server, ServerError};
use crate::store;
use crate::tasks::{
    DependencyRef, DependencyView, ProcessTodo, ResetResult, Task, TaskDependencies, TaskList,
    TaskListDetail,
};


#[derive(Clone, Debug, Default, Deserialize)]
pub struct TimelineQuery {
    pub strategy: Option<String>,
}


pub async fn home() -> Redirect {
    Redirect::to("/task-lists")
}


pub async fn list_task_lists(
    State(server): State<Arc<Server>>
) -> Result<Json<Vec<TaskList>>, ServerError> {
    Ok(Json(server.store.with(store::list_task_lists).await?))
}


pub async fn create_task_list(
    State(server): State<Arc<Server>>,
    Form(form): Form<ProcessTodo>
) -> Result<Redirect, ServerError> {
    let name = form.task_list_name.trim();
    let todo_text = form.todo_text.trim();
    if name.is_empty() || todo_text.is_empty() {
        return Err(ServerError::Validation(
            "Task list name and todo text are required".to_string()
        ));
    }

    let groomer = match server.groomer {
        Some(ref groomer) => groomer,
        None => {
            return Err(ServerError::NotConfigured(llm::Error::MissingApiKey.to_string()));
        }
    };

    tracing::info!(%name, "grooming todo list");
    let (task_list, _analysis) = groomer
        .process_todo(&server.store, name, todo_text, form.context.trim())
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "grooming failed");
            ServerError::from(err)
        })?;

    Ok(Redirect::to(&format!("/task-lists/{}", task_list.id)))
}


pub async fn get_task_list(
    State(server): State<Arc<Server>>,
    Path(id): Path<i64>
) -> Result<Json<TaskListDetail>, ServerError> {
    let detail = server.store
        .with(|conn| {
            Ok::<_, Error>(TaskListDetail {
                task_list: store::get_task_list(conn, id)?,
                tasks: store::list_tasks(conn, id)?,
                total_estimated_time: store::total_estimated_time(conn, id)?,
            })
        })
        .await?;

    Ok(Json(detail))
}


pub async fn delete_task_list(
    State(server): State<Arc<Server>>,
    Path(id): Path<i64>
) -> Result<StatusCode, ServerError> {
    server.store.with(|conn| store::delete_task_list(conn, id)).await?;
    tracing::info!(task_list = id, "deleted task list");
    Ok(StatusCode::NO_CONTENT)
}


pub async fn dependencies(
    State(server): State<Arc<Server>>,
    Path(id): Path<i64>
) -> Result<Json<DependencyView>, ServerError> {
    let view = server.store
        .with(|conn| {
            let task_list = store::get_task_list(conn, id)?;
            let mut tasks = vec![];
            for task in store::list_tasks(conn, id)? {
                let dependencies: Vec<DependencyRef> = store::dependencies(conn, &task)?
                    .into_iter()
                    .map(|dep| DependencyRef { task_id: dep.task_id, title: dep.title })
                    .collect();
                tasks.push(TaskDependencies {
                    has_no_dependencies: dependencies.is_empty(),
                    task,
                    dependencies,
                });
            }
            Ok::<_, Error>(DependencyView { task_list, tasks })
        })
        .await?;

    Ok(Json(view))
}


pub async fn timeline(
    State(server): State<Arc<Server>>,
    Path(id): Path<i64>,
    Query(query): Query<TimelineQuery>
) -> Result<Json<Timeline>, ServerError> {
    let strategy = match query.strategy {
        Some(ref s) => Strategy::parse(s)?,
        None => Strategy::default(),
    };

    let timeline = server.store
        .with(|conn| {
            let task_list = store::get_task_list(conn, id)?;
            let tasks = store::list_tasks(conn, id)?;
            let edges = store::dependency_edges(conn, id)?;
            let plan = schedule::plan(&tasks, &edges, strategy)?;
            let schedule = store::save_schedule(conn, id, strategy, plan.total, &plan.blocks)?;
            Ok::<_, Error>(schedule::timeline(task_list, schedule, tasks))
        })
        .await?;

    Ok(Json(timeline))
}


pub async fn complete_task(
    State(server): State<Arc<Server>>,
    Path(task_id): Path<String>
) -> Result<Json<Task>, ServerError> {
    let task = server.store
        .with(|conn| store::mark_completed(conn, &task_id))
        .await?;
    Ok(Json(task))
}


pub async fn reset_database(State(server): State<Arc<Server>>) -> impl IntoResponse {
    match server.store.transaction(store::reset).await {
        Ok((tasks, task_lists)) => {
            tracing::info!(tasks, task_lists, "database reset");
            (
                StatusCode::OK,
                Json(ResetResult {
                    success: true,
                    message: format!(
                        "Database reset successfully. Deleted {} tasks and {} task lists.",
                        tasks, task_lists
                    ),
                }),
            )
        }
        Err(err) => {
            tracing::error!(error = %err, "database reset failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ResetResult {
                    success: false,
                    message: format!("Failed to reset database: {}", err),
                }),
            )
        }
    }
}
