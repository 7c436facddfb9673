use serde::de::DeserializeOwned;

use crate::schedule::{Strategy, Timeline};
use crate::tasks::{DependencyView, ProcessTodo, ResetResult, Task, TaskListDetail};


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },
}


/// HTTP client for a running MindTimer server.
#[derive(Clone, Debug)]
pub struct Client {
    reqwest: reqwest::Client,
    server: String,
}

impl Client {
    pub fn new(server: String) -> Self {
        Self {
            reqwest: reqwest::Client::new(),
            server: server.trim_end_matches('/').to_string(),
        }
    }

    /// Submits a todo text. The server redirects to the stored list, which
    /// reqwest follows.
    pub async fn groom(&self, todo: &ProcessTodo) -> Result<TaskListDetail, Error> {
        let response = self.reqwest
            .post(&format!("{}/task-lists", self.server))
            .form(todo)
            .send()
            .await?;

        read(response).await
    }

    pub async fn task_list(&self, id: i64) -> Result<TaskListDetail, Error> {
        self.get(&format!("{}/task-lists/{}", self.server, id)).await
    }

    pub async fn dependencies(&self, id: i64) -> Result<DependencyView, Error> {
        self.get(&format!("{}/task-lists/{}/dependencies", self.server, id)).await
    }

    pub async fn timeline(
        &self,
        id: i64,
        strategy: Option<Strategy>
    ) -> Result<Timeline, Error> {
        let mut url = format!("{}/task-lists/{}/timeline", self.server, id);
        if let Some(strategy) = strategy {
            url.push_str(&format!("?strategy={}", strategy));
        }
        self.get(&url).await
    }

    pub async fn complete(&self, task_id: &str) -> Result<Task, Error> {
        let response = self.reqwest
            .post(&format!("{}/tasks/{}/complete", self.server, task_id))
            .send()
            .await?;

        read(response).await
    }

    pub async fn reset(&self) -> Result<ResetResult, Error> {
        let response = self.reqwest
            .post(&format!("{}/reset-database", self.server))
            .send()
            .await?;

        read(response).await
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        read(self.reqwest.get(url).send().await?).await
    }
}


async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(Error::Server { status: status.as_u16(), message });
    }

    Ok(response.json().await?)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::groom::tests::canned;
    use crate::server::{self, Server};
    use crate::store::Store;

    async fn spawn_server() -> Client {
        let server = Arc::new(Server::new(
            Store::memory().unwrap(),
            Some(canned(
                r#"{"analysis": "Simple task breakdown with basic prioritization.",
                    "tasks": [{"task": "Call dentist to schedule appointment", "gen_task_id": "a101",
                               "time_estimate": "00:05", "dependencies": [], "priority": "medium"}]}"#,
            )),
        ));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server::serve(server, listener));
        Client::new(format!("http://{}/", addr))
    }

    #[tokio::test]
    async fn round_trip_through_server() {
        let client = spawn_server().await;

        let detail = client
            .groom(&ProcessTodo {
                task_list_name: "Errands".into(),
                todo_text: "call the dentist".into(),
                context: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(detail.task_list.name, "Errands");
        assert_eq!(detail.total_estimated_time, 5);

        let timeline = client
            .timeline(detail.task_list.id, Some(Strategy::Sequential))
            .await
            .unwrap();
        assert_eq!(timeline.current, Some(0));

        let task = client.complete(&detail.tasks[0].task_id).await.unwrap();
        assert!(task.completed);

        let reset = client.reset().await.unwrap();
        assert!(reset.success);
        assert_eq!(reset.message, "Database reset successfully. Deleted 1 tasks and 1 task lists.");
    }

    #[tokio::test]
    async fn server_errors_carry_status() {
        let client = spawn_server().await;
        match client.task_list(404).await {
            Err(Error::Server { status, message }) => {
                assert_eq!(status, 404);
                assert!(message.contains("404"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
