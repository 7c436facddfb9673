pub mod client;
pub mod command;
pub mod config;
mod error;
pub mod groom;
pub mod llm;
pub mod schedule;
pub mod server;
pub mod store;
mod tasks;

pub use client::Client;
pub use command::{Cli, Command};
pub use config::Config;
pub use error::Error;
pub use groom::{Groomed, GroomedTask, GroomError, Groomer};
pub use schedule::{Schedule, Strategy, Timeline};
pub use server::{serve, Server};
pub use store::Store;
pub use tasks::{
    DependencyRef, DependencyView, NewTask, Priority, ProcessTodo, ResetResult, Task,
    TaskDependencies, TaskList, TaskListDetail,
};
