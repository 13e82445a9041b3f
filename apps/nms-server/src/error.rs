use std::io;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

/// Task-file loading failures. Everything wire-side is absorbed at the
/// receive site; only the operator-driven loader surfaces errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("task file unreadable: {0}")]
    TaskFileRead(#[source] io::Error),
    #[error("task file invalid: {0}")]
    TaskFileParse(#[source] serde_json::Error),
    #[error("task {task_id}: unknown task type {raw}")]
    UnknownTaskType { task_id: u16, raw: u8 },
    #[error("task {task_id}: target {data:?} is not an IPv4 address")]
    BadTarget { task_id: u16, data: String },
}
