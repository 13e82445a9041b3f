//! The operator-loaded task definition file: a JSON array of task objects
//! with fixed capitalised field names.

use std::path::Path;

use nettask_proto::{AgentId, Task, TaskData, TaskType};
use serde::Deserialize;

use crate::error::{ServerError, ServerResult};

fn default_frequency() -> u8 {
    5
}

fn default_duration() -> u8 {
    30
}

/// One entry of the task file, as written by the operator.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEntry {
    #[serde(rename = "Agent_ID")]
    pub agent_id: String,
    #[serde(rename = "Task_ID")]
    pub task_id: u16,
    #[serde(rename = "Task_Type")]
    pub task_type: u8,
    #[serde(rename = "Interface_Check", default)]
    pub interface_check: String,
    #[serde(rename = "Data", default)]
    pub data: String,
    #[serde(rename = "Frequency", default = "default_frequency")]
    pub frequency: u8,
    #[serde(rename = "Duration", default = "default_duration")]
    pub duration: u8,
}

impl TaskEntry {
    /// Converts the file entry into a wire task plus its target agent.
    pub fn into_task(self) -> ServerResult<(AgentId, Task)> {
        let task_type = TaskType::from_wire(self.task_type)
            .map_err(|_| ServerError::UnknownTaskType { task_id: self.task_id, raw: self.task_type })?;
        let data = if task_type.takes_target() {
            let target = self
                .data
                .parse()
                .map_err(|_| ServerError::BadTarget { task_id: self.task_id, data: self.data.clone() })?;
            TaskData::Target(target)
        } else {
            TaskData::Text(self.data)
        };
        Ok((
            AgentId::from_host(&self.agent_id),
            Task {
                task_id: self.task_id,
                task_type,
                interface_check: self.interface_check,
                data,
                frequency: self.frequency,
                duration: self.duration,
            },
        ))
    }
}

/// Loads and validates every entry of a task file.
pub fn load_tasks(path: &Path) -> ServerResult<Vec<(AgentId, Task)>> {
    let data = std::fs::read_to_string(path).map_err(ServerError::TaskFileRead)?;
    let entries: Vec<TaskEntry> = serde_json::from_str(&data).map_err(ServerError::TaskFileParse)?;
    entries.into_iter().map(TaskEntry::into_task).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::Ipv4Addr;

    fn write_tasks(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{json}").unwrap();
        file
    }

    #[test]
    fn test_load_applies_frequency_and_duration_defaults() {
        let file = write_tasks(
            r#"[{"Agent_ID": "A01", "Task_ID": 42, "Task_Type": 1, "Data": ""}]"#,
        );
        let tasks = load_tasks(file.path()).unwrap();

        let (agent, task) = &tasks[0];
        assert_eq!(*agent, AgentId::from_host("A01"));
        assert_eq!(task.frequency, 5);
        assert_eq!(task.duration, 30);
        assert_eq!(task.task_type, TaskType::Cpu);
        assert_eq!(task.data, TaskData::Text(String::new()));
    }

    #[test]
    fn test_load_parses_target_for_ping_types() {
        let file = write_tasks(
            r#"[{"Agent_ID": "A01", "Task_ID": 7, "Task_Type": 3,
                 "Data": "10.0.0.1", "Frequency": 5, "Duration": 10}]"#,
        );
        let tasks = load_tasks(file.path()).unwrap();
        assert_eq!(tasks[0].1.data, TaskData::Target(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_load_rejects_bad_target() {
        let file = write_tasks(
            r#"[{"Agent_ID": "A01", "Task_ID": 7, "Task_Type": 4, "Data": "not-an-ip"}]"#,
        );
        let err = load_tasks(file.path()).unwrap_err();
        assert!(matches!(err, ServerError::BadTarget { task_id: 7, .. }));
    }

    #[test]
    fn test_load_rejects_unknown_task_type() {
        let file = write_tasks(r#"[{"Agent_ID": "A01", "Task_ID": 7, "Task_Type": 9}]"#);
        let err = load_tasks(file.path()).unwrap_err();
        assert!(matches!(err, ServerError::UnknownTaskType { task_id: 7, raw: 9 }));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = load_tasks(Path::new("/nonexistent/tasks.json")).unwrap_err();
        assert!(matches!(err, ServerError::TaskFileRead(_)));
    }
}
