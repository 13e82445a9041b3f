//! Operator-visible local history: task results and raised alerts.

use chrono::{DateTime, Local};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
struct LogLine {
    at: DateTime<Local>,
    text: String,
}

/// The agent's in-memory task and alert history, shared between the
/// measurement engine and the operator menu.
#[derive(Debug, Default)]
pub struct AgentLogs {
    results: Mutex<Vec<LogLine>>,
    alerts: Mutex<Vec<LogLine>>,
}

impl AgentLogs {
    pub fn push_result(&self, text: &str) {
        self.results.lock().push(LogLine { at: Local::now(), text: text.to_owned() });
    }

    pub fn push_alert(&self, text: &str) {
        self.alerts.lock().push(LogLine { at: Local::now(), text: text.to_owned() });
    }

    pub fn render_results(&self) -> String {
        render(&self.results.lock(), "Nenhuma tarefa executada.")
    }

    pub fn render_alerts(&self) -> String {
        render(&self.alerts.lock(), "Nenhum alerta emitido.")
    }
}

fn render(lines: &[LogLine], empty: &str) -> String {
    if lines.is_empty() {
        return empty.to_owned();
    }
    lines
        .iter()
        .map(|line| format!("[{}] {}", line.at.format("%Y-%m-%d %H:%M:%S"), line.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_logs_render_placeholders() {
        let logs = AgentLogs::default();
        assert_eq!(logs.render_results(), "Nenhuma tarefa executada.");
        assert_eq!(logs.render_alerts(), "Nenhum alerta emitido.");
    }

    #[test]
    fn test_entries_render_in_insertion_order() {
        let logs = AgentLogs::default();
        logs.push_result("primeiro");
        logs.push_result("segundo");

        let rendered = logs.render_results();
        let first = rendered.find("primeiro").unwrap();
        let second = rendered.find("segundo").unwrap();
        assert!(first < second);
    }
}
