//! Threshold evaluation and the AlertFlow client.

use std::collections::HashMap;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::time::Instant;

use nettask_proto::constants::ALERT_COOLDOWN;
use tracing::{info, warn};

use crate::config::Thresholds;
use crate::engine::Metric;

/// Decides when a reading becomes an alert, enforcing the per-metric
/// cooldown between repeated alerts.
pub struct ThresholdEvaluator {
    thresholds: Thresholds,
    last_alert: HashMap<Metric, Instant>,
}

impl ThresholdEvaluator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds, last_alert: HashMap::new() }
    }

    /// Returns the alert text when `value` exceeds the configured limit for
    /// `metric` and the previous alert for it is more than the cooldown ago.
    /// Suppressed breaches do not reset the cooldown clock.
    pub fn evaluate(
        &mut self,
        metric: Metric,
        value: f64,
        reading: &str,
        now: Instant,
    ) -> Option<String> {
        let limit = match metric {
            Metric::Cpu => self.thresholds.cpu_usage,
            Metric::Ram => self.thresholds.ram_usage,
        }?;
        if value <= limit {
            return None;
        }
        if let Some(last) = self.last_alert.get(&metric) {
            if now.duration_since(*last) <= ALERT_COOLDOWN {
                return None;
            }
        }
        self.last_alert.insert(metric, now);
        Some(match metric {
            Metric::Cpu => format!("Alerta de uso elevado do CPU: {reading}"),
            Metric::Ram => format!("Alerta de uso elevado da RAM: {reading}"),
        })
    }
}

/// Ships one alert: fresh connection, UTF-8 text, close. Failures are
/// logged and never retried.
pub fn send_alert(server: SocketAddr, text: &str) {
    match TcpStream::connect(server) {
        Ok(mut stream) => match stream.write_all(text.as_bytes()) {
            Ok(()) => info!(target: "alertflow", %server, "alert sent: {text}"),
            Err(e) => warn!(target: "alertflow", %server, "alert write failed: {e}"),
        },
        Err(e) => warn!(target: "alertflow", %server, "connection failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn evaluator(cpu: Option<f64>, ram: Option<f64>) -> ThresholdEvaluator {
        ThresholdEvaluator::new(Thresholds { cpu_usage: cpu, ram_usage: ram })
    }

    #[test]
    fn test_breach_formats_alert_around_reading() {
        let mut eval = evaluator(Some(50.0), None);
        let alert = eval
            .evaluate(Metric::Cpu, 87.5, "Percentagem de uso da CPU: 87.50%", Instant::now())
            .unwrap();
        assert_eq!(alert, "Alerta de uso elevado do CPU: Percentagem de uso da CPU: 87.50%");
    }

    #[test]
    fn test_value_at_or_below_limit_is_quiet() {
        let mut eval = evaluator(Some(50.0), None);
        assert!(eval.evaluate(Metric::Cpu, 50.0, "x", Instant::now()).is_none());
        assert!(eval.evaluate(Metric::Cpu, 12.0, "x", Instant::now()).is_none());
    }

    #[test]
    fn test_unconfigured_metric_never_alerts() {
        let mut eval = evaluator(Some(50.0), None);
        assert!(eval.evaluate(Metric::Ram, 99.0, "x", Instant::now()).is_none());
    }

    #[test]
    fn test_cooldown_suppresses_then_reopens() {
        let mut eval = evaluator(Some(50.0), None);
        let t0 = Instant::now();

        assert!(eval.evaluate(Metric::Cpu, 87.5, "x", t0).is_some());
        // A second breach 2 s later stays quiet.
        assert!(eval.evaluate(Metric::Cpu, 90.0, "x", t0 + Duration::from_secs(2)).is_none());
        // 6 s after the first alert the metric may alert again.
        assert!(eval.evaluate(Metric::Cpu, 90.0, "x", t0 + Duration::from_secs(6)).is_some());
    }

    #[test]
    fn test_cooldowns_are_per_metric() {
        let mut eval = evaluator(Some(50.0), Some(50.0));
        let t0 = Instant::now();

        assert!(eval.evaluate(Metric::Cpu, 87.5, "x", t0).is_some());
        // The RAM cooldown is independent of the CPU one.
        assert!(eval.evaluate(Metric::Ram, 87.5, "x", t0 + Duration::from_secs(1)).is_some());
    }
}
