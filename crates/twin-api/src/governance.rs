//! Climate-signal record kept alongside the engine: latest readings, accumulated CO2, and a
//! bounded alert log.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::signal::SignalReading;

pub const INITIAL_CYCLE_ID: u64 = 1_000;
pub const INITIAL_TEMPERATURE_CELSIUS: f64 = 31.0;
pub const INITIAL_PRECIPITATION: f64 = 0.5;
pub const INITIAL_CO2_PPM: f64 = 418.0;
/// Oldest alerts are dropped past this many.
pub const ALERT_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: u64,
    pub kind: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub cycle_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GovernanceState {
    pub cycle_id: u64,
    pub temperature_current: f64,
    pub precipitation_current: f64,
    pub co2_ppm: f64,
    pub anomaly_detected: bool,
    /// Newest first.
    alerts: VecDeque<Alert>,
    next_alert_id: u64,
}

impl Default for GovernanceState {
    fn default() -> Self {
        Self {
            cycle_id: INITIAL_CYCLE_ID,
            temperature_current: INITIAL_TEMPERATURE_CELSIUS,
            precipitation_current: INITIAL_PRECIPITATION,
            co2_ppm: INITIAL_CO2_PPM,
            anomaly_detected: false,
            alerts: VecDeque::with_capacity(ALERT_CAPACITY),
            next_alert_id: 1,
        }
    }
}

impl GovernanceState {
    /// Folds one accepted reading into the record and returns the new cycle id.
    pub fn record(&mut self, reading: &SignalReading) -> u64 {
        self.cycle_id += 1;
        self.temperature_current = reading.temperature;
        self.precipitation_current = reading.precipitation;
        self.co2_ppm += reading.co2_delta;
        self.anomaly_detected = reading.is_anomalous();
        if self.anomaly_detected {
            self.log_alert(
                "climate_anomaly",
                AlertSeverity::High,
                format!("Heat spike detected: {}°C", reading.temperature),
            );
        }
        self.cycle_id
    }

    pub fn log_alert(&mut self, kind: &str, severity: AlertSeverity, message: String) {
        let alert = Alert {
            id: self.next_alert_id,
            kind: kind.to_string(),
            severity,
            message,
            cycle_id: self.cycle_id,
        };
        self.next_alert_id += 1;
        self.alerts.push_front(alert);
        self.alerts.truncate(ALERT_CAPACITY);
    }

    /// At most `limit` alerts, newest first.
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.alerts.iter().take(limit).cloned().collect()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_accumulate_co2_and_advance_cycle() {
        let mut state = GovernanceState::default();
        let reading = SignalReading {
            precipitation: 2.5,
            co2_delta: 0.25,
            ..SignalReading::new(29.0)
        };
        assert_eq!(state.record(&reading), INITIAL_CYCLE_ID + 1);
        assert_eq!(state.record(&reading), INITIAL_CYCLE_ID + 2);

        assert!((state.co2_ppm - (INITIAL_CO2_PPM + 0.5)).abs() < 1e-9);
        assert_eq!(state.temperature_current, 29.0);
        assert_eq!(state.precipitation_current, 2.5);
        assert!(!state.anomaly_detected);
        assert_eq!(state.alert_count(), 0);
    }

    #[test]
    fn anomaly_flag_follows_latest_reading() {
        let mut state = GovernanceState::default();
        state.record(&SignalReading::new(40.0));
        assert!(state.anomaly_detected);
        state.record(&SignalReading::new(25.0));
        assert!(!state.anomaly_detected);
        assert_eq!(state.alert_count(), 1);
    }

    #[test]
    fn alert_log_keeps_newest_twenty() {
        let mut state = GovernanceState::default();
        for step in 0..25 {
            state.record(&SignalReading::new(39.0 + f64::from(step)));
        }
        assert_eq!(state.alert_count(), ALERT_CAPACITY);

        let alerts = state.recent_alerts(usize::MAX);
        assert_eq!(alerts.len(), ALERT_CAPACITY);
        assert_eq!(alerts[0].id, 25);
        assert_eq!(alerts[ALERT_CAPACITY - 1].id, 6);
        assert!(alerts[0].message.contains("63"));
        assert_eq!(state.recent_alerts(3).len(), 3);
    }
}
