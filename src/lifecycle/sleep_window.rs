//! Recurring hour-range during which idle agents are parked `sleeping`
//! (spec §4.6.6). A window wraps midnight when `start_hour >= end_hour`.
use crate::models::SleepScheduleConfig;
use chrono::{TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::str::FromStr;
use tokio::sync::RwLock;

pub struct SleepWindow {
    config: RwLock<SleepScheduleConfig>,
}

impl SleepWindow {
    pub fn new(config: SleepScheduleConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    pub async fn get(&self) -> SleepScheduleConfig {
        self.config.read().await.clone()
    }

    pub async fn set(&self, config: SleepScheduleConfig) {
        *self.config.write().await = config;
    }

    pub async fn is_in_sleep_window(&self, now_secs: i64) -> bool {
        let config = self.config.read().await;
        in_sleep_window(&config, now_secs)
    }
}

pub fn in_sleep_window(config: &SleepScheduleConfig, now_secs: i64) -> bool {
    if !config.enabled {
        return false;
    }
    let tz = Tz::from_str(&config.timezone).unwrap_or(chrono_tz::UTC);
    let hour = match Utc.timestamp_opt(now_secs, 0) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&tz).hour() as u8,
        _ => return false,
    };
    hour_in_range(config.start_hour, config.end_hour, hour)
}

fn hour_in_range(start: u8, end: u8, hour: u8) -> bool {
    match start.cmp(&end) {
        std::cmp::Ordering::Less => hour >= start && hour < end,
        std::cmp::Ordering::Greater => hour >= start || hour < end,
        std::cmp::Ordering::Equal => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(start: u8, end: u8) -> SleepScheduleConfig {
        SleepScheduleConfig {
            start_hour: start,
            end_hour: end,
            timezone: "UTC".to_string(),
            enabled: true,
        }
    }

    fn timestamp_at_hour(hour: u8) -> i64 {
        // 1970-01-01 at `hour`:00:00 UTC.
        hour as i64 * 3600
    }

    #[test]
    fn wraps_around_midnight() {
        let cfg = config(22, 6);
        assert!(in_sleep_window(&cfg, timestamp_at_hour(0)));
        assert!(!in_sleep_window(&cfg, timestamp_at_hour(6)));
        assert!(in_sleep_window(&cfg, timestamp_at_hour(23)));
        assert!(!in_sleep_window(&cfg, timestamp_at_hour(12)));
    }

    #[test]
    fn disabled_window_is_never_active() {
        let mut cfg = config(22, 6);
        cfg.enabled = false;
        assert!(!in_sleep_window(&cfg, timestamp_at_hour(0)));
    }

    #[test]
    fn non_wrapping_window() {
        let cfg = config(9, 17);
        assert!(in_sleep_window(&cfg, timestamp_at_hour(10)));
        assert!(!in_sleep_window(&cfg, timestamp_at_hour(18)));
    }

    #[tokio::test]
    async fn handle_reflects_updates() {
        let window = SleepWindow::new(config(22, 6));
        assert!(window.is_in_sleep_window(timestamp_at_hour(0)).await);

        let mut disabled = config(22, 6);
        disabled.enabled = false;
        window.set(disabled).await;
        assert!(!window.is_in_sleep_window(timestamp_at_hour(0)).await);
    }
}
