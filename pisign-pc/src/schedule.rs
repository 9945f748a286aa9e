//! Weekly power schedule and the on/off decision
//!
//! The backend sends rules of the form
//!
//! ```json
//! {"day_of_week": 1, "turn_on_time": "07:00:00", "shut_down_time": "23:00:00", "is_active": true}
//! ```
//!
//! with `day_of_week` 1 = Monday through 7 = Sunday. Only the first active
//! rule for the current weekday is honoured. A window whose end is earlier
//! than its start runs past midnight.

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// One schedule rule as sent by the backend
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScheduleRule {
    #[serde(default)]
    pub day_of_week: Option<u32>,
    #[serde(default)]
    pub turn_on_time: Option<String>,
    #[serde(default)]
    pub shut_down_time: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl ScheduleRule {
    pub fn new(day_of_week: u32, turn_on_time: &str, shut_down_time: &str) -> Self {
        Self {
            day_of_week: Some(day_of_week),
            turn_on_time: Some(turn_on_time.to_string()),
            shut_down_time: Some(shut_down_time.to_string()),
            is_active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Ordered list of rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    rules: Vec<ScheduleRule>,
}

impl Schedule {
    pub fn new(rules: Vec<ScheduleRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ScheduleRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Build from an arbitrary JSON document
    ///
    /// Anything other than an array yields an empty schedule. Array elements
    /// that are not rule objects are skipped individually.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let Some(items) = value.as_array() else {
            warn!("Invalid schedule format (expected list)");
            return Self::default();
        };

        let rules = items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| match serde_json::from_value(item.clone()) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!(index = idx, error = %e, "Skipping malformed schedule rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// Read the cached schedule file
    ///
    /// A missing or unreadable file is an empty schedule.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No schedule file found");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error reading schedule");
                return Self::default();
            }
        };

        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => Self::from_json(&value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error parsing schedule");
                Self::default()
            }
        }
    }
}

/// Parse `HH:MM` or `HH:MM:SS`, chosen by colon count
pub fn parse_api_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    let format = match text.matches(':').count() {
        1 => "%H:%M",
        2 => "%H:%M:%S",
        _ => return None,
    };
    NaiveTime::parse_from_str(text, format).ok()
}

/// Whether `now` falls inside the window `[start, end]`
///
/// `start > end` denotes a window crossing midnight.
pub fn in_window(start: NaiveTime, end: NaiveTime, now: NaiveTime) -> bool {
    if start <= end {
        start <= now && now <= end
    } else {
        now >= start || now <= end
    }
}

/// Decide whether the display should be on at `at`
///
/// Empty schedule or no usable active rule for the weekday means off.
pub fn decide(schedule: &Schedule, at: NaiveDateTime) -> bool {
    if schedule.is_empty() {
        debug!("Empty or missing schedule; defaulting to OFF");
        return false;
    }

    let today = at.weekday().number_from_monday();
    let now = at.time();

    for rule in schedule.rules() {
        if !rule.is_active || rule.day_of_week != Some(today) {
            continue;
        }

        let (Some(start_text), Some(end_text)) = (&rule.turn_on_time, &rule.shut_down_time) else {
            continue;
        };

        let (Some(start), Some(end)) = (parse_api_time(start_text), parse_api_time(end_text)) else {
            warn!(
                day = today,
                turn_on_time = %start_text,
                shut_down_time = %end_text,
                "Error parsing schedule times; skipping rule"
            );
            continue;
        };

        // First usable rule for today decides; later ones are ignored
        return in_window(start, end, now);
    }

    debug!(day = today, "No active schedule for today; defaulting to OFF");
    false
}
