//! # pisign Power Control (pisign-pc)
//!
//! Decides from the cached weekly schedule whether the display should be on
//! and drives it over HDMI-CEC, sending a command only when the desired
//! state changes.
//!
//! The schedule cache itself is refreshed by `pisign-schedule-sync`
//! ([`schedule_sync`]).

pub mod actuator;
pub mod cec;
pub mod power_state;
pub mod schedule;
pub mod schedule_sync;

pub use actuator::{Actuation, PowerActuator};
pub use cec::{CecBus, CecClient, CecCommand, ReportedPower};
pub use power_state::{PowerState, PowerStateStore};
pub use schedule::{decide, Schedule, ScheduleRule};
pub use schedule_sync::ScheduleClient;
