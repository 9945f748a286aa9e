//! Power actuator
//!
//! Turns a desired on/off into control-bus commands, once per transition.
//! The persisted [`PowerStateStore`] is the memory of what was last applied;
//! a desired state equal to it is a no-op.
//!
//! The new state is persisted after the command is attempted, even when it
//! failed, so an unresponsive bus cannot wedge every later run into retrying.

use crate::cec::{CecBus, CecCommand, ReportedPower};
use crate::power_state::{PowerState, PowerStateStore};
use pisign_common::Result;
use tracing::{debug, info, warn};

/// What [`PowerActuator::apply`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actuation {
    /// Persisted state already matched
    Unchanged,
    /// Display already reported the desired state; only the record changed
    AlreadyInState,
    /// A command was sent
    Sent(CecCommand),
}

/// Applies desired power states to the display
pub struct PowerActuator<B: CecBus> {
    bus: B,
    store: PowerStateStore,
    verify_state: bool,
}

impl<B: CecBus> PowerActuator<B> {
    pub fn new(bus: B, store: PowerStateStore) -> Self {
        Self {
            bus,
            store,
            verify_state: true,
        }
    }

    /// Query reported power before sending a command (default on)
    pub fn with_verify_state(mut self, verify_state: bool) -> Self {
        self.verify_state = verify_state;
        self
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Drive the display to `desired` if it differs from the last applied state
    ///
    /// Fails only when the new state cannot be persisted.
    pub async fn apply(&self, desired: bool) -> Result<Actuation> {
        let desired = PowerState::from_bool(desired);
        let last = self.store.load();

        if last == Some(desired) {
            debug!(state = %desired, "Display already in desired state; nothing to do");
            return Ok(Actuation::Unchanged);
        }

        info!(
            from = last.map(|s| s.as_str()).unwrap_or("unknown"),
            to = %desired,
            "Power transition"
        );

        let command = self.choose_command(desired).await;
        let actuation = match command {
            Some(command) => {
                self.send(command).await;
                Actuation::Sent(command)
            }
            None => Actuation::AlreadyInState,
        };

        self.store.store(desired)?;
        Ok(actuation)
    }

    async fn choose_command(&self, desired: PowerState) -> Option<CecCommand> {
        let reported = if self.verify_state {
            let reported = self.bus.power_status().await;
            info!(
                wants = %desired,
                reported = ?reported,
                "Display reported power state"
            );
            reported
        } else {
            None
        };

        match (desired, reported) {
            (PowerState::On, Some(ReportedPower::Standby)) => {
                info!("Display in standby; sending aggressive wake sequence");
                Some(CecCommand::AggressiveWake)
            }
            (PowerState::On, Some(ReportedPower::On)) => {
                info!("Display already ON; no command sent");
                None
            }
            (PowerState::On, None) => Some(CecCommand::PowerOn),
            (PowerState::Off, Some(ReportedPower::Standby)) => {
                info!("Display already in standby; no command sent");
                None
            }
            (PowerState::Off, _) => Some(CecCommand::Standby),
        }
    }

    async fn send(&self, command: CecCommand) {
        match self.bus.execute(command).await {
            Ok(output) if output.success() => {
                debug!(command = ?command, "Control command succeeded");
            }
            Ok(output) => {
                warn!(
                    command = ?command,
                    status = ?output.status,
                    stderr = %output.stderr.trim(),
                    "Control command exited with failure"
                );
            }
            Err(e) => warn!(command = ?command, error = %e, "Control command failed"),
        }
    }
}
