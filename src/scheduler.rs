//! Power management scheduler for the slip ring.
//!
//! The slip ring can carry 78 kW continuously and up to 100 kW for at most 6
//! minutes. The exact peak/cool-down model is undetermined upstream, so only
//! the conservative continuous-limit policy is enforced here; the peak
//! figures are kept as documentation constants.
//!
//! Power-consuming commands are queued by ascending priority number (1 is
//! highest, ties broken by arrival order). Safety commands such as the stop
//! commands are not in the priority tables and are never blocked.

use heapless::Vec as BoundedVec;
use static_assertions::const_assert;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::protocol::{Command, CommandKind, OnOffParams, PowerManagementMode};
use crate::subsystems::apscs::APS_POWER_DRAW_KW;
use crate::subsystems::lcs::LOUVERS_POWER_DRAW_KW;
use crate::subsystems::lwscs::LWS_POWER_DRAW_KW;
use crate::subsystems::thcs::FANS_POWER_DRAW_KW;
use crate::subsystems::{LlcName, OnOff, LLC_COUNT};

/// Maximum number of queued power-managed commands.
pub const MAX_QUEUED_COMMANDS: usize = 32;

const_assert!(MAX_QUEUED_COMMANDS >= 2 * LLC_COUNT);

/// The continuous slip ring power capacity [kW].
pub const CONTINUOUS_SLIP_RING_CAPACITY_KW: f64 = 78.0;
/// The peak slip ring power capacity [kW]. Drawing between the continuous
/// and this amount overheats the slip ring and is limited to 6 minutes.
/// The admission policy does not use it; see the module docs.
pub const PEAK_SLIP_RING_CAPACITY_KW: f64 = 100.0;
/// The maximum allowed time over the continuous limit [s].
pub const PEAK_WINDOW_SECONDS: f64 = 360.0;
/// The continuous draw of the electronics cabinets [kW], always reserved.
pub const CONTINUOUS_ELECTRONICS_DRAW_KW: f64 = 1.0;

/// Priority assigned to commands outside the active priority table, e.g.
/// synthesized stop commands. Sorts ahead of every table entry.
pub const HIGH_PRIORITY: u32 = 0;

/// The commands under power management.
pub const POWER_MANAGED_COMMANDS: [CommandKind; 8] = [
    CommandKind::CloseLouvers,
    CommandKind::CloseShutter,
    CommandKind::CrawlEl,
    CommandKind::Fans,
    CommandKind::MoveEl,
    CommandKind::OpenShutter,
    CommandKind::Home,
    CommandKind::SetLouvers,
];

/// Priority table for OPERATIONS mode.
const OPERATIONS_PRIORITIES: &[(CommandKind, u32)] = &[
    (CommandKind::CloseShutter, 1),
    (CommandKind::CloseLouvers, 1),
    (CommandKind::OpenShutter, 10),
    (CommandKind::Home, 10),
    (CommandKind::CrawlEl, 100),
    (CommandKind::MoveEl, 100),
    (CommandKind::SetLouvers, 1000),
    (CommandKind::Fans, 10000),
];

/// Priority table for MAINTENANCE mode.
const MAINTENANCE_PRIORITIES: &[(CommandKind, u32)] = &[
    (CommandKind::CloseShutter, 1),
    (CommandKind::CloseLouvers, 1),
    (CommandKind::MoveEl, 10),
    (CommandKind::CrawlEl, 10),
    (CommandKind::Fans, 100),
    (CommandKind::OpenShutter, 1000),
    (CommandKind::Home, 1000),
    (CommandKind::SetLouvers, 1000),
];

/// Priority table for EMERGENCY mode.
const EMERGENCY_PRIORITIES: &[(CommandKind, u32)] = &[
    (CommandKind::CloseLouvers, 1),
    (CommandKind::CloseShutter, 1),
    (CommandKind::CrawlEl, 10),
    (CommandKind::Fans, 10),
    (CommandKind::MoveEl, 10),
    (CommandKind::OpenShutter, 10),
    (CommandKind::Home, 10),
    (CommandKind::SetLouvers, 10),
];

fn priority_table(mode: PowerManagementMode) -> &'static [(CommandKind, u32)] {
    match mode {
        PowerManagementMode::Operations => OPERATIONS_PRIORITIES,
        PowerManagementMode::Maintenance => MAINTENANCE_PRIORITIES,
        PowerManagementMode::Emergency => EMERGENCY_PRIORITIES,
        PowerManagementMode::NoPowerManagement => &[],
    }
}

/// The priority of a command in the given mode, if the table lists it.
pub fn priority_for(mode: PowerManagementMode, kind: CommandKind) -> Option<u32> {
    priority_table(mode)
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, p)| *p)
}

/// Whether the command is under power management at all.
pub fn is_power_managed(kind: CommandKind) -> bool {
    POWER_MANAGED_COMMANDS.contains(&kind)
}

/// Power required to execute a power-managed command [kW].
pub fn power_required_kw(kind: CommandKind) -> Option<f64> {
    match kind {
        CommandKind::OpenShutter | CommandKind::CloseShutter | CommandKind::Home => {
            Some(APS_POWER_DRAW_KW)
        }
        CommandKind::MoveEl | CommandKind::CrawlEl => Some(LWS_POWER_DRAW_KW),
        CommandKind::SetLouvers | CommandKind::CloseLouvers => Some(LOUVERS_POWER_DRAW_KW),
        CommandKind::Fans => Some(FANS_POWER_DRAW_KW),
        _ => None,
    }
}

/// The subsystem that executes a power-managed command.
pub fn subsystem_for(kind: CommandKind) -> Option<LlcName> {
    match kind {
        CommandKind::OpenShutter | CommandKind::CloseShutter | CommandKind::Home => {
            Some(LlcName::Apscs)
        }
        CommandKind::MoveEl | CommandKind::CrawlEl => Some(LlcName::Lwscs),
        CommandKind::SetLouvers | CommandKind::CloseLouvers => Some(LlcName::Lcs),
        CommandKind::Fans => Some(LlcName::Thcs),
        _ => None,
    }
}

/// The stop command that frees the power drawn by a subsystem.
fn stop_command_for(llc: LlcName) -> Option<Command> {
    match llc {
        LlcName::Lwscs => Some(Command::StopEl),
        LlcName::Lcs => Some(Command::StopLouvers),
        LlcName::Apscs => Some(Command::StopShutter),
        LlcName::Thcs => Some(Command::Fans(OnOffParams { action: OnOff::Off })),
        _ => None,
    }
}

/// Per-subsystem power draw snapshot [kW] handed to the scheduler each
/// polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerDraw {
    per_llc: [f64; LLC_COUNT],
}

impl PowerDraw {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, llc: LlcName, kw: f64) {
        self.per_llc[llc.index()] = kw;
    }

    pub fn get(&self, llc: LlcName) -> f64 {
        self.per_llc[llc.index()]
    }

    pub fn total(&self) -> f64 {
        self.per_llc.iter().sum()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SchedulerError {
    #[error("command queue is full")]
    QueueFull,
    #[error("power management mode {0:?} cannot be selected")]
    UnreachableMode(PowerManagementMode),
}

#[derive(Debug, Clone)]
struct QueuedCommand {
    priority: u32,
    sequence: u64,
    command: Command,
}

/// Priority-preemptive scheduler over the slip-ring budget.
#[derive(Debug)]
pub struct PowerScheduler {
    mode: PowerManagementMode,
    queue: BoundedVec<QueuedCommand, MAX_QUEUED_COMMANDS>,
    next_sequence: u64,
    /// The last power-managed command dispatched per subsystem, consulted to
    /// rank a subsystem's current draw against a queued candidate.
    executing: [Option<CommandKind>; LLC_COUNT],
}

impl PowerScheduler {
    pub fn new() -> Self {
        Self {
            mode: PowerManagementMode::NoPowerManagement,
            queue: BoundedVec::new(),
            next_sequence: 0,
            executing: [None; LLC_COUNT],
        }
    }

    pub fn mode(&self) -> PowerManagementMode {
        self.mode
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Change the power management mode. NO_POWER_MANAGEMENT is the initial
    /// mode but unreachable via a mode change; any accepted change clears
    /// the queue while in-flight commands run to completion.
    pub fn set_mode(&mut self, mode: PowerManagementMode) -> Result<(), SchedulerError> {
        if mode == PowerManagementMode::NoPowerManagement {
            return Err(SchedulerError::UnreachableMode(mode));
        }
        if self.mode != mode {
            let dropped = self.queue.len();
            self.queue.clear();
            if dropped > 0 {
                info!(?mode, dropped, "mode change cleared the command queue");
            }
            self.mode = mode;
        }
        Ok(())
    }

    /// Queue a command. The priority is looked up in the table for the
    /// current mode; commands outside the table sort first and are never
    /// blocked by the budget.
    pub fn schedule(&mut self, command: Command) -> Result<(), SchedulerError> {
        let priority = priority_for(self.mode, command.kind()).unwrap_or(HIGH_PRIORITY);
        let entry = QueuedCommand {
            priority,
            sequence: self.next_sequence,
            command,
        };
        self.next_sequence += 1;
        self.queue
            .push(entry)
            .map_err(|_| SchedulerError::QueueFull)?;
        // Stable order: ascending priority number, FIFO within a priority.
        self.queue
            .sort_unstable_by_key(|c| (c.priority, c.sequence));
        Ok(())
    }

    /// Record that a power-managed command is now executing on a subsystem.
    pub fn note_executing(&mut self, kind: CommandKind) {
        if let Some(llc) = subsystem_for(kind) {
            self.executing[llc.index()] = Some(kind);
        }
    }

    /// The next command that may execute given the current power draw, or
    /// None if nothing is queued or nothing fits this cycle.
    pub fn next_command(&mut self, draw: &PowerDraw) -> Option<Command> {
        let head = self.queue.first()?.clone();
        let kind = head.command.kind();

        let Some(required) = power_required_kw(kind) else {
            // Safety and stop commands bypass the budget entirely.
            self.queue.remove(0);
            return Some(head.command);
        };

        // Switching the fans off frees power and is always allowed.
        if let Command::Fans(params) = &head.command {
            if params.action == OnOff::Off {
                self.queue.remove(0);
                self.note_executing(kind);
                return Some(head.command);
            }
        }

        let own_llc = subsystem_for(kind);
        let budget = CONTINUOUS_SLIP_RING_CAPACITY_KW - CONTINUOUS_ELECTRONICS_DRAW_KW;
        let own_draw = own_llc.map(|llc| draw.get(llc)).unwrap_or(0.0);
        let foreign_draw = draw.total() - own_draw;

        if foreign_draw + required <= budget {
            self.queue.remove(0);
            self.note_executing(kind);
            return Some(head.command);
        }

        // Not enough power: stop every lower-priority consumer; anything
        // drawing at higher or unknown priority makes the candidate wait.
        let mut stop_requested = false;
        for llc in LlcName::ALL {
            if Some(llc) == own_llc || draw.get(llc) <= 0.0 {
                continue;
            }
            let executing_priority = self.executing[llc.index()]
                .and_then(|k| priority_for(self.mode, k));
            match executing_priority {
                Some(priority) if priority > head.priority => {
                    if let Some(stop) = stop_command_for(llc) {
                        if self.already_queued(stop.kind()) {
                            stop_requested = true;
                            continue;
                        }
                        info!(%llc, command = %stop.kind(), "stopping lower priority motion to free power");
                        if self.schedule(stop).is_err() {
                            warn!(%llc, "queue full, cannot schedule stop command");
                        } else {
                            stop_requested = true;
                        }
                    }
                }
                _ => {
                    debug!(%llc, command = %kind, "waiting for higher priority draw to finish");
                }
            }
        }
        if stop_requested {
            debug!(command = %kind, "rescheduled behind synthesized stop commands");
        }
        None
    }

    fn already_queued(&self, kind: CommandKind) -> bool {
        self.queue.iter().any(|c| c.command.kind() == kind)
    }
}

impl Default for PowerScheduler {
    fn default() -> Self {
        Self::new()
    }
}
