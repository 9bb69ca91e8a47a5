//! The dome controller: one context object owning every subsystem state
//! machine and the power scheduler.
//!
//! All subsystem state is reachable only through this aggregate, which the
//! server loop and the polling task share behind a single mutex. Commands
//! mutate state via `execute`; the polling tick advances simulated motion
//! and drives the power scheduler.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config;
use crate::protocol::{
    self, Command, CommandFrame, ProtocolHandler, Reply, ResponseCode, LONG_DURATION,
};
use crate::scheduler::{is_power_managed, PowerDraw, PowerScheduler, SchedulerError};
use crate::subsystems::{
    Amcs, Apscs, Cbcs, Lcs, Llc, LlcName, Lwscs, Moncs, Thcs,
};

enum Outcome {
    /// Command applied; the value is the estimated completion time [s].
    Duration(f64),
    /// Status request answered with the subsystem payload.
    Status(LlcName, Value),
}

pub struct DomeController {
    amcs: Amcs,
    apscs: Apscs,
    cbcs: Cbcs,
    lcs: Lcs,
    lwscs: Lwscs,
    moncs: Moncs,
    thcs: Thcs,
    scheduler: PowerScheduler,
    command_count: u64,
}

impl DomeController {
    pub fn new(start_tai: f64) -> Self {
        info!("starting lower level components");
        Self {
            amcs: Amcs::new(start_tai),
            apscs: Apscs::new(start_tai),
            cbcs: Cbcs::new(),
            lcs: Lcs::new(start_tai),
            lwscs: Lwscs::new(start_tai),
            moncs: Moncs::new(),
            thcs: Thcs::new(start_tai),
            scheduler: PowerScheduler::new(),
            command_count: 0,
        }
    }

    /// Parse, validate and execute one protocol line, producing exactly one
    /// reply.
    pub fn handle_line(
        &mut self,
        line: &str,
        handler: &mut ProtocolHandler,
        tai: f64,
    ) -> Reply {
        let frame: CommandFrame = match protocol::parse_frame(line) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%error, "discarding malformed line");
                return Reply::Error {
                    command_id: protocol::recover_command_id(line).unwrap_or(0),
                    code: ResponseCode::IncorrectParameters,
                };
            }
        };
        let command_id = handler.assign_command_id(frame.command_id);
        match protocol::decode_command(&frame) {
            Ok(command) => self.execute(command_id, command, tai),
            Err(error) => {
                warn!(command = %frame.command, %error, "command rejected");
                Reply::Error {
                    command_id,
                    code: ResponseCode::from(&error),
                }
            }
        }
    }

    /// Execute a validated command. Power-governed commands are queued with
    /// the scheduler unless power management is inactive; everything else is
    /// applied to its subsystem immediately.
    pub fn execute(&mut self, command_id: u64, command: Command, tai: f64) -> Reply {
        self.command_count += 1;
        let kind = command.kind();
        if is_power_managed(kind)
            && self.scheduler.mode() != protocol::PowerManagementMode::NoPowerManagement
        {
            debug!(%kind, "queueing power managed command");
            return match self.scheduler.schedule(command) {
                Ok(()) => Reply::Ack {
                    command_id,
                    timeout: LONG_DURATION,
                },
                Err(error) => {
                    warn!(%kind, %error, "cannot queue command");
                    Reply::Error {
                        command_id,
                        code: ResponseCode::IncorrectState,
                    }
                }
            };
        }
        if is_power_managed(kind) {
            // Power management is inactive, but the draw still has to be
            // attributable once a managed mode is selected.
            self.scheduler.note_executing(kind);
        }
        match self.apply(command, tai) {
            Ok(Outcome::Duration(timeout)) => Reply::Ack {
                command_id,
                timeout,
            },
            Ok(Outcome::Status(llc, payload)) => Reply::Status {
                command_id,
                llc,
                payload,
            },
            Err(code) => Reply::Error { command_id, code },
        }
    }

    /// Advance the simulation to `tai` and let the scheduler dispatch the
    /// next admissible power-managed command, if any.
    pub fn tick(&mut self, tai: f64) {
        self.amcs.advance(tai);
        let draw = self.power_draw(tai);
        if let Some(command) = self.scheduler.next_command(&draw) {
            let kind = command.kind();
            match self.apply(command, tai) {
                Ok(_) => info!(%kind, "dispatched scheduled command"),
                Err(code) => warn!(%kind, code = code.as_i64(), "scheduled command rejected"),
            }
        }
    }

    /// Snapshot of the slip-ring power draw per subsystem [kW].
    pub fn power_draw(&self, tai: f64) -> PowerDraw {
        let mut draw = PowerDraw::new();
        draw.set(LlcName::Apscs, self.apscs.power_draw_kw(tai));
        draw.set(LlcName::Lcs, self.lcs.power_draw_kw(tai));
        draw.set(LlcName::Lwscs, self.lwscs.power_draw_kw(tai));
        draw.set(LlcName::Thcs, self.thcs.power_draw_kw(tai));
        draw
    }

    fn apply(&mut self, command: Command, tai: f64) -> Result<Outcome, ResponseCode> {
        let outcome = match command {
            Command::MoveAz(p) => duration(self.amcs.move_az(p.azimuth, p.az_rate, tai))?,
            Command::CrawlAz(p) => duration(self.amcs.crawl_az(p.az_rate, tai))?,
            Command::StopAz => duration(self.amcs.stop_az(tai))?,
            Command::Park => duration(self.amcs.park(tai))?,
            Command::SetZeroAz => duration(self.amcs.set_zero_az(tai))?,
            Command::ResetDrivesAz(p) => duration(self.amcs.reset_drives(&p.reset, tai))?,
            Command::GoStationaryAz => duration(self.amcs.go_stationary(tai))?,
            Command::SetNormalAz => {
                self.amcs.set_normal();
                Outcome::Duration(0.0)
            }
            Command::SetDegradedAz => {
                self.amcs.set_degraded();
                Outcome::Duration(0.0)
            }
            Command::ExitFaultAz => duration(self.amcs.exit_fault(tai))?,
            Command::Inflate(p) => duration(self.amcs.inflate(p.action, tai))?,

            Command::MoveEl(p) => duration(self.lwscs.move_el(p.elevation, tai))?,
            Command::CrawlEl(p) => duration(self.lwscs.crawl_el(p.el_rate, tai))?,
            Command::StopEl => duration(self.lwscs.stop_el(tai))?,
            Command::GoStationaryEl => duration(self.lwscs.go_stationary(tai))?,
            Command::SetNormalEl => {
                self.lwscs.set_normal();
                Outcome::Duration(0.0)
            }
            Command::SetDegradedEl => {
                self.lwscs.set_degraded();
                Outcome::Duration(0.0)
            }
            Command::ExitFaultEl => duration(self.lwscs.exit_fault(tai))?,

            Command::OpenShutter => duration(self.apscs.open_shutter(tai))?,
            Command::CloseShutter => duration(self.apscs.close_shutter(tai))?,
            Command::StopShutter => duration(self.apscs.stop_shutter(tai))?,
            Command::Home => duration(self.apscs.home(tai))?,
            Command::ResetDrivesShutter(p) => {
                duration(self.apscs.reset_drives(&p.reset, tai))?
            }
            Command::GoStationaryShutter => duration(self.apscs.go_stationary(tai))?,
            Command::SetNormalShutter => {
                self.apscs.set_normal();
                Outcome::Duration(0.0)
            }
            Command::SetDegradedShutter => {
                self.apscs.set_degraded();
                Outcome::Duration(0.0)
            }
            Command::ExitFaultShutter => duration(self.apscs.exit_fault(tai))?,

            Command::SetLouvers(p) => duration(self.lcs.set_louvers(&p.position, tai))?,
            Command::CloseLouvers => duration(self.lcs.close_louvers(tai))?,
            Command::StopLouvers => duration(self.lcs.stop_louvers(tai))?,
            Command::GoStationaryLouvers => duration(self.lcs.go_stationary(tai))?,
            Command::SetNormalLouvers => {
                self.lcs.set_normal();
                Outcome::Duration(0.0)
            }
            Command::SetDegradedLouvers => {
                self.lcs.set_degraded();
                Outcome::Duration(0.0)
            }
            Command::ExitFaultLouvers => duration(self.lcs.exit_fault(tai))?,

            Command::SetTemperature(p) => {
                duration(self.thcs.set_temperature(p.temperature, tai))?
            }
            Command::Fans(p) => duration(self.thcs.fans(p.action, tai))?,
            Command::SetNormalThermal => {
                self.thcs.set_normal();
                Outcome::Duration(0.0)
            }
            Command::SetDegradedThermal => {
                self.thcs.set_degraded();
                Outcome::Duration(0.0)
            }
            Command::ExitFaultThermal => duration(self.thcs.exit_fault(tai))?,

            Command::SetNormalMonitoring => {
                self.moncs.set_normal();
                Outcome::Duration(0.0)
            }
            Command::SetDegradedMonitoring => {
                self.moncs.set_degraded();
                Outcome::Duration(0.0)
            }
            Command::ExitFaultMonitoring => duration(self.moncs.exit_fault(tai))?,

            Command::Restore => {
                self.amcs.restore();
                self.lwscs.restore();
                Outcome::Duration(0.0)
            }
            Command::Config(p) => self.apply_config(p.system, &p.settings, tai)?,
            Command::SetPowerManagementMode(p) => match self.scheduler.set_mode(p.mode) {
                Ok(()) => Outcome::Duration(0.0),
                Err(SchedulerError::UnreachableMode(mode)) => {
                    warn!(?mode, "rejecting power management mode change");
                    return Err(ResponseCode::IncorrectParameters);
                }
                Err(error) => {
                    warn!(%error, "mode change failed");
                    return Err(ResponseCode::IncorrectState);
                }
            },

            Command::StatusAmcs => {
                Outcome::Status(LlcName::Amcs, status_payload(&self.amcs.determine_status(tai)))
            }
            Command::StatusApscs => Outcome::Status(
                LlcName::Apscs,
                status_payload(&self.apscs.determine_status(tai)),
            ),
            Command::StatusCbcs => {
                Outcome::Status(LlcName::Cbcs, status_payload(&self.cbcs.determine_status(tai)))
            }
            Command::StatusLcs => {
                Outcome::Status(LlcName::Lcs, status_payload(&self.lcs.determine_status(tai)))
            }
            Command::StatusLwscs => Outcome::Status(
                LlcName::Lwscs,
                status_payload(&self.lwscs.determine_status(tai)),
            ),
            Command::StatusMoncs => Outcome::Status(
                LlcName::Moncs,
                status_payload(&self.moncs.determine_status(tai)),
            ),
            Command::StatusThcs => {
                Outcome::Status(LlcName::Thcs, status_payload(&self.thcs.determine_status(tai)))
            }
        };
        Ok(outcome)
    }

    fn apply_config(
        &mut self,
        system: LlcName,
        settings: &[config::ConfigSetting],
        tai: f64,
    ) -> Result<Outcome, ResponseCode> {
        let validated = config::validate_batch(system, settings);
        if matches!(&validated, Err(config::ConfigError::NotConfigurable(_))) {
            return Err(ResponseCode::IncorrectParameters);
        }
        // The command reply stays OK even for a rejected batch: the range
        // verification is asynchronous and surfaces via the next status.
        let timeout = match system {
            LlcName::Amcs => {
                let timeout = self.amcs.begin_configuring(tai).map_err(|e| {
                    ResponseCode::from(&e)
                })?;
                match validated {
                    Ok(limits) => self.amcs.apply_limits(limits),
                    Err(error) => {
                        warn!(%system, %error, "configuration batch rejected");
                        self.amcs.record_config_error(&error.to_string());
                    }
                }
                timeout
            }
            LlcName::Lwscs => {
                let timeout = self.lwscs.begin_configuring(tai).map_err(|e| {
                    ResponseCode::from(&e)
                })?;
                match validated {
                    Ok(limits) => self.lwscs.apply_limits(limits),
                    Err(error) => {
                        warn!(%system, %error, "configuration batch rejected");
                        self.lwscs.record_config_error(&error.to_string());
                    }
                }
                timeout
            }
            _ => return Err(ResponseCode::IncorrectParameters),
        };
        Ok(Outcome::Duration(timeout))
    }

    pub fn power_management_mode(&self) -> protocol::PowerManagementMode {
        self.scheduler.mode()
    }

    pub fn command_count(&self) -> u64 {
        self.command_count
    }

    pub fn amcs(&self) -> &Amcs {
        &self.amcs
    }

    pub fn amcs_mut(&mut self) -> &mut Amcs {
        &mut self.amcs
    }

    pub fn apscs_mut(&mut self) -> &mut Apscs {
        &mut self.apscs
    }

    pub fn lcs_mut(&mut self) -> &mut Lcs {
        &mut self.lcs
    }

    pub fn lwscs_mut(&mut self) -> &mut Lwscs {
        &mut self.lwscs
    }

    pub fn moncs_mut(&mut self) -> &mut Moncs {
        &mut self.moncs
    }

    pub fn thcs_mut(&mut self) -> &mut Thcs {
        &mut self.thcs
    }

    pub fn cbcs_mut(&mut self) -> &mut Cbcs {
        &mut self.cbcs
    }
}

fn duration(result: Result<f64, crate::subsystems::LlcError>) -> Result<Outcome, ResponseCode> {
    match result {
        Ok(timeout) => Ok(Outcome::Duration(timeout)),
        Err(error) => {
            debug!(%error, "subsystem rejected command");
            Err(ResponseCode::from(&error))
        }
    }
}

fn status_payload<T: Serialize>(status: &T) -> Value {
    serde_json::to_value(status).unwrap_or_else(|error| {
        warn!(%error, "status serialization failed");
        Value::Null
    })
}
