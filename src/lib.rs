//! # Dome Controller Simulator
//!
//! A lower-level dome controller simulator/gateway: a TCP server speaking a
//! line-delimited JSON command protocol that drives the hardware subsystem
//! state machines of an observatory dome and arbitrates power-consuming
//! commands against the slip-ring power budget.
//!
//! ## Features
//!
//! - **Motion profiling**: jerk-limited trapezoidal velocity profiles for
//!   bounded moves and unbounded crawls
//! - **Subsystem state machines**: azimuth rotation, aperture shutter,
//!   louvers, light/wind screen, thermal control, interlock monitoring and
//!   capacitor banks
//! - **Power management**: a priority-preemptive scheduler over the 78 kW
//!   continuous slip-ring budget with mode-dependent priorities
//! - **Schema-validated protocol**: typed command parameters, stable
//!   response codes, CR+LF framed JSON replies
//!
//! ## Quick Start
//!
//! ```rust
//! use domebus::controller::DomeController;
//! use domebus::protocol::{Command, MoveAzParams};
//!
//! let mut controller = DomeController::new(0.0);
//! let reply = controller.execute(
//!     1,
//!     Command::MoveAz(MoveAzParams { azimuth: 1.0, az_rate: 0.0 }),
//!     0.0,
//! );
//! println!("{}", reply.to_json());
//! ```
//!
//! ## Architecture
//!
//! - [`controller`] - the aggregate owning all subsystem state
//! - [`subsystems`] - individual subsystem state machines
//! - [`protocol`] - command/reply wire protocol
//! - [`scheduler`] - power management over the slip-ring budget
//! - [`motion`] - jerk-limited motion profiles
//! - [`config`] - configuration parameter limit tables

#![deny(warnings)]
#![deny(clippy::all)]

pub mod config;
pub mod controller;
pub mod motion;
pub mod protocol;
pub mod scheduler;
pub mod subsystems;

// Re-export main public types for convenience
pub use controller::DomeController;
pub use motion::{MotionLimits, MotionProfile};
pub use protocol::{Command, CommandKind, PowerManagementMode, Reply, ResponseCode};
pub use scheduler::{PowerDraw, PowerScheduler};
