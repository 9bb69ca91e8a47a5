use domebus::controller::DomeController;
use domebus::protocol::{ProtocolHandler, ResponseCode};
use domebus::scheduler::{CONTINUOUS_ELECTRONICS_DRAW_KW, CONTINUOUS_SLIP_RING_CAPACITY_KW};
use domebus::subsystems::amcs::AmcsStatus;
use domebus::subsystems::lwscs::LwscsStatus;
use domebus::subsystems::MotionState;
use serde_json::{json, Value};

fn handle(controller: &mut DomeController, handler: &mut ProtocolHandler, tai: f64, line: &str) -> Value {
    controller.handle_line(line, handler, tai).to_json()
}

fn status_payload(reply: &Value, llc: &str) -> Value {
    reply
        .get(llc)
        .unwrap_or_else(|| panic!("reply should carry a {llc} payload: {reply}"))
        .clone()
}

#[test]
fn test_scenario_move_az_then_crawl() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();

    let reply = handle(
        &mut controller,
        &mut handler,
        0.0,
        r#"{"commandId": 1, "command": "moveAz", "parameters": {"azimuth": 1.3962634015954636, "azRate": 0.001}}"#,
    );
    assert_eq!(reply["response"], json!(0));
    let timeout = reply["timeout"].as_f64().unwrap();
    assert!(timeout > 0.0);

    // While the move runs the status shows MOVING with increasing position.
    let reply = handle(&mut controller, &mut handler, 10.0, r#"{"commandId": 2, "command": "statusAMCS"}"#);
    let status: AmcsStatus = serde_json::from_value(status_payload(&reply, "AMCS")).unwrap();
    assert_eq!(status.status.status, MotionState::Moving);
    assert!(status.position_actual > 0.0);
    assert!(status.position_actual < 1.3962634015954636);

    // After the move completes the dome crawls at the commanded rate.
    let late = timeout + 10.0;
    let reply = handle(&mut controller, &mut handler, late, r#"{"commandId": 3, "command": "statusAMCS"}"#);
    let status: AmcsStatus = serde_json::from_value(status_payload(&reply, "AMCS")).unwrap();
    assert_eq!(status.status.status, MotionState::Crawling);
    assert!((status.velocity_actual - 0.001).abs() < 1e-9);
    assert!(status.position_actual > 1.39);
}

#[test]
fn test_scenario_config_out_of_range_surfaces_in_status() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();

    let reply = handle(
        &mut controller,
        &mut handler,
        0.0,
        r#"{"commandId": 1, "command": "config", "parameters": {"system": "AMCS", "settings": [{"target": "vmax", "setting": [99.0]}]}}"#,
    );
    // The command reply itself is OK; the verification is asynchronous.
    assert_eq!(reply["response"], json!(0));
    assert!(reply["timeout"].as_f64().unwrap() > 0.0);

    let reply = handle(&mut controller, &mut handler, 5.0, r#"{"commandId": 2, "command": "statusAMCS"}"#);
    let status: AmcsStatus = serde_json::from_value(status_payload(&reply, "AMCS")).unwrap();
    let default_vmax = 1.5_f64.to_radians();
    assert!((status.applied_configuration.vmax - default_vmax).abs() < 1e-12);
    assert!(
        status.status.messages.iter().any(|m| m.code != 0),
        "status should carry a configuration error message"
    );
}

#[test]
fn test_scenario_commands_rejected_while_configuring() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();

    let reply = handle(
        &mut controller,
        &mut handler,
        0.0,
        r#"{"commandId": 1, "command": "config", "parameters": {"system": "AMCS", "settings": [{"target": "jmax", "setting": [0.05]}, {"target": "amax", "setting": [0.013]}, {"target": "vmax", "setting": [0.026]}]}}"#,
    );
    assert_eq!(reply["response"], json!(0));

    // A motion command inside the configuration window is refused.
    let reply = handle(
        &mut controller,
        &mut handler,
        1.0,
        r#"{"commandId": 2, "command": "moveAz", "parameters": {"azimuth": 1.0, "azRate": 0.0}}"#,
    );
    assert_eq!(reply["response"], json!(ResponseCode::Configuring.as_i64()));
    assert_eq!(reply["timeout"], json!(-1.0));

    // Status stays available and unaffected.
    let reply = handle(&mut controller, &mut handler, 1.0, r#"{"commandId": 3, "command": "statusAMCS"}"#);
    let status: AmcsStatus = serde_json::from_value(status_payload(&reply, "AMCS")).unwrap();
    assert_eq!(status.status.status, MotionState::Configuring);
    assert_eq!(status.position_actual, 0.0);

    // After the window the new limits are applied.
    let reply = handle(&mut controller, &mut handler, 5.0, r#"{"commandId": 4, "command": "statusAMCS"}"#);
    let status: AmcsStatus = serde_json::from_value(status_payload(&reply, "AMCS")).unwrap();
    assert!((status.applied_configuration.vmax - 0.026).abs() < 1e-12);
}

#[test]
fn test_config_batch_is_all_or_nothing() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();

    // jmax and amax are valid, vmax is not: none of them may be applied.
    handle(
        &mut controller,
        &mut handler,
        0.0,
        r#"{"commandId": 1, "command": "config", "parameters": {"system": "LWSCS", "settings": [{"target": "jmax", "setting": [0.01]}, {"target": "amax", "setting": [0.01]}, {"target": "vmax", "setting": [99.0]}]}}"#,
    );
    let reply = handle(&mut controller, &mut handler, 5.0, r#"{"commandId": 2, "command": "statusLWSCS"}"#);
    let status: LwscsStatus = serde_json::from_value(status_payload(&reply, "LWSCS")).unwrap();
    let defaults = domebus::config::default_limits(domebus::subsystems::LlcName::Lwscs).unwrap();
    assert_eq!(status.applied_configuration.jmax, defaults.jmax);
    assert_eq!(status.applied_configuration.amax, defaults.amax);
    assert_eq!(status.applied_configuration.vmax, defaults.vmax);
}

#[test]
fn test_duplicate_move_az_is_idempotent() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();

    let line = r#"{"commandId": 1, "command": "moveAz", "parameters": {"azimuth": 1.0, "azRate": 0.0}}"#;
    let reply = handle(&mut controller, &mut handler, 0.0, line);
    assert_eq!(reply["response"], json!(0));
    let timeout = reply["timeout"].as_f64().unwrap();

    let settled = timeout + 1.0;
    let reply = handle(&mut controller, &mut handler, settled, line);
    assert_eq!(reply["response"], json!(0));

    // No new motion was scheduled: the dome reports STOPPED immediately.
    let reply = handle(&mut controller, &mut handler, settled + 0.1, r#"{"commandId": 2, "command": "statusAMCS"}"#);
    let status: AmcsStatus = serde_json::from_value(status_payload(&reply, "AMCS")).unwrap();
    assert_eq!(status.status.status, MotionState::Stopped);
}

#[test]
fn test_unknown_command_reply() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();
    let reply = handle(&mut controller, &mut handler, 0.0, r#"{"commandId": 9, "command": "selfDestruct"}"#);
    assert_eq!(reply["commandId"], json!(9));
    assert_eq!(reply["response"], json!(2));
    assert_eq!(reply["timeout"], json!(-1.0));
}

#[test]
fn test_malformed_line_reply_recovers_command_id() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();
    let reply = handle(&mut controller, &mut handler, 0.0, r#"{"commandId": 31, "command": "moveAz", "parameters": {"#);
    assert_eq!(reply["commandId"], json!(31));
    assert_eq!(reply["response"], json!(3));
}

#[test]
fn test_command_in_error_state_is_refused() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();
    controller.amcs_mut().set_fault(&[1, 0, 0, 0, 0], 0.0);

    let reply = handle(
        &mut controller,
        &mut handler,
        1.0,
        r#"{"commandId": 1, "command": "moveAz", "parameters": {"azimuth": 1.0, "azRate": 0.0}}"#,
    );
    assert_eq!(reply["response"], json!(ResponseCode::IncorrectState.as_i64()));

    // Status requests still work while in ERROR.
    let reply = handle(&mut controller, &mut handler, 1.0, r#"{"commandId": 2, "command": "statusAMCS"}"#);
    let status: AmcsStatus = serde_json::from_value(status_payload(&reply, "AMCS")).unwrap();
    assert_eq!(status.status.status, MotionState::Error);

    // Recovery: reset drives per subsystem, then exit fault.
    let reply = handle(&mut controller, &mut handler, 2.0, r#"{"commandId": 3, "command": "exitFaultAz"}"#);
    assert_eq!(reply["response"], json!(ResponseCode::IncorrectState.as_i64()));
    let reply = handle(
        &mut controller,
        &mut handler,
        2.0,
        r#"{"commandId": 4, "command": "resetDrivesAz", "parameters": {"reset": [1, 0, 0, 0, 0]}}"#,
    );
    assert_eq!(reply["response"], json!(0));
    let reply = handle(&mut controller, &mut handler, 3.0, r#"{"commandId": 5, "command": "exitFaultAz"}"#);
    assert_eq!(reply["response"], json!(0));
}

#[test]
fn test_exit_fault_is_per_subsystem() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();
    controller.amcs_mut().set_fault(&[0; 5], 0.0);
    controller.thcs_mut().set_fault();

    // Clearing the thermal fault leaves the azimuth fault in place.
    let reply = handle(&mut controller, &mut handler, 1.0, r#"{"commandId": 1, "command": "exitFaultThermal"}"#);
    assert_eq!(reply["response"], json!(0));
    let reply = handle(&mut controller, &mut handler, 1.0, r#"{"commandId": 2, "command": "statusAMCS"}"#);
    let status: AmcsStatus = serde_json::from_value(status_payload(&reply, "AMCS")).unwrap();
    assert_eq!(status.status.status, MotionState::Error);
}

#[test]
fn test_status_payloads_round_trip_through_their_schema() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();

    for (line, llc) in [
        (r#"{"commandId": 1, "command": "statusAMCS"}"#, "AMCS"),
        (r#"{"commandId": 2, "command": "statusApSCS"}"#, "ApSCS"),
        (r#"{"commandId": 3, "command": "statusCBCS"}"#, "CBCS"),
        (r#"{"commandId": 4, "command": "statusLCS"}"#, "LCS"),
        (r#"{"commandId": 5, "command": "statusLWSCS"}"#, "LWSCS"),
        (r#"{"commandId": 6, "command": "statusMonCS"}"#, "MonCS"),
        (r#"{"commandId": 7, "command": "statusThCS"}"#, "ThCS"),
    ] {
        let reply = handle(&mut controller, &mut handler, 1.0, line);
        assert_eq!(reply["response"], json!(0), "status {llc} should succeed");
        assert!(reply.get("timeout").is_none(), "status replies have no timeout");
        let payload = status_payload(&reply, llc);
        // Round-trip against the declared schema for the subsystem.
        match llc {
            "AMCS" => {
                serde_json::from_value::<AmcsStatus>(payload).unwrap();
            }
            "ApSCS" => {
                serde_json::from_value::<domebus::subsystems::apscs::ApscsStatus>(payload)
                    .unwrap();
            }
            "CBCS" => {
                serde_json::from_value::<domebus::subsystems::cbcs::CbcsStatus>(payload).unwrap();
            }
            "LCS" => {
                serde_json::from_value::<domebus::subsystems::lcs::LcsStatus>(payload).unwrap();
            }
            "LWSCS" => {
                serde_json::from_value::<LwscsStatus>(payload).unwrap();
            }
            "MonCS" => {
                serde_json::from_value::<domebus::subsystems::moncs::MoncsStatus>(payload)
                    .unwrap();
            }
            "ThCS" => {
                serde_json::from_value::<domebus::subsystems::thcs::ThcsStatus>(payload).unwrap();
            }
            _ => unreachable!(),
        }
    }
}

#[test]
fn test_scenario_power_preemption_stops_lower_priority_motion() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();

    // Open the louvers first, while power management is still inactive,
    // so closing them later is real work.
    let positions = vec![100.0; 34];
    let set_louvers = format!(
        r#"{{"commandId": 1, "command": "setLouvers", "parameters": {{"position": {}}}}}"#,
        serde_json::to_string(&positions).unwrap()
    );
    let reply = handle(&mut controller, &mut handler, 0.0, &set_louvers);
    assert_eq!(reply["response"], json!(0));

    let reply = handle(
        &mut controller,
        &mut handler,
        12.0,
        r#"{"commandId": 2, "command": "setPowerManagementMode", "parameters": {"mode": "OPERATIONS"}}"#,
    );
    assert_eq!(reply["response"], json!(0));

    // crawlEl is queued, then dispatched by the next polling cycle.
    let reply = handle(&mut controller, &mut handler, 12.0, r#"{"commandId": 3, "command": "crawlEl", "parameters": {"elRate": 0.01}}"#);
    assert_eq!(reply["response"], json!(0));
    controller.tick(13.0);
    let reply = handle(&mut controller, &mut handler, 13.5, r#"{"commandId": 4, "command": "statusLWSCS"}"#);
    let status: LwscsStatus = serde_json::from_value(status_payload(&reply, "LWSCS")).unwrap();
    assert_eq!(status.status.status, MotionState::Crawling);
    assert!(status.power_draw > 0.0);

    // The screen draws near the continuous limit; closing the louvers first
    // synthesizes a stopEl.
    let reply = handle(&mut controller, &mut handler, 14.0, r#"{"commandId": 5, "command": "closeLouvers"}"#);
    assert_eq!(reply["response"], json!(0));

    controller.tick(14.0); // schedules stopEl
    controller.tick(15.0); // dispatches stopEl

    let reply = handle(&mut controller, &mut handler, 16.0, r#"{"commandId": 6, "command": "statusLWSCS"}"#);
    let status: LwscsStatus = serde_json::from_value(status_payload(&reply, "LWSCS")).unwrap();
    assert_eq!(status.status.status, MotionState::Stopped);

    // Only then are the louvers admitted.
    controller.tick(16.0);
    let reply = handle(&mut controller, &mut handler, 16.5, r#"{"commandId": 7, "command": "statusLCS"}"#);
    let payload = status_payload(&reply, "LCS");
    let states = payload["status"]["status"].as_array().unwrap();
    assert!(states.iter().all(|s| s == "MOVING"));
}

#[test]
fn test_scenario_no_power_management_mode_is_rejected() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();

    handle(
        &mut controller,
        &mut handler,
        0.0,
        r#"{"commandId": 1, "command": "setPowerManagementMode", "parameters": {"mode": "MAINTENANCE"}}"#,
    );
    let reply = handle(
        &mut controller,
        &mut handler,
        1.0,
        r#"{"commandId": 2, "command": "setPowerManagementMode", "parameters": {"mode": "NO_POWER_MANAGEMENT"}}"#,
    );
    assert_ne!(reply["response"], json!(0));
    assert_eq!(reply["timeout"], json!(-1.0));
    assert_eq!(
        controller.power_management_mode(),
        domebus::protocol::PowerManagementMode::Maintenance
    );
}

#[test]
fn test_power_invariant_holds_across_polling_ticks() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();

    handle(
        &mut controller,
        &mut handler,
        0.0,
        r#"{"commandId": 1, "command": "setPowerManagementMode", "parameters": {"mode": "OPERATIONS"}}"#,
    );
    // Pile up work that cannot all run at once: shutter + louvers + screen +
    // fans sum to well over the continuous budget.
    handle(&mut controller, &mut handler, 0.0, r#"{"commandId": 2, "command": "openShutter"}"#);
    handle(&mut controller, &mut handler, 0.0, r#"{"commandId": 3, "command": "closeLouvers"}"#);
    handle(&mut controller, &mut handler, 0.0, r#"{"commandId": 4, "command": "moveEl", "parameters": {"elevation": 1.0}}"#);
    handle(&mut controller, &mut handler, 0.0, r#"{"commandId": 5, "command": "fans", "parameters": {"action": "ON"}}"#);

    let budget = CONTINUOUS_SLIP_RING_CAPACITY_KW - CONTINUOUS_ELECTRONICS_DRAW_KW;
    for tick in 1..120 {
        let tai = tick as f64;
        controller.tick(tai);
        let draw = controller.power_draw(tai).total();
        assert!(
            draw <= budget + 1e-9,
            "power draw {draw} kW exceeds the continuous budget at t={tai}"
        );
    }
    // Everything eventually ran: the fans are the last to be admitted.
    let reply = handle(&mut controller, &mut handler, 200.0, r#"{"commandId": 6, "command": "statusThCS"}"#);
    let payload = status_payload(&reply, "ThCS");
    assert_eq!(payload["status"]["fans"], json!("ON"));
}

#[test]
fn test_mode_change_clears_pending_commands() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();

    handle(
        &mut controller,
        &mut handler,
        0.0,
        r#"{"commandId": 1, "command": "setPowerManagementMode", "parameters": {"mode": "OPERATIONS"}}"#,
    );
    handle(&mut controller, &mut handler, 0.0, r#"{"commandId": 2, "command": "openShutter"}"#);
    // The queued openShutter is dropped by the mode change and never runs.
    handle(
        &mut controller,
        &mut handler,
        0.5,
        r#"{"commandId": 3, "command": "setPowerManagementMode", "parameters": {"mode": "EMERGENCY"}}"#,
    );
    for tick in 1..10 {
        controller.tick(tick as f64);
    }
    let reply = handle(&mut controller, &mut handler, 10.0, r#"{"commandId": 4, "command": "statusApSCS"}"#);
    let payload = status_payload(&reply, "ApSCS");
    assert_eq!(payload["positionActual"], json!([0.0, 0.0]));
}

#[test]
fn test_power_managed_commands_run_immediately_without_management() {
    let mut controller = DomeController::new(0.0);
    let mut handler = ProtocolHandler::new();

    // Initial mode is NO_POWER_MANAGEMENT: no queueing, immediate reply
    // with the real duration.
    let reply = handle(&mut controller, &mut handler, 0.0, r#"{"commandId": 1, "command": "openShutter"}"#);
    assert_eq!(reply["response"], json!(0));
    assert!((reply["timeout"].as_f64().unwrap() - 10.0).abs() < 1e-9);

    let reply = handle(&mut controller, &mut handler, 5.0, r#"{"commandId": 2, "command": "statusApSCS"}"#);
    let payload = status_payload(&reply, "ApSCS");
    assert_eq!(payload["status"]["status"], json!("MOVING"));
}
