use std::f64::consts::{FRAC_PI_2, PI};

use domebus::subsystems::amcs::{Amcs, SealState};
use domebus::subsystems::apscs::{Apscs, CLOSED_POSITION, OPEN_POSITION};
use domebus::subsystems::lcs::{Lcs, DO_NOT_MOVE, NUM_LOUVERS};
use domebus::subsystems::lwscs::{Lwscs, MAX_POSITION};
use domebus::subsystems::thcs::{Thcs, FANS_POWER_DRAW_KW, TEMPERATURE_SETTLE_TIME};
use domebus::subsystems::{Llc, LlcError, MotionState, OnOff};

#[test]
fn test_amcs_starts_parked_at_zero() {
    let amcs = Amcs::new(0.0);
    assert_eq!(amcs.motion_state(0.0), MotionState::Parked);
    assert_eq!(amcs.position(0.0), 0.0);
    assert_eq!(amcs.velocity(0.0), 0.0);
}

#[test]
fn test_amcs_move_transitions_and_converges() {
    let mut amcs = Amcs::new(0.0);
    let target = 1.3962634015954636;
    let duration = amcs.move_az(target, 0.0, 0.0).unwrap();
    assert!(duration > 0.0);

    let vmax = amcs.limits().vmax;
    let amax = amcs.limits().amax;
    let mut previous_distance = target;
    let mut t = 0.5;
    while t < duration {
        assert_eq!(amcs.motion_state(t), MotionState::Moving);
        assert!(amcs.velocity(t).abs() <= vmax + 1e-9);
        let distance = (target - amcs.position(t)).abs();
        assert!(distance <= previous_distance + 1e-9);
        previous_distance = distance;
        t += 0.5;
    }
    // Sampled acceleration stays bounded as well.
    let mid_velocity_change = amcs.velocity(duration / 2.0 + 0.1) - amcs.velocity(duration / 2.0);
    assert!((mid_velocity_change / 0.1).abs() <= amax + 1e-6);

    assert_eq!(amcs.motion_state(duration + 1.0), MotionState::Stopped);
    assert!((amcs.position(duration + 1.0) - target).abs() < 1e-6);
}

#[test]
fn test_amcs_move_then_crawl() {
    let mut amcs = Amcs::new(0.0);
    let duration = amcs.move_az(1.3962634015954636, 0.001, 0.0).unwrap();
    assert_eq!(amcs.motion_state(duration / 2.0), MotionState::Moving);
    let late = duration + 30.0;
    assert_eq!(amcs.motion_state(late), MotionState::Crawling);
    assert!((amcs.velocity(late) - 0.001).abs() < 1e-9);
    assert!(amcs.position(late) > 1.3962634015954636);
}

#[test]
fn test_amcs_duplicate_move_is_suppressed() {
    let mut amcs = Amcs::new(0.0);
    let duration = amcs.move_az(1.0, 0.0, 0.0).unwrap();
    let settled = duration + 1.0;
    assert_eq!(amcs.motion_state(settled), MotionState::Stopped);

    // Same target, zero velocity, already there: no new motion.
    let again = amcs.move_az(1.0, 0.0, settled).unwrap();
    assert_eq!(again, 0.0);
    assert_eq!(amcs.motion_state(settled + 0.1), MotionState::Stopped);
    assert!((amcs.position(settled + 10.0) - 1.0).abs() < 1e-6);
}

#[test]
fn test_amcs_move_wraps_through_zero() {
    let mut amcs = Amcs::new(0.0);
    // 0.1 rad short of a full turn: the short way is backwards.
    let target = 2.0 * PI - 0.1;
    let duration = amcs.move_az(target, 0.0, 0.0).unwrap();
    let expected = 0.1 / amcs.limits().vmax;
    assert!(duration < expected * 2.0);
    let position = amcs.position(duration + 1.0);
    assert!((position - target).abs() < 1e-6);
}

#[test]
fn test_amcs_stop_while_moving() {
    let mut amcs = Amcs::new(0.0);
    amcs.move_az(3.0, 0.0, 0.0).unwrap();
    let stop_duration = amcs.stop_az(20.0).unwrap();
    assert_eq!(amcs.motion_state(20.0 + stop_duration / 2.0), MotionState::Stopping);
    let stopped = 20.0 + stop_duration + 0.1;
    assert_eq!(amcs.motion_state(stopped), MotionState::Stopped);
    assert_eq!(amcs.velocity(stopped), 0.0);
}

#[test]
fn test_amcs_crawl_and_crawl_zero() {
    let mut amcs = Amcs::new(0.0);
    amcs.crawl_az(0.004, 0.0).unwrap();
    assert_eq!(amcs.motion_state(100.0), MotionState::Crawling);
    assert!((amcs.velocity(100.0) - 0.004).abs() < 1e-9);

    // Crawling at exactly zero velocity degrades to a stop.
    let duration = amcs.crawl_az(0.0, 100.0).unwrap();
    assert_eq!(amcs.motion_state(100.0 + duration + 0.1), MotionState::Stopped);
}

#[test]
fn test_amcs_crawl_position_wraps() {
    let mut amcs = Amcs::new(0.0);
    amcs.crawl_az(0.02, 0.0).unwrap();
    // Long enough to pass 2 pi several times.
    let position = amcs.position(1000.0);
    assert!((0.0..2.0 * PI).contains(&position));
}

#[test]
fn test_amcs_park_engages_aux_machinery() {
    let mut amcs = Amcs::new(0.0);
    amcs.move_az(1.0, 0.0, 0.0).unwrap();
    amcs.advance(5.0);
    let duration = amcs.park(5.0).unwrap();
    assert_eq!(amcs.motion_state(5.0 + duration / 2.0), MotionState::Parking);
    let parked = 5.0 + duration + 0.1;
    amcs.advance(parked);
    assert_eq!(amcs.motion_state(parked), MotionState::Parked);
    let residual = domebus::subsystems::angle_diff(amcs.position(parked), 0.0);
    assert!(residual.abs() < 1e-6);
    // Seal re-inflates after the transition time.
    amcs.advance(parked + 2.0);
    let status = amcs.determine_status(parked + 2.0);
    assert_eq!(status.status.seal_state, SealState::Inflated);
}

#[test]
fn test_amcs_set_zero_only_at_rest() {
    let mut amcs = Amcs::new(0.0);
    amcs.move_az(1.0, 0.0, 0.0).unwrap();
    let err = amcs.set_zero_az(5.0).unwrap_err();
    assert!(matches!(err, LlcError::InvalidState { .. }));

    let duration = amcs.stop_az(5.0).unwrap();
    let settled = 5.0 + duration + 0.1;
    amcs.set_zero_az(settled).unwrap();
    assert_eq!(amcs.position(settled), 0.0);
}

#[test]
fn test_amcs_fault_requires_drive_reset() {
    let mut amcs = Amcs::new(0.0);
    amcs.move_az(1.0, 0.0, 0.0).unwrap();
    amcs.set_fault(&[1, 0, 0, 0, 1], 5.0);
    assert_eq!(amcs.motion_state(6.0), MotionState::Error);
    assert_eq!(amcs.velocity(6.0), 0.0);

    // Any command but exitFault is refused while in ERROR.
    let err = amcs.move_az(2.0, 0.0, 6.0).unwrap_err();
    assert!(matches!(err, LlcError::InvalidState { .. }));

    // exitFault itself is refused until the drives are reset.
    assert_eq!(amcs.exit_fault(6.0).unwrap_err(), LlcError::DrivesInError);
    amcs.reset_drives(&[1, 0, 0, 0, 1], 6.0).unwrap();
    amcs.exit_fault(7.0).unwrap();
    assert_eq!(amcs.motion_state(7.0), MotionState::Stationary);
    // The position is frozen where the fault occurred.
    assert!(amcs.position(7.0) > 0.0);
}

#[test]
fn test_amcs_rejects_crawl_beyond_vmax() {
    let mut amcs = Amcs::new(0.0);
    let vmax = amcs.limits().vmax;
    let err = amcs.crawl_az(vmax * 2.0, 0.0).unwrap_err();
    assert!(matches!(err, LlcError::InvalidParameter { .. }));
}

#[test]
fn test_lwscs_move_and_range_check() {
    let mut lwscs = Lwscs::new(0.0);
    let duration = lwscs.move_el(0.5, 0.0).unwrap();
    assert!(duration > 0.0);
    assert_eq!(lwscs.motion_state(duration / 2.0), MotionState::Moving);
    assert!((lwscs.position(duration + 1.0) - 0.5).abs() < 1e-6);

    let err = lwscs.move_el(FRAC_PI_2 + 0.1, duration + 1.0).unwrap_err();
    assert!(matches!(err, LlcError::PositionOutOfRange { .. }));
    let err = lwscs.move_el(-0.1, duration + 1.0).unwrap_err();
    assert!(matches!(err, LlcError::PositionOutOfRange { .. }));
}

#[test]
fn test_lwscs_crawl_holds_at_range_boundary() {
    let mut lwscs = Lwscs::new(0.0);
    lwscs.crawl_el(0.01, 0.0).unwrap();
    // Long after the crawl would have left the range.
    let late = 10_000.0;
    assert!((lwscs.position(late) - MAX_POSITION).abs() < 1e-9);
    assert_eq!(lwscs.velocity(late), 0.0);
    assert_eq!(lwscs.motion_state(late), MotionState::Stopped);
}

#[test]
fn test_lwscs_power_draw_follows_motion() {
    let mut lwscs = Lwscs::new(0.0);
    assert_eq!(lwscs.power_draw_kw(0.0), 0.0);
    let duration = lwscs.move_el(1.0, 0.0).unwrap();
    assert!(lwscs.power_draw_kw(duration / 2.0) > 0.0);
    assert_eq!(lwscs.power_draw_kw(duration + 1.0), 0.0);
}

#[test]
fn test_apscs_open_close_and_stop() {
    let mut apscs = Apscs::new(0.0);
    let duration = apscs.open_shutter(0.0).unwrap();
    assert!((duration - 10.0).abs() < 1e-9);
    assert_eq!(apscs.motion_state(5.0), MotionState::Moving);

    // Stop halfway: both channels hold the same partial position.
    apscs.stop_shutter(5.0).unwrap();
    let positions = apscs.positions(6.0);
    assert!(positions[0] > CLOSED_POSITION && positions[0] < OPEN_POSITION);
    assert_eq!(positions[0], positions[1]);
    assert_eq!(apscs.motion_state(6.0), MotionState::Stopped);

    let duration = apscs.close_shutter(6.0).unwrap();
    let closed = 6.0 + duration + 0.1;
    assert_eq!(apscs.positions(closed), [CLOSED_POSITION; 2]);
}

#[test]
fn test_apscs_positions_never_negative() {
    let mut apscs = Apscs::new(0.0);
    apscs.home(0.0).unwrap();
    for tick in 0..20 {
        let positions = apscs.positions(tick as f64);
        assert!(positions.iter().all(|&p| (0.0..=100.0).contains(&p)));
    }
}

#[test]
fn test_apscs_fault_blocks_commands() {
    let mut apscs = Apscs::new(0.0);
    apscs.set_fault(&[1, 0, 0, 0], 0.0);
    assert!(matches!(
        apscs.open_shutter(1.0).unwrap_err(),
        LlcError::InvalidState { .. }
    ));
    assert_eq!(apscs.exit_fault(1.0).unwrap_err(), LlcError::DrivesInError);
    apscs.reset_drives(&[1, 1, 1, 1], 1.0).unwrap();
    apscs.exit_fault(2.0).unwrap();
    assert_eq!(apscs.motion_state(2.0), MotionState::Stationary);
}

#[test]
fn test_lcs_set_louvers_with_skip_marker() {
    let mut lcs = Lcs::new(0.0);
    let mut targets = vec![DO_NOT_MOVE; NUM_LOUVERS];
    targets[0] = 100.0;
    targets[7] = 50.0;
    let duration = lcs.set_louvers(&targets, 0.0).unwrap();
    assert!((duration - 10.0).abs() < 1e-9);

    let settled = duration + 1.0;
    let positions = lcs.positions(settled);
    assert_eq!(positions[0], 100.0);
    assert_eq!(positions[7], 50.0);
    // Louvers marked -1 never move.
    assert_eq!(positions[1], 0.0);
}

#[test]
fn test_lcs_rejects_bad_batches() {
    let mut lcs = Lcs::new(0.0);
    let err = lcs.set_louvers(&[100.0; 3], 0.0).unwrap_err();
    assert!(matches!(err, LlcError::InvalidParameter { .. }));
    let mut targets = vec![0.0; NUM_LOUVERS];
    targets[3] = 150.0;
    let err = lcs.set_louvers(&targets, 0.0).unwrap_err();
    assert!(matches!(err, LlcError::InvalidParameter { .. }));
}

#[test]
fn test_lcs_close_louvers_closes_everything() {
    let mut lcs = Lcs::new(0.0);
    lcs.set_louvers(&vec![80.0; NUM_LOUVERS], 0.0).unwrap();
    let duration = lcs.close_louvers(20.0).unwrap();
    let closed = 20.0 + duration + 0.1;
    assert!(lcs.positions(closed).iter().all(|&p| p == 0.0));
    assert_eq!(lcs.power_draw_kw(closed), 0.0);
}

#[test]
fn test_lcs_status_reports_all_louvers() {
    let mut lcs = Lcs::new(0.0);
    let status = lcs.determine_status(1.0);
    assert_eq!(status.position_actual.len(), NUM_LOUVERS);
    assert_eq!(status.status.status.len(), NUM_LOUVERS);
}

#[test]
fn test_thcs_setting_then_stopped() {
    let mut thcs = Thcs::new(0.0);
    assert_eq!(thcs.motion_state(0.0), MotionState::Stopped);
    thcs.set_temperature(-5.0, 10.0).unwrap();
    assert_eq!(thcs.motion_state(10.0 + TEMPERATURE_SETTLE_TIME / 2.0), MotionState::Setting);
    let settled = 10.0 + TEMPERATURE_SETTLE_TIME + 1.0;
    assert_eq!(thcs.motion_state(settled), MotionState::Stopped);
    assert!((thcs.temperature(settled) + 5.0).abs() < 1e-9);
}

#[test]
fn test_thcs_fans_draw_power() {
    let mut thcs = Thcs::new(0.0);
    assert_eq!(thcs.power_draw_kw(0.0), 0.0);
    thcs.fans(OnOff::On, 1.0).unwrap();
    assert_eq!(thcs.power_draw_kw(2.0), FANS_POWER_DRAW_KW);
    thcs.fans(OnOff::Off, 3.0).unwrap();
    assert_eq!(thcs.power_draw_kw(4.0), 0.0);
}
