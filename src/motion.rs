//! Jerk-limited motion profiles for the azimuth and elevation drives.
//!
//! A profile is a list of constant-jerk segments followed by an optional
//! crawl velocity that is held forever. Sampling is closed-form per segment,
//! so a profile is a pure function of (start state, limits, target) and the
//! elapsed time.

use serde::{Deserialize, Serialize};

/// Kinematic limits for a drive. All values are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionLimits {
    /// Maximum jerk [rad/s^3].
    pub jmax: f64,
    /// Maximum acceleration [rad/s^2].
    pub amax: f64,
    /// Maximum velocity [rad/s].
    pub vmax: f64,
}

/// Kinematic state at a sampled time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileSample {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    /// True once the bounded part of the profile has completed and no crawl
    /// velocity is held. Never true for a crawl.
    pub done: bool,
}

/// One constant-jerk segment.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    duration: f64,
    jerk: f64,
}

/// A jerk-limited motion profile starting from a known kinematic state.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionProfile {
    start_position: f64,
    start_velocity: f64,
    segments: Vec<Segment>,
    /// Velocity held after the last segment. None means the profile comes to
    /// rest and reports done.
    crawl_velocity: Option<f64>,
    total_duration: f64,
}

impl MotionProfile {
    /// A profile that is already complete: holds `position` at rest.
    pub fn hold(position: f64) -> Self {
        Self::from_segments(position, 0.0, Vec::new(), None)
    }

    /// Bounded move from the current kinematic state to `target`, optionally
    /// entering a crawl at `crawl_velocity` once the target is reached.
    ///
    /// A move commanded while in motion first decelerates to rest under the
    /// same limits and plans the move from the projected stop position.
    pub fn new_move(
        position: f64,
        velocity: f64,
        target: f64,
        crawl_velocity: f64,
        limits: MotionLimits,
    ) -> Self {
        let mut segments = Vec::new();
        let mut p = position;
        if velocity != 0.0 {
            let ramp = ramp_segments(velocity, 0.0, limits);
            p += ramp_distance(velocity, &ramp);
            segments.extend(ramp);
        }
        segments.extend(rest_to_rest_segments(target - p, limits));
        let crawl = if crawl_velocity != 0.0 {
            segments.extend(ramp_segments(0.0, crawl_velocity, limits));
            Some(crawl_velocity)
        } else {
            None
        };
        Self::from_segments(position, velocity, segments, crawl)
    }

    /// Accelerate from the current velocity to the commanded signed crawl
    /// velocity and hold it indefinitely. A commanded velocity of exactly
    /// zero degrades to a stop.
    pub fn new_crawl(position: f64, velocity: f64, crawl_velocity: f64, limits: MotionLimits) -> Self {
        if crawl_velocity == 0.0 {
            // Explicit zero branch: no rate computation may divide by the
            // commanded velocity.
            return Self::new_stop(position, velocity, limits);
        }
        let segments = ramp_segments(velocity, crawl_velocity, limits);
        Self::from_segments(position, velocity, segments, Some(crawl_velocity))
    }

    /// Decelerate from the current velocity to rest under the limits.
    pub fn new_stop(position: f64, velocity: f64, limits: MotionLimits) -> Self {
        let segments = ramp_segments(velocity, 0.0, limits);
        Self::from_segments(position, velocity, segments, None)
    }

    fn from_segments(
        start_position: f64,
        start_velocity: f64,
        segments: Vec<Segment>,
        crawl_velocity: Option<f64>,
    ) -> Self {
        let total_duration = segments.iter().map(|s| s.duration).sum();
        Self {
            start_position,
            start_velocity,
            segments,
            crawl_velocity,
            total_duration,
        }
    }

    /// Duration of the bounded part of the profile. Zero for a pure hold;
    /// excludes the unbounded crawl tail.
    pub fn duration(&self) -> f64 {
        self.total_duration
    }

    /// The velocity held after the bounded part, if any.
    pub fn crawl_velocity(&self) -> Option<f64> {
        self.crawl_velocity
    }

    /// Sample the profile at `t` seconds after its start. Times before the
    /// start clamp to the initial state.
    pub fn sample(&self, t: f64) -> ProfileSample {
        let mut position = self.start_position;
        let mut velocity = self.start_velocity;
        let mut acceleration = 0.0;
        if t <= 0.0 {
            return ProfileSample {
                position,
                velocity,
                acceleration,
                done: self.segments.is_empty() && self.crawl_velocity.is_none(),
            };
        }
        let mut elapsed = 0.0;
        for segment in &self.segments {
            if t < elapsed + segment.duration {
                let dt = t - elapsed;
                let j = segment.jerk;
                position += velocity * dt + acceleration * dt * dt / 2.0 + j * dt * dt * dt / 6.0;
                velocity += acceleration * dt + j * dt * dt / 2.0;
                acceleration += j * dt;
                return ProfileSample {
                    position,
                    velocity,
                    acceleration,
                    done: false,
                };
            }
            let dt = segment.duration;
            let j = segment.jerk;
            position += velocity * dt + acceleration * dt * dt / 2.0 + j * dt * dt * dt / 6.0;
            velocity += acceleration * dt + j * dt * dt / 2.0;
            acceleration += j * dt;
            elapsed += dt;
        }
        match self.crawl_velocity {
            Some(v) => ProfileSample {
                position: position + v * (t - elapsed),
                velocity: v,
                acceleration: 0.0,
                done: false,
            },
            None => ProfileSample {
                position,
                velocity: 0.0,
                acceleration: 0.0,
                done: true,
            },
        }
    }
}

/// Segments for a velocity change `v_from` -> `v_to` under the limits.
///
/// Trapezoidal acceleration when the change is large enough to reach `amax`,
/// otherwise a jerk-only triangular acceleration phase.
fn ramp_segments(v_from: f64, v_to: f64, limits: MotionLimits) -> Vec<Segment> {
    let dv = v_to - v_from;
    if dv == 0.0 {
        return Vec::new();
    }
    let dir = dv.signum();
    let dv = dv.abs();
    let j = limits.jmax;
    let a = limits.amax;
    if dv >= a * a / j {
        let t_jerk = a / j;
        let t_hold = dv / a - a / j;
        vec![
            Segment { duration: t_jerk, jerk: dir * j },
            Segment { duration: t_hold, jerk: 0.0 },
            Segment { duration: t_jerk, jerk: -dir * j },
        ]
    } else {
        let t_jerk = (dv / j).sqrt();
        vec![
            Segment { duration: t_jerk, jerk: dir * j },
            Segment { duration: t_jerk, jerk: -dir * j },
        ]
    }
}

/// Distance covered while executing `segments` starting at `v_from` with
/// zero initial acceleration.
fn ramp_distance(v_from: f64, segments: &[Segment]) -> f64 {
    let mut position = 0.0;
    let mut velocity = v_from;
    let mut acceleration = 0.0;
    for segment in segments {
        let dt = segment.duration;
        let j = segment.jerk;
        position += velocity * dt + acceleration * dt * dt / 2.0 + j * dt * dt * dt / 6.0;
        velocity += acceleration * dt + j * dt * dt / 2.0;
        acceleration += j * dt;
    }
    position
}

/// Segments for a rest-to-rest move over the signed `distance`.
///
/// The peak velocity is `vmax` when the distance allows a cruise phase.
/// Shorter moves solve the peak analytically: first assuming the trapezoidal
/// acceleration regime, falling back to the jerk-only regime when the
/// solution cannot reach `amax`.
fn rest_to_rest_segments(distance: f64, limits: MotionLimits) -> Vec<Segment> {
    if distance == 0.0 {
        return Vec::new();
    }
    let dir = distance.signum();
    let d = distance.abs();
    let j = limits.jmax;
    let a = limits.amax;

    // Distance consumed by a 0 -> vp -> 0 pair of ramps is vp * ramp_time,
    // since each symmetric jerk ramp averages vp / 2.
    let ramp_time = |vp: f64| -> f64 {
        if vp >= a * a / j {
            vp / a + a / j
        } else {
            2.0 * (vp / j).sqrt()
        }
    };

    let mut vp = limits.vmax;
    let mut cruise = d / vp - ramp_time(vp);
    if cruise < 0.0 {
        cruise = 0.0;
        // Solve vp^2 / a + vp * a / j = d (trapezoidal acceleration regime).
        let half = a * a / (2.0 * j);
        vp = (half * half + a * d).sqrt() - half;
        if vp < a * a / j {
            // Peak acceleration is never reached: 2 * vp^(3/2) / sqrt(j) = d.
            vp = (d * d * j / 4.0).cbrt();
        }
    }

    let mut segments = ramp_segments(0.0, dir * vp, limits);
    if cruise > 0.0 {
        segments.push(Segment { duration: cruise, jerk: 0.0 });
    }
    segments.extend(ramp_segments(dir * vp, 0.0, limits));
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: MotionLimits = MotionLimits {
        jmax: 0.05,
        amax: 0.013,
        vmax: 0.026,
    };

    fn assert_limits_respected(profile: &MotionProfile, limits: MotionLimits) {
        let horizon = profile.duration() + 5.0;
        let mut t = 0.0;
        let mut prev_accel = 0.0;
        let dt = 0.05;
        while t <= horizon {
            let s = profile.sample(t);
            assert!(
                s.velocity.abs() <= limits.vmax + 1e-9,
                "velocity {} exceeds vmax at t={}",
                s.velocity,
                t
            );
            assert!(
                s.acceleration.abs() <= limits.amax + 1e-9,
                "acceleration {} exceeds amax at t={}",
                s.acceleration,
                t
            );
            let jerk = (s.acceleration - prev_accel) / dt;
            assert!(jerk.abs() <= limits.jmax + 1e-6, "jerk {} exceeds jmax at t={}", jerk, t);
            prev_accel = s.acceleration;
            t += dt;
        }
    }

    #[test]
    fn test_long_move_reaches_target_at_vmax() {
        let profile = MotionProfile::new_move(0.0, 0.0, 2.0, 0.0, LIMITS);
        assert_limits_respected(&profile, LIMITS);
        // Long enough to cruise at vmax.
        let mid = profile.sample(profile.duration() / 2.0);
        assert!((mid.velocity - LIMITS.vmax).abs() < 1e-6);
        let end = profile.sample(profile.duration());
        assert!((end.position - 2.0).abs() < 1e-6);
        assert!(end.done);
    }

    #[test]
    fn test_short_move_degrades_to_triangular() {
        let profile = MotionProfile::new_move(0.0, 0.0, 0.01, 0.0, LIMITS);
        assert_limits_respected(&profile, LIMITS);
        // Too short to reach vmax.
        let mut t = 0.0;
        let mut peak: f64 = 0.0;
        while t <= profile.duration() {
            peak = peak.max(profile.sample(t).velocity.abs());
            t += 0.01;
        }
        assert!(peak < LIMITS.vmax);
        let end = profile.sample(profile.duration());
        assert!((end.position - 0.01).abs() < 1e-9);
        assert!(end.done);
    }

    #[test]
    fn test_move_converges_monotonically() {
        let profile = MotionProfile::new_move(0.3, 0.0, 1.4, 0.0, LIMITS);
        let mut t = 0.0;
        let mut prev_distance = (1.4f64 - 0.3).abs();
        while t <= profile.duration() {
            let s = profile.sample(t);
            let distance = (1.4 - s.position).abs();
            assert!(distance <= prev_distance + 1e-9);
            prev_distance = distance;
            t += 0.1;
        }
    }

    #[test]
    fn test_move_then_crawl_holds_crawl_velocity() {
        let profile = MotionProfile::new_move(0.0, 0.0, 1.0, 0.001, LIMITS);
        assert_limits_respected(&profile, LIMITS);
        let after = profile.sample(profile.duration() + 10.0);
        assert!((after.velocity - 0.001).abs() < 1e-12);
        assert!(!after.done);
        assert!(after.position > 1.0);
    }

    #[test]
    fn test_crawl_never_done() {
        let profile = MotionProfile::new_crawl(0.0, 0.0, 0.004, LIMITS);
        assert_limits_respected(&profile, LIMITS);
        let s = profile.sample(1000.0);
        assert!(!s.done);
        assert!((s.velocity - 0.004).abs() < 1e-12);
    }

    #[test]
    fn test_crawl_with_zero_velocity_degrades_to_stop() {
        let profile = MotionProfile::new_crawl(0.5, 0.01, 0.0, LIMITS);
        let end = profile.sample(profile.duration() + 1.0);
        assert_eq!(end.velocity, 0.0);
        assert!(end.done);
    }

    #[test]
    fn test_stop_from_motion_comes_to_rest() {
        let profile = MotionProfile::new_stop(1.0, LIMITS.vmax, LIMITS);
        assert_limits_respected(&profile, LIMITS);
        let end = profile.sample(profile.duration());
        assert!((end.velocity).abs() < 1e-9);
        assert!(end.done);
        assert!(end.position > 1.0);
    }

    #[test]
    fn test_move_while_moving_decelerates_first() {
        let profile = MotionProfile::new_move(0.0, LIMITS.vmax, 2.0, 0.0, LIMITS);
        assert_limits_respected(&profile, LIMITS);
        let end = profile.sample(profile.duration());
        assert!((end.position - 2.0).abs() < 1e-6);
        assert!(end.done);
    }

    #[test]
    fn test_move_to_current_position_is_done_immediately() {
        let profile = MotionProfile::new_move(0.7, 0.0, 0.7, 0.0, LIMITS);
        assert_eq!(profile.duration(), 0.0);
        assert!(profile.sample(0.0).done);
    }

    #[test]
    fn test_hold_reports_done() {
        let profile = MotionProfile::hold(0.25);
        let s = profile.sample(3.0);
        assert_eq!(s.position, 0.25);
        assert!(s.done);
    }

    #[test]
    fn test_reverse_move() {
        let profile = MotionProfile::new_move(1.5, 0.0, 0.2, 0.0, LIMITS);
        assert_limits_respected(&profile, LIMITS);
        let end = profile.sample(profile.duration());
        assert!((end.position - 0.2).abs() < 1e-6);
    }
}
