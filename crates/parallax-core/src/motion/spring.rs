//! L3 Molecular Layer: Spring-damper smoothing
//!
//! Filters a changing scalar through damped spring dynamics. Each tick runs a
//! semi-implicit Euler step:
//!
//! ```text
//! velocity += (stiffness * (target - value) - damping * velocity) / mass * dt
//! value    += velocity * dt
//! ```
//!
//! With the default constants (stiffness 100, damping 30, mass 1) the spring is
//! overdamped, so a step response approaches the target without overshoot.
//! Trajectories depend on time only through `dt`: identical `dt` sequences
//! give identical results.

use serde::Serialize;

use crate::config::SpringConfig;
use crate::{Error, Result};

/// Upper bound on sub-steps per update; longer gaps are truncated
const MAX_SUBSTEPS: u32 = 240;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringParams {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
    pub rest_delta: f64,
    pub rest_speed: f64,
    /// Longest single integration step in seconds
    pub max_step: f64,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self::from(&SpringConfig::default())
    }
}

impl From<&SpringConfig> for SpringParams {
    fn from(config: &SpringConfig) -> Self {
        Self {
            stiffness: config.stiffness,
            damping: config.damping,
            mass: config.mass,
            rest_delta: config.rest_delta,
            rest_speed: config.rest_speed,
            max_step: config.max_step_secs,
        }
    }
}

impl SpringParams {
    /// Default rest and step settings with custom constants
    pub fn new(stiffness: f64, damping: f64) -> Self {
        Self {
            stiffness,
            damping,
            ..Self::default()
        }
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let all_finite = [
            self.stiffness,
            self.damping,
            self.mass,
            self.rest_delta,
            self.rest_speed,
            self.max_step,
        ]
        .iter()
        .all(|v| v.is_finite());

        if !all_finite {
            return Err(Error::InvalidSpring("parameters must be finite".to_string()));
        }
        if self.stiffness <= 0.0 {
            return Err(Error::InvalidSpring(format!(
                "stiffness must be positive, got {}",
                self.stiffness
            )));
        }
        if self.mass <= 0.0 {
            return Err(Error::InvalidSpring(format!(
                "mass must be positive, got {}",
                self.mass
            )));
        }
        if self.damping < 0.0 {
            return Err(Error::InvalidSpring(format!(
                "damping must not be negative, got {}",
                self.damping
            )));
        }
        if self.rest_delta < 0.0 || self.rest_speed < 0.0 || self.max_step <= 0.0 {
            return Err(Error::InvalidSpring(
                "rest thresholds must be non-negative and max_step positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Damping at which the spring stops oscillating: `2 * sqrt(stiffness * mass)`
    pub fn critical_damping(&self) -> f64 {
        2.0 * (self.stiffness * self.mass).sqrt()
    }

    pub fn is_overdamped(&self) -> bool {
        self.damping >= self.critical_damping()
    }
}

/// Mutable spring state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SpringState {
    pub value: f64,
    pub velocity: f64,
    pub target: f64,
}

/// Spring-smoothed scalar
#[derive(Debug, Clone)]
pub struct SpringSmoother {
    params: SpringParams,
    state: SpringState,
    at_rest: bool,
}

impl SpringSmoother {
    /// Create a spring at rest at 0
    pub fn new(params: SpringParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            state: SpringState::default(),
            at_rest: true,
        })
    }

    /// Create a spring at rest at `value`
    pub fn with_value(params: SpringParams, value: f64) -> Result<Self> {
        let mut spring = Self::new(params)?;
        spring.jump(value);
        Ok(spring)
    }

    pub fn params(&self) -> &SpringParams {
        &self.params
    }

    pub fn state(&self) -> SpringState {
        self.state
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.state.value
    }

    #[inline]
    pub fn is_at_rest(&self) -> bool {
        self.at_rest
    }

    /// Place the spring at `value` with no velocity
    pub fn jump(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.state = SpringState {
            value,
            velocity: 0.0,
            target: value,
        };
        self.at_rest = true;
    }

    /// Advance by `dt` seconds towards `target` and return the new value
    ///
    /// Non-finite targets keep the previous target. Non-positive or
    /// non-finite `dt` leaves the state untouched.
    pub fn update(&mut self, dt: f64, target: f64) -> f64 {
        if target.is_finite() && target != self.state.target {
            self.state.target = target;
            self.at_rest = false;
        }

        if !dt.is_finite() || dt <= 0.0 || self.at_rest {
            return self.state.value;
        }

        let wanted = (dt / self.params.max_step).ceil();
        let steps = if wanted > MAX_SUBSTEPS as f64 {
            MAX_SUBSTEPS
        } else {
            (wanted as u32).max(1)
        };
        let h = if steps == MAX_SUBSTEPS && wanted > MAX_SUBSTEPS as f64 {
            self.params.max_step
        } else {
            dt / steps as f64
        };

        for _ in 0..steps {
            self.step(h);
        }
        self.settle();

        self.state.value
    }

    fn step(&mut self, h: f64) {
        let SpringParams {
            stiffness,
            damping,
            mass,
            ..
        } = self.params;
        let s = &mut self.state;
        let accel = (stiffness * (s.target - s.value) - damping * s.velocity) / mass;
        s.velocity += accel * h;
        s.value += s.velocity * h;
    }

    fn settle(&mut self) {
        let s = &mut self.state;
        if (s.target - s.value).abs() < self.params.rest_delta
            && s.velocity.abs() < self.params.rest_speed
        {
            s.value = s.target;
            s.velocity = 0.0;
            self.at_rest = true;
        }
    }
}

/// Create a spring with the given constants and default rest settings
pub fn create_spring(stiffness: f64, damping: f64) -> Result<SpringSmoother> {
    SpringSmoother::new(SpringParams::new(stiffness, damping))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 60.0;

    fn run(spring: &mut SpringSmoother, target: f64, ticks: usize) -> f64 {
        let mut value = spring.value();
        for _ in 0..ticks {
            value = spring.update(DT, target);
        }
        value
    }

    #[test]
    fn test_first_tick_matches_formula() {
        let mut spring = create_spring(100.0, 30.0).unwrap();
        let value = spring.update(DT, 1.0);
        let velocity = 100.0 * DT;
        assert!((value - velocity * DT).abs() < 1e-12);
        assert!((spring.state().velocity - velocity).abs() < 1e-12);
    }

    #[test]
    fn test_converges_from_any_start() {
        for start in [-500.0, -1.0, 0.0, 0.3, 42.0] {
            let mut spring = SpringSmoother::with_value(SpringParams::default(), start).unwrap();
            let value = run(&mut spring, 0.25, 1200);
            assert!((value - 0.25).abs() < 1e-6, "start {} ended at {}", start, value);
        }
    }

    #[test]
    fn test_default_constants_do_not_overshoot() {
        let params = SpringParams::default();
        assert!(params.is_overdamped());

        let mut spring = SpringSmoother::new(params).unwrap();
        for _ in 0..600 {
            let value = spring.update(DT, 1.0);
            assert!(value <= 1.0);
        }
        assert!(spring.is_at_rest());
        assert_eq!(spring.value(), 1.0);
    }

    #[test]
    fn test_deterministic_for_constant_dt() {
        let mut a = create_spring(300.0, 20.0).unwrap();
        let mut b = create_spring(300.0, 20.0).unwrap();
        for i in 0..200 {
            let target = if i < 50 { 1.0 } else { -0.5 };
            assert_eq!(a.update(DT, target), b.update(DT, target));
        }
    }

    #[test]
    fn test_large_dt_is_subdivided() {
        let mut spring = create_spring(100.0, 30.0).unwrap();
        let value = spring.update(2.0, 1.0);
        assert!(value.is_finite());
        assert!(value > 0.9 && value <= 1.0);
    }

    #[test]
    fn test_invalid_dt_is_noop() {
        let mut spring = SpringSmoother::with_value(SpringParams::default(), 0.5).unwrap();
        assert_eq!(spring.update(0.0, 1.0), 0.5);
        assert_eq!(spring.update(-1.0, 1.0), 0.5);
        assert_eq!(spring.update(f64::NAN, 1.0), 0.5);
        assert_eq!(spring.state().target, 1.0);
    }

    #[test]
    fn test_rejects_bad_params() {
        assert!(matches!(create_spring(0.0, 30.0), Err(Error::InvalidSpring(_))));
        assert!(create_spring(100.0, -1.0).is_err());
        assert!(create_spring(f64::INFINITY, 30.0).is_err());
        assert!(SpringSmoother::new(SpringParams::new(100.0, 30.0).with_mass(0.0)).is_err());
    }

    #[test]
    fn test_mass_slows_response() {
        let mut light = create_spring(100.0, 30.0).unwrap();
        let mut heavy = SpringSmoother::new(SpringParams::new(100.0, 30.0).with_mass(4.0)).unwrap();
        let a = run(&mut light, 1.0, 10);
        let b = run(&mut heavy, 1.0, 10);
        assert!(b < a);
    }
}
