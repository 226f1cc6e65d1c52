//! L4 Atomic Layer: Piecewise-linear breakpoint mappings
//!
//! A [`Mapping`] turns one input scalar (usually smoothed scroll progress) into
//! one output scalar through ordered `(input, output)` breakpoints. Outside the
//! breakpoint range the output clamps to the nearest boundary value.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::timing::lerp;
use crate::{Error, Result};

/// Ordered `(input, output)` breakpoints with strictly increasing inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct Mapping {
    points: Vec<(f64, f64)>,
}

impl Mapping {
    /// Validate and build a mapping
    ///
    /// Refuses fewer than two breakpoints, non-finite values and inputs that
    /// are not strictly increasing.
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self> {
        if points.len() < 2 {
            return Err(Error::InvalidMapping(format!(
                "need at least two breakpoints, got {}",
                points.len()
            )));
        }

        if let Some((x, y)) = points.iter().find(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(Error::InvalidMapping(format!(
                "breakpoint ({}, {}) is not finite",
                x, y
            )));
        }

        if let Some(pair) = points.windows(2).find(|w| w[1].0 <= w[0].0) {
            return Err(Error::InvalidMapping(format!(
                "breakpoint inputs must be strictly increasing ({} then {})",
                pair[0].0, pair[1].0
            )));
        }

        Ok(Self { points })
    }

    /// Build from parallel input/output lists, the way `useTransform` takes them
    pub fn from_ranges(inputs: &[f64], outputs: &[f64]) -> Result<Self> {
        if inputs.len() != outputs.len() {
            return Err(Error::InvalidMapping(format!(
                "{} inputs but {} outputs",
                inputs.len(),
                outputs.len()
            )));
        }
        Self::new(inputs.iter().copied().zip(outputs.iter().copied()).collect())
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Input range covered by the breakpoints
    pub fn domain(&self) -> (f64, f64) {
        // Construction guarantees at least two points
        (self.points[0].0, self.points[self.points.len() - 1].0)
    }

    /// Evaluate the mapping at `input`
    pub fn evaluate(&self, input: f64) -> f64 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];

        if input.is_nan() || input <= first.0 {
            return first.1;
        }
        if input >= last.0 {
            return last.1;
        }

        // First breakpoint strictly above input; bounded to 1..len by the checks above
        let upper = self.points.partition_point(|(x, _)| *x <= input);
        let (x0, y0) = self.points[upper - 1];
        let (x1, y1) = self.points[upper];
        lerp(y0, y1, (input - x0) / (x1 - x0))
    }
}

impl TryFrom<Vec<(f64, f64)>> for Mapping {
    type Error = Error;

    fn try_from(points: Vec<(f64, f64)>) -> Result<Self> {
        Self::new(points)
    }
}

impl From<Mapping> for Vec<(f64, f64)> {
    fn from(mapping: Mapping) -> Self {
        mapping.points
    }
}

/// Evaluate `mapping` at `input`
pub fn evaluate(mapping: &Mapping, input: f64) -> f64 {
    mapping.evaluate(input)
}

/// Turn a mapping into a reusable function of its input
pub fn map_range(mapping: Mapping) -> impl Fn(f64) -> f64 {
    move |input| mapping.evaluate(input)
}

/// Unit of a mapped output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Unit {
    #[default]
    None,
    Px,
    Percent,
    Deg,
    Scale,
    Opacity,
}

impl Unit {
    /// Render a value the way a style property would carry it
    pub fn format(&self, value: f64) -> String {
        let value = trim(value);
        match self {
            Unit::Px => format!("{}px", value),
            Unit::Percent => format!("{}%", value),
            Unit::Deg => format!("{}deg", value),
            Unit::None | Unit::Scale | Unit::Opacity => value.to_string(),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Unit::None => "none",
            Unit::Px => "px",
            Unit::Percent => "%",
            Unit::Deg => "deg",
            Unit::Scale => "scale",
            Unit::Opacity => "opacity",
        };
        f.write_str(s)
    }
}

/// Round to 3 decimals and drop negative zero
fn trim(value: f64) -> f64 {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parallax() -> Mapping {
        Mapping::new(vec![(0.0, 0.0), (0.5, -100.0), (1.0, -100.0)]).unwrap()
    }

    #[test]
    fn test_interpolates_within_segment() {
        let m = parallax();
        assert!((m.evaluate(0.25) - -50.0).abs() < 1e-12);
        assert!((m.evaluate(0.75) - -100.0).abs() < 1e-12);
    }

    #[test]
    fn test_clamps_outside_domain() {
        let m = Mapping::new(vec![(0.2, 60.0), (0.5, 0.0)]).unwrap();
        assert_eq!(m.evaluate(-10.0), 60.0);
        assert_eq!(m.evaluate(0.0), 60.0);
        assert_eq!(m.evaluate(0.9), 0.0);
        assert_eq!(m.evaluate(f64::INFINITY), 0.0);
        assert_eq!(m.evaluate(f64::NEG_INFINITY), 60.0);
        assert_eq!(m.evaluate(f64::NAN), 60.0);
    }

    #[test]
    fn test_continuous_at_interior_breakpoints() {
        let m = Mapping::new(vec![(0.0, 1.0), (0.3, 0.8), (0.6, 0.95), (1.0, 1.0)]).unwrap();
        for &(x, y) in &m.points()[1..3] {
            let eps = 1e-9;
            assert!((m.evaluate(x) - y).abs() < 1e-12);
            assert!((m.evaluate(x - eps) - y).abs() < 1e-6);
            assert!((m.evaluate(x + eps) - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_rejects_invalid_breakpoints() {
        assert!(matches!(Mapping::new(vec![(0.0, 1.0)]), Err(Error::InvalidMapping(_))));
        assert!(Mapping::new(vec![]).is_err());
        assert!(Mapping::new(vec![(0.0, 0.0), (0.0, 1.0)]).is_err());
        assert!(Mapping::new(vec![(0.5, 0.0), (0.2, 1.0)]).is_err());
        assert!(Mapping::new(vec![(0.0, f64::NAN), (1.0, 1.0)]).is_err());
        assert!(Mapping::from_ranges(&[0.0, 1.0], &[0.0]).is_err());
    }

    #[test]
    fn test_map_range_shares_one_input() {
        let y = map_range(Mapping::from_ranges(&[0.0, 0.3], &[0.0, -50.0]).unwrap());
        let opacity = map_range(Mapping::from_ranges(&[0.0, 0.5], &[1.0, 0.0]).unwrap());
        let input = 0.15;
        assert!((y(input) - -25.0).abs() < 1e-9);
        assert!((opacity(input) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Mapping = serde_json::from_str("[[0, 0], [1, 360]]").unwrap();
        assert_eq!(ok.domain(), (0.0, 1.0));
        assert!(serde_json::from_str::<Mapping>("[[0, 0]]").is_err());
    }

    #[test]
    fn test_unit_format() {
        assert_eq!(Unit::Px.format(-50.0), "-50px");
        assert_eq!(Unit::Percent.format(30.0), "30%");
        assert_eq!(Unit::Deg.format(12.3456), "12.346deg");
        assert_eq!(Unit::Opacity.format(-0.0), "0");
    }
}
