//! Configuration of multilayer label propagation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::Time;

/// The weight of the implicit edge between a vertex's instances at adjacent layers.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Omega {
    /// A fixed weight.
    Constant(f64),
    /// The mean weight of the vertex's neighbourhood in the relevant layer.
    Average,
}

impl Default for Omega {
    fn default() -> Self { Omega::Constant(1.0) }
}

impl FromStr for Omega {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("average") {
            return Ok(Omega::Average);
        }
        s.parse::<f64>()
            .ok()
            .filter(|weight| weight.is_finite())
            .map(Omega::Constant)
            .ok_or_else(|| ConfigError::Invalid { name: "omega", value: s.to_string() })
    }
}

impl fmt::Display for Omega {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Omega::Constant(weight) => write!(f, "{}", weight),
            Omega::Average => write!(f, "average"),
        }
    }
}

/// Parameters of a multilayer label propagation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LpaConfig {
    top: usize,
    weight: Option<String>,
    max_iterations: usize,
    start: Time,
    end: Time,
    layer_size: Time,
    omega: Omega,
    seed: Option<u64>,
}

impl LpaConfig {
    /// Layers every `layer_size` from `start` up to and including `end`, with default settings.
    pub fn new(start: Time, end: Time, layer_size: Time) -> Self {
        LpaConfig {
            top: 0,
            weight: None,
            max_iterations: 500,
            start,
            end,
            layer_size,
            omega: Omega::default(),
            seed: None,
        }
    }

    /// Parses positional arguments.
    ///
    /// In order: `top`, `weight`, `maxIterations`, `start`, `end`, `layerSize`, `omega`, `seed`.
    /// Missing or empty arguments take their defaults; `start`, `end` and `layerSize` have none.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ConfigError> {

        let arg = |index: usize| args.get(index).map(|arg| arg.as_ref().trim()).filter(|arg| !arg.is_empty());

        let start = parse("start", arg(3).ok_or(ConfigError::Missing("start"))?)?;
        let end = parse("end", arg(4).ok_or(ConfigError::Missing("end"))?)?;
        let layer_size = parse("layerSize", arg(5).ok_or(ConfigError::Missing("layerSize"))?)?;

        let mut config = LpaConfig::new(start, end, layer_size);
        if let Some(top) = arg(0) {
            config.top = parse("top", top)?;
        }
        config.weight = arg(1).map(String::from);
        if let Some(max_iterations) = arg(2) {
            config.max_iterations = parse("maxIterations", max_iterations)?;
        }
        if let Some(omega) = arg(6) {
            config.omega = omega.parse()?;
        }
        if let Some(seed) = arg(7) {
            config.seed = Some(parse("seed", seed)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that the layer schedule is well formed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layer_size <= 0 {
            return Err(ConfigError::LayerSize(self.layer_size));
        }
        if self.end < self.start {
            return Err(ConfigError::Window { start: self.start, end: self.end });
        }
        Ok(())
    }

    /// Keeps only the `top` largest communities; zero keeps all.
    pub fn with_top(mut self, top: usize) -> Self { self.top = top; self }
    /// Reads edge weights from the named edge property.
    pub fn with_weight<S: Into<String>>(mut self, weight: S) -> Self { self.weight = Some(weight.into()); self }
    /// Sets the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self { self.max_iterations = max_iterations; self }
    /// Sets the inter-layer weight.
    pub fn with_omega(mut self, omega: Omega) -> Self { self.omega = omega; self }
    /// Fixes the seed of the initial labels.
    pub fn with_seed(mut self, seed: u64) -> Self { self.seed = Some(seed); self }

    /// The number of communities to keep, or zero for all.
    pub fn top(&self) -> usize { self.top }
    /// The edge property holding weights, if any.
    pub fn weight(&self) -> Option<&str> { self.weight.as_deref() }
    /// The iteration cap.
    pub fn max_iterations(&self) -> usize { self.max_iterations }
    /// The distance between layers.
    pub fn layer_size(&self) -> Time { self.layer_size }
    /// The inter-layer weight.
    pub fn omega(&self) -> Omega { self.omega }
    /// The seed of the initial labels, if fixed.
    pub fn seed(&self) -> Option<u64> { self.seed }

    /// Layer timestamps: `start`, `start + layerSize`, and so on, not past `end`.
    pub fn snapshots(&self) -> Vec<Time> {
        if self.validate().is_err() {
            return Vec::new();
        }
        let (end, step) = (self.end, self.layer_size);
        std::iter::successors(Some(self.start), |time| time.checked_add(step))
            .take_while(|time| *time <= end)
            .collect()
    }

    /// The first and last instants covered by some layer, if there are layers.
    pub fn span(&self) -> Option<(Time, Time)> {
        let snapshots = self.snapshots();
        let first = *snapshots.first()?;
        let last = *snapshots.last()?;
        Some((first, last.saturating_add(self.layer_size - 1)))
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid { name, value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use super::{LpaConfig, Omega};
    use crate::error::ConfigError;

    #[test]
    fn positional_defaults() {
        let config = LpaConfig::from_args(&["", "", "", "0", "20", "10"]).unwrap();
        assert_eq!(config, LpaConfig::new(0, 20, 10));
        assert_eq!(config.top(), 0);
        assert_eq!(config.weight(), None);
        assert_eq!(config.max_iterations(), 500);
        assert_eq!(config.omega(), Omega::Constant(1.0));
        assert_eq!(config.seed(), None);
        assert_eq!(config.snapshots(), vec![0, 10, 20]);
    }

    #[test]
    fn positional_overrides() {
        let config = LpaConfig::from_args(&["3", "weight", "50", "5", "26", "7", "average", "42"]).unwrap();
        assert_eq!(config.top(), 3);
        assert_eq!(config.weight(), Some("weight"));
        assert_eq!(config.max_iterations(), 50);
        assert_eq!(config.omega(), Omega::Average);
        assert_eq!(config.seed(), Some(42));
        assert_eq!(config.snapshots(), vec![5, 12, 19, 26]);
    }

    #[test]
    fn invalid_arguments() {
        assert_eq!(LpaConfig::from_args(&["0", "", "10"]), Err(ConfigError::Missing("start")));
        assert_eq!(LpaConfig::from_args(&["0", "", "10", "0", "10"]), Err(ConfigError::Missing("layerSize")));
        assert_eq!(
            LpaConfig::from_args(&["x", "", "", "0", "10", "5"]),
            Err(ConfigError::Invalid { name: "top", value: "x".to_string() }),
        );
        assert_eq!(LpaConfig::from_args(&["", "", "", "0", "10", "0"]), Err(ConfigError::LayerSize(0)));
        assert_eq!(LpaConfig::from_args(&["", "", "", "10", "0", "5"]), Err(ConfigError::Window { start: 10, end: 0 }));
        assert!(LpaConfig::from_args(&["", "", "", "0", "10", "5", "heavy"]).is_err());
    }

    #[test]
    fn omega_parsing() {
        assert_eq!("0.5".parse::<Omega>(), Ok(Omega::Constant(0.5)));
        assert_eq!("Average".parse::<Omega>(), Ok(Omega::Average));
        assert!("NaN".parse::<Omega>().is_err());
    }

    #[test]
    fn degenerate_schedules_are_empty() {
        assert!(LpaConfig::new(0, 10, 0).snapshots().is_empty());
        assert_eq!(LpaConfig::new(4, 4, 10).snapshots(), vec![4]);
        assert_eq!(LpaConfig::new(0, 10, 0).span(), None);
    }

    #[test]
    fn spans_cover_the_last_layer() {
        assert_eq!(LpaConfig::new(-20, 5, 10).span(), Some((-20, 9)));
        assert_eq!(LpaConfig::new(4, 4, 10).span(), Some((4, 13)));
        let last = i64::MAX - 3;
        assert_eq!(LpaConfig::new(last, last, 10).span(), Some((last, i64::MAX)));
    }
}
