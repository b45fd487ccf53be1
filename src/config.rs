//! Deserializable configuration: plain data, an explicit [`Default`], no
//! behavior. The core never reads a file itself — a host loads/deserializes
//! this and passes the value to [`crate::space::Space::from_config`].

use serde::{Deserialize, Serialize};

/// Cell-size configuration for one of the two spatial-hash broad phases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Cell width. Non-positive means "auto-size at first detection".
    pub cell_size_x: f64,
    /// Cell height. Non-positive means "auto-size at first detection".
    pub cell_size_y: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        // Non-positive triggers auto-sizing to 3x the mean obstacle extent.
        Self {
            cell_size_x: 0.0,
            cell_size_y: 0.0,
        }
    }
}

/// Top-level construction settings for a [`crate::space::Space`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpaceConfig {
    /// Fixed step size, in seconds.
    pub dt: f64,
    /// Solver iterations per step (typical 8-20).
    pub n_substep: u32,
    /// Gravity acceleration, x component.
    pub gravity_x: f64,
    /// Gravity acceleration, y component.
    pub gravity_y: f64,
    /// Below this normal speed, contacts do not bounce.
    pub restitution_threshold: f64,
    /// Rect broad-phase cell configuration.
    pub rect_detector: DetectorConfig,
    /// Triangle broad-phase cell configuration.
    pub triangle_detector: DetectorConfig,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            n_substep: 10,
            gravity_x: 0.0,
            gravity_y: -10.0,
            restitution_threshold: 0.1,
            rect_detector: DetectorConfig::default(),
            triangle_detector: DetectorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SpaceConfig;

    /// The default config must itself be a valid construction argument set.
    #[test]
    fn test_default_is_sane() {
        let config = SpaceConfig::default();

        assert!(config.dt > 0.0);
        assert!(config.n_substep >= 1);
        assert!(config.restitution_threshold >= 0.0);
    }

    /// Round-trips through TOML, the format a host is expected to store
    /// this configuration in.
    #[test]
    fn test_toml_round_trip() {
        let config = SpaceConfig::default();
        let serialized = toml::to_string(&config).expect("serialize config");
        let parsed: SpaceConfig = toml::from_str(&serialized).expect("parse config");

        assert_eq!(parsed, config);
    }
}
