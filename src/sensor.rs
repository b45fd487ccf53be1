//! Derived sensor readings: unwrapped angles, angular velocity, and touch.
//!
//! Modeled as a tagged enum dispatched by a single `update` method rather
//! than trait objects, since the set of sensor kinds is small and closed.

use slotmap::SlotMap;
use vek::Vec2;

use crate::consts::TAU;
use crate::handle::{NodeKey, SensorKey};
use crate::node::Node;

/// One sensor's state and configuration.
#[derive(Debug, Clone)]
pub enum SensorKind {
    /// Unwrapped angle from `origin` to `satellite`, optionally relative to
    /// another angle sensor's current reading.
    Angle {
        origin: NodeKey,
        satellite: NodeKey,
        /// Captured from the raw angle at construction, so the first
        /// reported value is 0.
        reference_offset: f64,
        /// Another sensor whose value is subtracted each update, for
        /// relative joint angles. `None` for a plain angle sensor.
        relative_to: Option<SensorKey>,
        /// Last unwrapped value, used to keep new readings continuous.
        last_value: f64,
    },
    /// Low-pass filtered finite difference of another angle sensor.
    AngularVelocity {
        angle_sensor: SensorKey,
        dt: f64,
        last_angle: f64,
        velocity: f64,
        initialized: bool,
    },
    /// 0.0 if any referenced node is currently colliding, else 1.0.
    Touch { nodes: Vec<NodeKey> },
}

/// Ordered collection of sensors, updated by the host after `Space::step`
/// returns — sensor evaluation is not part of `step()` itself.
#[derive(Debug, Clone, Default)]
pub struct SensorHub {
    sensors: SlotMap<SensorKey, SensorKind>,
    /// Most recent value per sensor, read by `value()`.
    values: SlotMap<SensorKey, f64>,
}

/// Raw (non-unwrapped, non-offset) angle from `origin` to `satellite`.
/// `0.0` if either node key is stale.
fn raw_angle(nodes: &SlotMap<NodeKey, Node>, origin: NodeKey, satellite: NodeKey) -> f64 {
    match (nodes.get(origin), nodes.get(satellite)) {
        (Some(origin_node), Some(satellite_node)) => {
            let delta: Vec2<f64> = satellite_node.position() - origin_node.position();
            delta.y.atan2(delta.x)
        }
        _ => 0.0,
    }
}

impl SensorHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// The reference angle is captured right here, at construction, not on
    /// the first `update()` - otherwise motion between insertion and the
    /// host's first `update()` call would be silently folded into the
    /// baseline instead of showing up as a reading.
    pub fn add_angle_sensor(
        &mut self,
        nodes: &SlotMap<NodeKey, Node>,
        origin: NodeKey,
        satellite: NodeKey,
    ) -> SensorKey {
        let reference_offset = raw_angle(nodes, origin, satellite);
        let key = self.sensors.insert(SensorKind::Angle {
            origin,
            satellite,
            reference_offset,
            relative_to: None,
            last_value: 0.0,
        });
        self.values.insert(0.0);
        key
    }

    pub fn add_relative_angle_sensor(
        &mut self,
        nodes: &SlotMap<NodeKey, Node>,
        origin: NodeKey,
        satellite: NodeKey,
        relative_to: SensorKey,
    ) -> SensorKey {
        let reference_offset = raw_angle(nodes, origin, satellite);
        let key = self.sensors.insert(SensorKind::Angle {
            origin,
            satellite,
            reference_offset,
            relative_to: Some(relative_to),
            last_value: 0.0,
        });
        self.values.insert(0.0);
        key
    }

    pub fn add_angular_velocity_sensor(&mut self, angle_sensor: SensorKey, dt: f64) -> SensorKey {
        let key = self.sensors.insert(SensorKind::AngularVelocity {
            angle_sensor,
            dt,
            last_angle: 0.0,
            velocity: 0.0,
            initialized: false,
        });
        self.values.insert(0.0);
        key
    }

    pub fn add_touch_sensor(&mut self, nodes: Vec<NodeKey>) -> SensorKey {
        let key = self.sensors.insert(SensorKind::Touch { nodes });
        self.values.insert(0.0);
        key
    }

    /// Current value of `key`, or 0.0 if the key is stale.
    pub fn value(&self, key: SensorKey) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    /// Recompute every sensor's value from the current node state, in
    /// insertion order so an `AngularVelocity` sensor sees its angle
    /// sensor's freshly updated value within the same call.
    pub fn update(&mut self, nodes: &SlotMap<NodeKey, Node>) {
        let keys: Vec<SensorKey> = self.sensors.keys().collect();
        for key in keys {
            let value = self.compute(key, nodes);
            if let Some(stored) = self.values.get_mut(key) {
                *stored = value;
            }
        }
    }

    fn compute(&mut self, key: SensorKey, nodes: &SlotMap<NodeKey, Node>) -> f64 {
        // Work around borrowing `self.sensors` mutably while also reading
        // other sensors' values by matching into owned locals first.
        let Some(kind) = self.sensors.get(key).cloned() else {
            return 0.0;
        };

        match kind {
            SensorKind::Angle {
                origin,
                satellite,
                reference_offset,
                relative_to,
                last_value,
            } => {
                let (Some(origin_node), Some(satellite_node)) =
                    (nodes.get(origin), nodes.get(satellite))
                else {
                    return 0.0;
                };
                let delta: Vec2<f64> = satellite_node.position() - origin_node.position();
                let mut raw = delta.y.atan2(delta.x) - reference_offset;

                if let Some(relative_key) = relative_to {
                    raw -= self.value(relative_key);
                }

                let unwrapped = raw + ((last_value - raw) / TAU).round() * TAU;

                if let Some(SensorKind::Angle {
                    last_value: stored_last,
                    ..
                }) = self.sensors.get_mut(key)
                {
                    *stored_last = unwrapped;
                }

                unwrapped
            }
            SensorKind::AngularVelocity {
                angle_sensor,
                dt,
                last_angle,
                velocity,
                initialized,
            } => {
                let angle = self.value(angle_sensor);
                let new_velocity = if initialized {
                    0.5 * velocity + 0.5 * (angle - last_angle) / dt
                } else {
                    0.0
                };

                if let Some(SensorKind::AngularVelocity {
                    last_angle: stored_angle,
                    velocity: stored_velocity,
                    initialized: stored_initialized,
                    ..
                }) = self.sensors.get_mut(key)
                {
                    *stored_angle = angle;
                    *stored_velocity = new_velocity;
                    *stored_initialized = true;
                }

                new_velocity
            }
            SensorKind::Touch { nodes: node_keys } => {
                let touching = node_keys
                    .iter()
                    .filter_map(|k| nodes.get(*k))
                    .any(Node::is_colliding);
                if touching {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }
}
