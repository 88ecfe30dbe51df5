//! Expression playback driven by the shared frame clock.
//!
//! A trigger records only its start offset on the simulation clock; the frame
//! loop calls [`ExpressionDriver::update`] once per tick with the current time.

use glam::Quat;
use std::collections::HashMap;
use std::f32::consts::TAU;

use super::expression::{envelope, ExpressionTable};
use super::morph::MorphTarget;

/// Tail swish length in seconds.
pub const TAIL_SWISH_DURATION: f32 = 0.6;
/// Peak tail swish angle in radians.
pub const TAIL_SWISH_AMPLITUDE: f32 = 0.25;

/// One running envelope. At most one exists per morph channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Playback {
    pub expression: String,
    pub channel: String,
    pub start: f32,
    pub duration: f32,
    pub peak: f32,
}

impl Playback {
    fn progress(&self, now: f32) -> f32 {
        ((now - self.start) / self.duration).max(0.0)
    }
}

/// Drives morph envelopes for the expression table.
#[derive(Debug, Clone)]
pub struct ExpressionDriver {
    table: ExpressionTable,
    /// Active playbacks keyed by morph channel
    active: HashMap<String, Playback>,
}

impl ExpressionDriver {
    pub fn new(table: ExpressionTable) -> Self {
        Self {
            table,
            active: HashMap::new(),
        }
    }

    pub fn table(&self) -> &ExpressionTable {
        &self.table
    }

    /// Start (or restart) the envelope for `name` at time `now`.
    ///
    /// Unknown names are ignored and return false. Restarting a channel that
    /// is mid-flight moves its origin to `now`, so the next update writes the
    /// envelope's starting value of 0.
    pub fn trigger(&mut self, name: &str, now: f32) -> bool {
        let Some(expr) = self.table.get(name) else {
            tracing::debug!("Ignoring unknown expression '{}'", name);
            return false;
        };

        let playback = Playback {
            expression: expr.name.clone(),
            channel: expr.morph.clone(),
            start: now,
            duration: expr.duration,
            peak: expr.intensity,
        };

        if let Some(previous) = self.active.insert(expr.morph.clone(), playback) {
            tracing::debug!(
                "Expression '{}' restarted channel '{}' (was '{}')",
                name,
                expr.morph,
                previous.expression
            );
        } else {
            tracing::debug!("Expression '{}' started on channel '{}'", name, expr.morph);
        }
        true
    }

    /// Trigger whatever expression is bound to `key`. Returns its name.
    pub fn trigger_key(&mut self, key: &str, now: f32) -> Option<String> {
        let name = self.table.for_key(key)?.name.clone();
        self.trigger(&name, now).then_some(name)
    }

    /// Write every active envelope into all targets that define its channel.
    ///
    /// Finished envelopes write an exact 0 and are dropped.
    pub fn update<T: MorphTarget>(&mut self, now: f32, targets: &mut [T]) {
        self.active.retain(|channel, playback| {
            let t = playback.progress(now);
            let (weight, keep) = if t >= 1.0 {
                (0.0, false)
            } else {
                (envelope(t, playback.peak), true)
            };

            for target in targets.iter_mut() {
                target.set_named_weight(channel, weight);
            }
            keep
        });
    }

    pub fn is_active(&self, channel: &str) -> bool {
        self.active.contains_key(channel)
    }

    /// Names of channels with a running envelope, sorted.
    pub fn active_channels(&self) -> Vec<&str> {
        let mut channels: Vec<&str> = self.active.keys().map(|s| s.as_str()).collect();
        channels.sort_unstable();
        channels
    }
}

/// Damped sine swish of the tail joint, added on top of its rotation at trigger time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TailSwish {
    pub joint: usize,
    base: Quat,
    start: f32,
}

impl TailSwish {
    pub fn new(joint: usize, base: Quat, now: f32) -> Self {
        Self { joint, base, start: now }
    }

    /// Restart timing while keeping the original base pose.
    pub fn restart(&mut self, now: f32) {
        self.start = now;
    }

    pub fn base(&self) -> Quat {
        self.base
    }

    /// Joint rotation at `now`, and whether the swish has finished.
    ///
    /// Once finished the returned rotation is exactly the base rotation.
    pub fn sample(&self, now: f32) -> (Quat, bool) {
        let u = ((now - self.start) / TAIL_SWISH_DURATION).max(0.0);
        if u >= 1.0 {
            return (self.base, true);
        }
        (self.base * Quat::from_rotation_z(swish_offset(u)), false)
    }
}

/// Roll offset around the joint's local Z at normalized progress `u`.
pub fn swish_offset(u: f32) -> f32 {
    (u * TAU).sin() * TAIL_SWISH_AMPLITUDE * (1.0 - u.min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::morph::MorphChannels;

    fn driver() -> ExpressionDriver {
        ExpressionDriver::new(ExpressionTable::default())
    }

    fn mesh(names: &[&str]) -> MorphChannels {
        MorphChannels::new(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_unknown_expression_is_noop() {
        let mut driver = driver();
        let mut meshes = vec![mesh(&["smile", "laugh"])];

        assert!(!driver.trigger("purr", 0.0));
        driver.update(0.3, &mut meshes);

        assert!(driver.active_channels().is_empty());
        assert_eq!(meshes[0].influences(), &[0.0, 0.0]);
    }

    #[test]
    fn test_weight_sequence_rises_and_returns_to_zero() {
        let mut driver = driver();
        let mut meshes = vec![mesh(&["laugh"])];
        assert!(driver.trigger("laugh", 10.0));

        let mut samples = Vec::new();
        for i in 0..=17 {
            let now = 10.0 + i as f32 * 0.05;
            driver.update(now, &mut meshes);
            samples.push(meshes[0].weight("laugh").unwrap());
        }

        assert_eq!(samples[0], 0.0);
        let (peak_idx, peak) = samples
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert!(peak <= 1.0 + 1e-6);
        assert!(peak_idx > 0 && peak_idx < 17);
        assert_eq!(*samples.last().unwrap(), 0.0);
        assert!(!driver.is_active("laugh"));
    }

    #[test]
    fn test_laugh_midpoint_and_end() {
        let mut driver = driver();
        let mut meshes = vec![mesh(&["laugh"])];
        driver.trigger("laugh", 0.0);

        driver.update(0.4, &mut meshes);
        assert!((meshes[0].weight("laugh").unwrap() - 1.0).abs() < 1e-4);

        driver.update(0.8, &mut meshes);
        assert_eq!(meshes[0].weight("laugh").unwrap(), 0.0);
    }

    #[test]
    fn test_same_channel_on_multiple_meshes() {
        let mut driver = driver();
        // "smile" sits at a different index on each mesh
        let mut meshes = vec![mesh(&["smile"]), mesh(&["blink", "cry", "smile"])];
        driver.trigger("smile", 0.0);

        for i in 1..12 {
            let now = i as f32 * 0.09;
            driver.update(now, &mut meshes);
            let a = meshes[0].weight("smile").unwrap();
            let b = meshes[1].weight("smile").unwrap();
            assert_eq!(a, b);
            assert_eq!(meshes[1].weight("blink"), Some(0.0));
        }
    }

    #[test]
    fn test_independent_channels_run_together() {
        let mut driver = driver();
        let mut meshes = vec![mesh(&["laugh", "cry"])];
        driver.trigger("laugh", 0.0);
        driver.trigger("cry", 0.0);

        driver.update(0.4, &mut meshes);
        assert!(meshes[0].weight("laugh").unwrap() > 0.9);
        assert!(meshes[0].weight("cry").unwrap() > 0.0);
        assert_eq!(driver.active_channels(), vec!["cry", "laugh"]);

        // laugh ends at 0.8, cry keeps going until 1.2
        driver.update(0.9, &mut meshes);
        assert_eq!(meshes[0].weight("laugh").unwrap(), 0.0);
        assert!(meshes[0].weight("cry").unwrap() > 0.0);
    }

    #[test]
    fn test_retrigger_restarts_origin() {
        let mut driver = driver();
        let mut meshes = vec![mesh(&["laugh"])];
        driver.trigger("laugh", 0.0);
        driver.update(0.4, &mut meshes);
        assert!(meshes[0].weight("laugh").unwrap() > 0.9);

        driver.trigger("laugh", 0.4);
        driver.update(0.4, &mut meshes);
        assert_eq!(meshes[0].weight("laugh").unwrap(), 0.0);

        // Old envelope would have finished at 0.8; the new one peaks there
        driver.update(0.8, &mut meshes);
        assert!((meshes[0].weight("laugh").unwrap() - 1.0).abs() < 1e-4);
        assert!(driver.is_active("laugh"));
    }

    #[test]
    fn test_trigger_key() {
        let mut driver = driver();
        assert_eq!(driver.trigger_key("e", 0.0).as_deref(), Some("smile"));
        assert_eq!(driver.trigger_key("z", 0.0), None);
        assert!(driver.is_active("smile"));
    }

    #[test]
    fn test_placeholder_without_channels() {
        let mut driver = driver();
        let mut meshes: Vec<MorphChannels> = vec![MorphChannels::empty()];
        driver.trigger("laugh", 0.0);
        driver.update(0.4, &mut meshes);
        driver.update(1.0, &mut meshes);
        assert!(meshes[0].is_empty());
    }

    #[test]
    fn test_tail_swish_adds_to_base_and_restores() {
        let base = Quat::from_rotation_z(0.3);
        let swish = TailSwish::new(4, base, 1.0);

        let (start, done) = swish.sample(1.0);
        assert!(!done);
        assert!((base.inverse() * start).to_axis_angle().1 < 1e-3);

        // Quarter way: sin(pi/2) * 0.25 * 0.75
        let (quarter, _) = swish.sample(1.0 + 0.15);
        let (axis, angle) = (base.inverse() * quarter).to_axis_angle();
        assert!((angle - 0.1875).abs() < 1e-3);
        assert!(axis.z > 0.99);

        let (end, done) = swish.sample(1.0 + TAIL_SWISH_DURATION);
        assert!(done);
        assert_eq!(end, base);
    }

    #[test]
    fn test_swish_offset_decays() {
        assert_eq!(swish_offset(0.0), 0.0);
        assert!(swish_offset(0.25) > 0.0);
        assert!(swish_offset(0.75) < 0.0);
        assert!(swish_offset(0.25).abs() > swish_offset(0.75).abs() * 2.0);
        assert!(swish_offset(1.0).abs() < 1e-6);
    }
}
