//! Expression definitions and the rise/fall envelope

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ConfigError;

/// A facial expression bound to a key and a morph channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionDef {
    /// Unique name for this expression
    pub name: String,
    /// Single-character keyboard trigger
    pub key: String,
    /// Morph target channel driven by this expression
    pub morph: String,
    /// Peak weight reached at the envelope midpoint (0.0 - 1.0)
    pub intensity: f32,
    /// Envelope length in seconds
    pub duration: f32,
}

impl ExpressionDef {
    /// Create a new expression
    pub fn new(name: &str, key: &str, morph: &str, intensity: f32, duration: f32) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
            morph: morph.to_string(),
            intensity,
            duration,
        }
    }

    /// The six expressions the cat ships with
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("laugh", "Q", "laugh", 1.0, 0.8),
            Self::new("cry", "W", "cry", 1.0, 1.2),
            Self::new("smile", "E", "smile", 0.9, 1.0),
            Self::new("angry", "R", "angry", 1.0, 0.9),
            Self::new("surprised", "T", "surprised", 1.0, 0.6),
            Self::new("sleepy", "Y", "sleepy", 0.8, 1.4),
        ]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let field = |f: &str| format!("expressions.{}.{}", self.name, f);

        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "expressions.name".to_string(),
                message: "Expression name must not be empty".to_string(),
            });
        }
        if self.key.chars().count() != 1 {
            return Err(ConfigError::InvalidValue {
                field: field("key"),
                message: format!("Key must be a single character, got '{}'", self.key),
            });
        }
        if self.morph.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field("morph"),
                message: "Morph channel must not be empty".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.intensity) {
            return Err(ConfigError::InvalidValue {
                field: field("intensity"),
                message: "Intensity must be between 0.0 and 1.0".to_string(),
            });
        }
        if !(self.duration > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: field("duration"),
                message: "Duration must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Immutable lookup table of expressions by name and by key
#[derive(Debug, Clone)]
pub struct ExpressionTable {
    expressions: Vec<ExpressionDef>,
    by_name: HashMap<String, usize>,
    by_key: HashMap<char, usize>,
}

impl ExpressionTable {
    /// Build a table, rejecting invalid entries and duplicate names or keys
    pub fn new(expressions: Vec<ExpressionDef>) -> Result<Self, ConfigError> {
        let mut by_name = HashMap::new();
        let mut by_key = HashMap::new();

        for (i, expr) in expressions.iter().enumerate() {
            expr.validate()?;

            if by_name.insert(expr.name.clone(), i).is_some() {
                return Err(ConfigError::InvalidValue {
                    field: format!("expressions.{}", expr.name),
                    message: "Duplicate expression name".to_string(),
                });
            }

            let key = normalize_key(&expr.key).unwrap_or_default();
            if by_key.insert(key, i).is_some() {
                return Err(ConfigError::InvalidValue {
                    field: format!("expressions.{}.key", expr.name),
                    message: format!("Key '{}' is already bound", expr.key),
                });
            }
        }

        Ok(Self {
            expressions,
            by_name,
            by_key,
        })
    }

    /// Get an expression by name
    pub fn get(&self, name: &str) -> Option<&ExpressionDef> {
        self.by_name.get(name).map(|&i| &self.expressions[i])
    }

    /// Look up the expression bound to a key (case-insensitive)
    pub fn for_key(&self, key: &str) -> Option<&ExpressionDef> {
        let key = normalize_key(key)?;
        self.by_key.get(&key).map(|&i| &self.expressions[i])
    }

    /// Expressions in definition order
    pub fn iter(&self) -> impl Iterator<Item = &ExpressionDef> {
        self.expressions.iter()
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }
}

#[cfg(test)]
impl Default for ExpressionTable {
    fn default() -> Self {
        Self::new(ExpressionDef::defaults()).expect("built-in expression table is valid")
    }
}

fn normalize_key(key: &str) -> Option<char> {
    let mut chars = key.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    c.to_lowercase().next()
}

/// Smoother-step (Perlin) ease on [0, 1], clamped.
pub fn smootherstep(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    x * x * x * (x * (x * 6.0 - 15.0) + 10.0)
}

/// Rise-then-fall envelope over normalized progress `t`.
///
/// The first half eases from 0 to `peak`, the second half eases back to 0.
pub fn envelope(t: f32, peak: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    let up = smootherstep((t * 2.0).min(1.0));
    let down = smootherstep(((t - 0.5) * 2.0).max(0.0));
    peak * (up * (1.0 - down))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = ExpressionTable::default();
        assert_eq!(table.len(), 6);

        let laugh = table.get("laugh").unwrap();
        assert_eq!(laugh.key, "Q");
        assert_eq!(laugh.intensity, 1.0);
        assert_eq!(laugh.duration, 0.8);

        assert!(table.get("purr").is_none());
    }

    #[test]
    fn test_key_lookup_is_case_insensitive() {
        let table = ExpressionTable::default();
        assert_eq!(table.for_key("q").unwrap().name, "laugh");
        assert_eq!(table.for_key("Q").unwrap().name, "laugh");
        assert_eq!(table.for_key("y").unwrap().name, "sleepy");
        assert!(table.for_key("z").is_none());
        assert!(table.for_key("qq").is_none());
        assert!(table.for_key("").is_none());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let exprs = vec![
            ExpressionDef::new("a", "Q", "a", 1.0, 1.0),
            ExpressionDef::new("b", "q", "b", 1.0, 1.0),
        ];
        assert!(ExpressionTable::new(exprs).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_intensity = vec![ExpressionDef::new("a", "Q", "a", 1.5, 1.0)];
        assert!(ExpressionTable::new(bad_intensity).is_err());

        let bad_duration = vec![ExpressionDef::new("a", "Q", "a", 1.0, 0.0)];
        assert!(ExpressionTable::new(bad_duration).is_err());

        let bad_key = vec![ExpressionDef::new("a", "QW", "a", 1.0, 1.0)];
        assert!(ExpressionTable::new(bad_key).is_err());
    }

    #[test]
    fn test_smootherstep_endpoints() {
        assert_eq!(smootherstep(0.0), 0.0);
        assert_eq!(smootherstep(1.0), 1.0);
        assert_eq!(smootherstep(-3.0), 0.0);
        assert_eq!(smootherstep(7.0), 1.0);
        assert!((smootherstep(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_envelope_shape() {
        assert_eq!(envelope(0.0, 1.0), 0.0);
        assert!((envelope(0.5, 1.0) - 1.0).abs() < 1e-6);
        assert_eq!(envelope(1.0, 1.0), 0.0);
        assert_eq!(envelope(2.0, 1.0), 0.0);

        // Rises monotonically, then falls monotonically
        let samples: Vec<f32> = (0..=20).map(|i| envelope(i as f32 / 20.0, 0.9)).collect();
        for w in samples[..=10].windows(2) {
            assert!(w[1] >= w[0]);
        }
        for w in samples[10..].windows(2) {
            assert!(w[1] <= w[0]);
        }
        assert!(samples.iter().all(|&v| v <= 0.9 + 1e-6));
    }

    #[test]
    fn test_laugh_scenario() {
        let laugh = ExpressionTable::default().get("laugh").cloned().unwrap();
        let at = |s: f32| envelope(s / laugh.duration, laugh.intensity);
        assert!((at(0.4) - 1.0).abs() < 1e-5);
        assert_eq!(at(0.8), 0.0);
    }
}
