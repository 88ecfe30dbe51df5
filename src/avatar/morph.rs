//! Per-mesh morph target channels.
//!
//! Every mesh owns its own `name → index` dictionary; the same channel name
//! may map to different indices on different meshes.

use std::collections::HashMap;

/// Anything that exposes named morph channels.
pub trait MorphTarget {
    /// Index of the channel called `name`, if this target defines it.
    fn morph_index(&self, name: &str) -> Option<usize>;

    /// Write a weight into channel `index`.
    fn set_morph_weight(&mut self, index: usize, weight: f32);

    /// Set a channel by name. Returns false when the channel does not exist here.
    fn set_named_weight(&mut self, name: &str, weight: f32) -> bool {
        match self.morph_index(name) {
            Some(index) => {
                self.set_morph_weight(index, weight);
                true
            }
            None => false,
        }
    }
}

/// Morph dictionary plus the live influence array for one mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphChannels {
    name_to_index: HashMap<String, usize>,
    names: Vec<String>,
    influences: Vec<f32>,
}

impl MorphChannels {
    /// Create channels from the mesh's morph target names, all weights at 0.
    pub fn new(names: Vec<String>) -> Self {
        let mut name_to_index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // First occurrence wins for duplicated names
            name_to_index.entry(name.clone()).or_insert(i);
        }
        Self {
            name_to_index,
            influences: vec![0.0; names.len()],
            names,
        }
    }

    /// A mesh without morph targets.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.influences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.influences.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn influences(&self) -> &[f32] {
        &self.influences
    }

    pub fn weight(&self, name: &str) -> Option<f32> {
        self.morph_index(name).map(|i| self.influences[i])
    }
}

impl MorphTarget for MorphChannels {
    fn morph_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    fn set_morph_weight(&mut self, index: usize, weight: f32) {
        if let Some(w) = self.influences.get_mut(index) {
            *w = weight;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_lookup() {
        let mut channels = MorphChannels::new(vec!["blink".into(), "smile".into()]);
        assert_eq!(channels.morph_index("smile"), Some(1));
        assert_eq!(channels.morph_index("laugh"), None);

        assert!(channels.set_named_weight("smile", 0.5));
        assert!(!channels.set_named_weight("laugh", 0.5));
        assert_eq!(channels.influences(), &[0.0, 0.5]);
        assert_eq!(channels.weight("smile"), Some(0.5));
    }

    #[test]
    fn test_out_of_range_index_ignored() {
        let mut channels = MorphChannels::new(vec!["a".into()]);
        channels.set_morph_weight(5, 1.0);
        assert_eq!(channels.influences(), &[0.0]);
    }

    #[test]
    fn test_empty_channels() {
        let channels = MorphChannels::empty();
        assert!(channels.is_empty());
        assert_eq!(channels.morph_index("smile"), None);
    }
}
