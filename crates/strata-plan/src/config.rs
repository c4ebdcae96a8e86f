//! Move profiles ("path configs") and their arena.
//!
//! Segment-splitting in the planner compares profiles by handle, not
//! by value: two profiles with identical speeds and widths are still
//! distinct segments. Profiles therefore live in a slotmap arena and
//! are passed around as [`ConfigKey`] handles.

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle to a [`PathConfig`] in a [`PathConfigs`] arena.
    pub struct ConfigKey;
}

/// An immutable move profile: how fast to move and how much material
/// to deposit per millimeter of travel.
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// Nominal speed in mm/s, before per-layer speed factors.
    pub speed: i32,
    /// Extrusion line width in micrometers. Zero marks a travel
    /// profile that never extrudes.
    pub line_width: i64,
    /// Human-readable type tag, emitted as a `TYPE:` annotation.
    pub name: String,
    /// Ramp Z continuously across this path (vase mode).
    pub spiralize: bool,
}

impl PathConfig {
    /// Create an extrusion profile.
    pub fn new(speed: i32, line_width: i64, name: &str) -> Self {
        Self {
            speed,
            line_width,
            name: name.to_owned(),
            spiralize: false,
        }
    }

    /// Create a non-extruding travel profile.
    pub fn travel(speed: i32) -> Self {
        Self::new(speed, 0, "travel")
    }

    /// Same profile with the spiralize flag set.
    pub fn spiralized(mut self) -> Self {
        self.spiralize = true;
        self
    }
}

/// Arena of move profiles, handed out as [`ConfigKey`] handles.
#[derive(Debug, Default)]
pub struct PathConfigs {
    slots: SlotMap<ConfigKey, PathConfig>,
}

impl PathConfigs {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a profile and return its handle.
    pub fn insert(&mut self, config: PathConfig) -> ConfigKey {
        self.slots.insert(config)
    }

    /// Look up a profile by handle.
    pub fn get(&self, key: ConfigKey) -> Option<&PathConfig> {
        self.slots.get(key)
    }
}

impl std::ops::Index<ConfigKey> for PathConfigs {
    type Output = PathConfig;

    fn index(&self, key: ConfigKey) -> &PathConfig {
        &self.slots[key]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_identity() {
        let mut configs = PathConfigs::new();
        let a = configs.insert(PathConfig::new(50, 400, "WALL-OUTER"));
        let b = configs.insert(PathConfig::new(50, 400, "WALL-OUTER"));
        // Equal-valued profiles are still distinct handles.
        assert_ne!(a, b);
        assert_eq!(configs[a].name, configs[b].name);
    }

    #[test]
    fn test_travel_profile() {
        let cfg = PathConfig::travel(150);
        assert_eq!(cfg.line_width, 0);
        assert_eq!(cfg.name, "travel");
        assert!(!cfg.spiralize);
        assert!(PathConfig::new(30, 400, "SKIN").spiralized().spiralize);
    }
}
