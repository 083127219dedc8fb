use crate::store::SettingsStore;
use std::time::Duration;
use tracing::warn;

pub const FOCUS_MINUTES_KEY: &str = "focus_minutes";
pub const AUTOSAVE_INTERVAL_KEY: &str = "autosave_interval_secs";
pub const TREND_WINDOW_KEY: &str = "trend_window_days";

/// Typed view over the settings store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    /// Default focus session length
    pub focus_minutes: u32,
    pub autosave_interval_secs: u64,
    pub trend_window_days: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            autosave_interval_secs: 30,
            trend_window_days: 30,
        }
    }
}

/// Read a positive integer setting, falling back on missing or bad values
fn read_positive<T>(settings: &SettingsStore, key: &str, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + Copy,
{
    let Some(raw) = settings.get(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!(key, value = %raw, "ignoring invalid setting, using default");
            default
        }
    }
}

impl Preferences {
    pub fn load(settings: &SettingsStore) -> Self {
        let defaults = Self::default();
        Self {
            focus_minutes: read_positive(settings, FOCUS_MINUTES_KEY, defaults.focus_minutes),
            autosave_interval_secs: read_positive(
                settings,
                AUTOSAVE_INTERVAL_KEY,
                defaults.autosave_interval_secs,
            ),
            trend_window_days: read_positive(settings, TREND_WINDOW_KEY, defaults.trend_window_days),
        }
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }
}
