//! Scheduling settings shared by the scheduler, queue and session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{DEFAULT_EASE_FACTOR, MAX_EASE_FACTOR, MIN_EASE_FACTOR};

/// Daily quotas and interval tuning. Missing fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub new_cards_per_day: u32,
    pub review_cards_per_day: u32,
    pub ease_factor_default: f64,
    /// In days.
    pub initial_interval: u32,
    /// Multiplier for all grown intervals.
    pub interval_modifier: f64,
    pub auto_save: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            new_cards_per_day: 10,
            review_cards_per_day: 20,
            ease_factor_default: DEFAULT_EASE_FACTOR,
            initial_interval: 1,
            interval_modifier: 1.0,
            auto_save: true,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.new_cards_per_day == 0 {
            return Err(Error::InvalidSettings(
                "new_cards_per_day must be at least 1".to_string(),
            ));
        }
        if self.review_cards_per_day == 0 {
            return Err(Error::InvalidSettings(
                "review_cards_per_day must be at least 1".to_string(),
            ));
        }
        if self.initial_interval == 0 {
            return Err(Error::InvalidSettings(
                "initial_interval must be at least 1 day".to_string(),
            ));
        }
        if !self.interval_modifier.is_finite() || self.interval_modifier <= 0.0 {
            return Err(Error::InvalidSettings(format!(
                "interval_modifier must be a positive number, got {}",
                self.interval_modifier
            )));
        }
        if !(MIN_EASE_FACTOR..=MAX_EASE_FACTOR).contains(&self.ease_factor_default) {
            return Err(Error::InvalidSettings(format!(
                "ease_factor_default must be between {} and {}, got {}",
                MIN_EASE_FACTOR, MAX_EASE_FACTOR, self.ease_factor_default
            )));
        }
        Ok(())
    }

    /// Set a single field by name from its textual value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        match key {
            "new_cards_per_day" => updated.new_cards_per_day = parse_value(key, value)?,
            "review_cards_per_day" => updated.review_cards_per_day = parse_value(key, value)?,
            "ease_factor_default" => updated.ease_factor_default = parse_value(key, value)?,
            "initial_interval" => updated.initial_interval = parse_value(key, value)?,
            "interval_modifier" => updated.interval_modifier = parse_value(key, value)?,
            "auto_save" => updated.auto_save = parse_value(key, value)?,
            other => {
                return Err(Error::InvalidSettings(format!("unknown setting '{}'", other)));
            }
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::InvalidSettings(format!("bad value '{}' for {}: {}", value, key, e)))
}
