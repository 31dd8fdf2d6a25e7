use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Policy constants for scoring, analytics and selection.
///
/// Every field has a default, so a TOML file only needs to name what it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Attempts required before a concept can be judged weak or mastered.
    pub min_attempts: u32,
    /// Accuracy strictly below this marks a concept weak.
    pub weak_threshold: f64,
    /// Accuracy at or above this marks a concept mastered.
    pub mastery_threshold: f64,
    pub correct_reward: u32,
    pub incorrect_penalty: u32,
    pub weak_weight: f64,
    pub priority_weight: f64,
    pub exploration_weight: f64,
    /// Size of the priority pool after weak concepts are removed.
    pub priority_top_n: usize,
    /// Number of recently served concepts kept out of selection.
    pub history_window: usize,
    /// Untried concepts take their difficulty from the topic average
    /// instead of always starting at medium.
    pub difficulty_from_topic_average: bool,
    pub move_on_min_attempts: u32,
    pub give_up_accuracy: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            min_attempts: 2,
            weak_threshold: 0.60,
            mastery_threshold: 0.80,
            correct_reward: 10,
            incorrect_penalty: 5,
            weak_weight: 0.40,
            priority_weight: 0.40,
            exploration_weight: 0.20,
            priority_top_n: 3,
            history_window: 5,
            difficulty_from_topic_average: false,
            move_on_min_attempts: 3,
            give_up_accuracy: 0.50,
        }
    }
}

impl Policy {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let policy: Policy = toml::from_str(raw)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = 0.0..=1.0;
        for (name, value) in [
            ("weak_threshold", self.weak_threshold),
            ("mastery_threshold", self.mastery_threshold),
            ("give_up_accuracy", self.give_up_accuracy),
        ] {
            if !unit.contains(&value) {
                return Err(invalid(format!("{name} must be within [0, 1], got {value}")));
            }
        }

        if self.weak_threshold > self.mastery_threshold {
            return Err(invalid(format!(
                "weak_threshold {} exceeds mastery_threshold {}",
                self.weak_threshold, self.mastery_threshold
            )));
        }

        let weights = [self.weak_weight, self.priority_weight, self.exploration_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(invalid("pool weights must be finite and non-negative".to_string()));
        }
        if self.total_weight() <= 0.0 {
            return Err(invalid("at least one pool weight must be positive".to_string()));
        }

        if self.history_window == 0 {
            return Err(invalid("history_window must be at least 1".to_string()));
        }

        Ok(())
    }

    pub fn total_weight(&self) -> f64 {
        self.weak_weight + self.priority_weight + self.exploration_weight
    }
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid { reason }
}
