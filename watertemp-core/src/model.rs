use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::StoreError;

/// One persisted temperature observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Reading {
    pub id: i64,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Capture time, not the upstream observation time.
    pub observed_at: DateTime<Utc>,
    pub location: String,
}

/// A reading that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub temperature: f64,
    pub observed_at: DateTime<Utc>,
    pub location: String,
}

impl NewReading {
    /// Build a reading captured now.
    pub fn new(temperature: f64, location: impl Into<String>) -> Result<Self, StoreError> {
        if !temperature.is_finite() {
            return Err(StoreError::InvalidReading(temperature));
        }

        Ok(Self {
            temperature,
            observed_at: Utc::now(),
            location: location.into(),
        })
    }

    pub fn with_id(self, id: i64) -> Reading {
        Reading {
            id,
            temperature: self.temperature,
            observed_at: self.observed_at,
            location: self.location,
        }
    }
}
