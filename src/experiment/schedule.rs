//! Scheduled Experiment - the slice of an experiment the collision detector needs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Scheduled Experiment represents one entry on the experiment calendar.
///
/// Dates are whole calendar days and both ends are inclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledExperiment {
    id: String,
    name: String,
    locale: String,
    audience_key: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    primary_metric: Option<String>,
}

impl ScheduledExperiment {
    /// Create a builder for a scheduled experiment.
    #[must_use]
    pub fn builder(
        id: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> ScheduledExperimentBuilder {
        ScheduledExperimentBuilder::new(id, start_date, end_date)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the locale (market) the experiment runs in.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Get the audience segment key.
    #[must_use]
    pub fn audience_key(&self) -> &str {
        &self.audience_key
    }

    /// Get the first day of the experiment.
    #[must_use]
    pub const fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Get the last day of the experiment.
    #[must_use]
    pub const fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Get the primary metric, if declared.
    #[must_use]
    pub fn primary_metric(&self) -> Option<&str> {
        self.primary_metric.as_deref()
    }

    /// Whether the experiment runs on `day`.
    #[must_use]
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }

    /// Whether the two date ranges share at least one day.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start_date <= other.end_date && other.start_date <= self.end_date
    }

    /// Check schedule invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSchedule`] on an empty ID or a start date
    /// after the end date.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidSchedule {
                experiment_id: self.id.clone(),
                reason: "experiment ID must not be empty".to_string(),
            });
        }
        if self.start_date > self.end_date {
            return Err(Error::InvalidSchedule {
                experiment_id: self.id.clone(),
                reason: format!(
                    "start date {} is after end date {}",
                    self.start_date, self.end_date
                ),
            });
        }
        Ok(())
    }
}

/// Builder for `ScheduledExperiment`.
#[derive(Debug)]
pub struct ScheduledExperimentBuilder {
    experiment: ScheduledExperiment,
}

impl ScheduledExperimentBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        let id = id.into();
        Self {
            experiment: ScheduledExperiment {
                name: id.clone(),
                id,
                locale: String::new(),
                audience_key: String::new(),
                start_date,
                end_date,
                primary_metric: None,
            },
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.experiment.name = name.into();
        self
    }

    /// Set the locale.
    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.experiment.locale = locale.into();
        self
    }

    /// Set the audience segment key.
    #[must_use]
    pub fn audience_key(mut self, audience_key: impl Into<String>) -> Self {
        self.experiment.audience_key = audience_key.into();
        self
    }

    /// Set the primary metric.
    #[must_use]
    pub fn primary_metric(mut self, metric: impl Into<String>) -> Self {
        self.experiment.primary_metric = Some(metric.into());
        self
    }

    /// Build the `ScheduledExperiment`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSchedule`] if the schedule is malformed.
    pub fn build(self) -> Result<ScheduledExperiment> {
        self.experiment.validate()?;
        Ok(self.experiment)
    }
}
