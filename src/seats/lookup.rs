use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::catalog::{SeatCatalog, SeatRecord, SeatStatus};
use crate::core::jobs::{Job, JobContext, JobIdentity};
use crate::error::{AppError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Search criteria for one availability lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatQuery {
    pub train_name: String,
    pub journey_date: NaiveDate,
}

impl SeatQuery {
    /// Validate raw form input. Both fields are required and the date must
    /// be `YYYY-MM-DD`.
    pub fn parse(train_name: Option<&str>, journey_date: Option<&str>) -> Result<Self> {
        let train_name = train_name.map(str::trim).filter(|s| !s.is_empty());
        let journey_date = journey_date.map(str::trim).filter(|s| !s.is_empty());

        let (Some(train_name), Some(journey_date)) = (train_name, journey_date) else {
            return Err(AppError::ValidationError(
                "Your request is incomplete. Please search again from the home page.".to_string(),
            ));
        };

        let journey_date = NaiveDate::parse_from_str(journey_date, DATE_FORMAT).map_err(|e| {
            AppError::ValidationError(format!("Invalid journey date '{}': {}", journey_date, e))
        })?;

        Ok(Self {
            train_name: train_name.to_string(),
            journey_date,
        })
    }

    /// Identical searches share one identity, and so one lookup.
    pub fn identity(&self) -> Result<JobIdentity> {
        JobIdentity::from_criteria(self)
    }
}

/// Result payload of a successful lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAvailability {
    pub train_name: String,
    pub journey_date: NaiveDate,
    pub seats: Vec<SeatRecord>,
    pub available_count: usize,
}

pub struct SeatLookupJob {
    query: SeatQuery,
    catalog: Arc<SeatCatalog>,
    latency: Duration,
}

impl SeatLookupJob {
    pub fn new(query: SeatQuery, catalog: Arc<SeatCatalog>, latency: Duration) -> Self {
        Self {
            query,
            catalog,
            latency,
        }
    }
}

#[async_trait]
impl Job for SeatLookupJob {
    async fn execute(&self, context: &JobContext) -> Result<serde_json::Value> {
        debug!(
            identity = %context.identity,
            train_name = %self.query.train_name,
            journey_date = %self.query.journey_date,
            "Querying seat availability"
        );

        tokio::select! {
            _ = context.cancellation_token.cancelled() => {
                return Err(AppError::JobFailed("Lookup cancelled".to_string()));
            }
            _ = tokio::time::sleep(self.latency) => {}
        }

        let seats = self
            .catalog
            .lookup(&self.query.train_name, self.query.journey_date)?
            .to_vec();
        let available_count = seats
            .iter()
            .filter(|seat| seat.status == SeatStatus::Available)
            .count();

        let availability = SeatAvailability {
            train_name: self.query.train_name.clone(),
            journey_date: self.query.journey_date,
            seats,
            available_count,
        };
        Ok(serde_json::to_value(availability)?)
    }

    fn name(&self) -> &str {
        "seat_lookup"
    }
}
