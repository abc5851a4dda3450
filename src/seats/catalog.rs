use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeatStatus {
    Available,
    Booked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRecord {
    pub coach: String,
    pub seat_number: String,
    pub status: SeatStatus,
}

impl SeatRecord {
    pub fn new(coach: &str, seat_number: &str, status: SeatStatus) -> Self {
        Self {
            coach: coach.to_string(),
            seat_number: seat_number.to_string(),
            status,
        }
    }
}

/// Seat availability per train and journey date. Stands in for the
/// upstream reservation system that lookups query.
#[derive(Debug, Clone, Default)]
pub struct SeatCatalog {
    trains: HashMap<String, BTreeMap<NaiveDate, Vec<SeatRecord>>>,
}

impl SeatCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journey(mut self, train_name: &str, date: NaiveDate, seats: Vec<SeatRecord>) -> Self {
        self.trains
            .entry(train_name.to_string())
            .or_default()
            .insert(date, seats);
        self
    }

    /// The demonstration data set
    pub fn simulated() -> Self {
        use SeatStatus::{Available, Booked};

        let date = |day: u32| NaiveDate::from_ymd_opt(2025, 6, day).unwrap_or_default();

        Self::new()
            .with_journey(
                "Intercity Express",
                date(1),
                vec![
                    SeatRecord::new("A", "1A", Available),
                    SeatRecord::new("A", "1B", Booked),
                    SeatRecord::new("B", "2C", Available),
                ],
            )
            .with_journey(
                "Intercity Express",
                date(2),
                vec![
                    SeatRecord::new("A", "1A", Booked),
                    SeatRecord::new("A", "1B", Available),
                    SeatRecord::new("C", "3D", Available),
                ],
            )
            .with_journey(
                "Local Shuttle",
                date(1),
                vec![
                    SeatRecord::new("L1", "1", Available),
                    SeatRecord::new("L1", "2", Booked),
                ],
            )
            .with_journey(
                "Local Shuttle",
                date(3),
                vec![
                    SeatRecord::new("L1", "1", Booked),
                    SeatRecord::new("L2", "5", Available),
                ],
            )
    }

    pub fn train_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.trains.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn lookup(&self, train_name: &str, date: NaiveDate) -> Result<&[SeatRecord]> {
        let journeys = self.trains.get(train_name).ok_or_else(|| {
            AppError::JobFailed(format!("Train '{}' not found in our system.", train_name))
        })?;
        let seats = journeys.get(&date).ok_or_else(|| {
            AppError::JobFailed(format!(
                "No journeys found for {} on {}.",
                train_name, date
            ))
        })?;
        if seats.is_empty() {
            return Err(AppError::JobFailed(format!(
                "No seat data found for {} on {}.",
                train_name, date
            )));
        }
        Ok(seats)
    }
}
