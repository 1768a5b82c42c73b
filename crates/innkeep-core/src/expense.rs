use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filter::Filterable;
use crate::interval::DateInterval;

/// A property expense line. Date filters treat an expense as the
/// single day it was booked on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub uuid: Uuid,

    #[serde(default)]
    pub id: Option<u64>,

    pub description: String,

    pub amount: f64,

    #[serde(default)]
    pub category: String,

    pub date: NaiveDate,

    #[serde(default)]
    pub room: Option<String>,
}

impl Expense {
    pub fn new(description: String, amount: f64, date: NaiveDate, id: u64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            id: Some(id),
            description,
            amount,
            category: String::new(),
            date,
            room: None,
        }
    }
}

impl Filterable for Expense {
    fn id(&self) -> Option<u64> {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![&self.description, &self.category]
    }

    fn status_token(&self) -> &str {
        &self.category
    }

    fn interval(&self) -> Option<DateInterval> {
        Some(DateInterval::day(self.date))
    }
}
