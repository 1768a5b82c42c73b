use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::stamp_serde;
use crate::filter::Filterable;
use crate::interval::DateInterval;

/// Housekeeping state of a room. Checkout flips a room to `Dirty`;
/// the `clean`/`dirty` commands move it explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CleanState {
    Clean,
    Dirty,
    InProgress,
}

impl CleanState {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "clean" => Some(Self::Clean),
            "dirty" => Some(Self::Dirty),
            "inprogress" | "in-progress" => Some(Self::InProgress),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Dirty => "dirty",
            Self::InProgress => "inprogress",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub uuid: Uuid,

    pub number: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default = "default_capacity")]
    pub capacity: u32,

    #[serde(default)]
    pub rate: Option<f64>,

    pub clean: CleanState,

    #[serde(with = "stamp_serde")]
    pub entry: DateTime<Utc>,

    #[serde(with = "stamp_serde")]
    pub modified: DateTime<Utc>,
}

fn default_capacity() -> u32 {
    2
}

impl Room {
    pub fn new(number: String, name: String, now: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            number,
            name,
            owner: String::new(),
            capacity: default_capacity(),
            rate: None,
            clean: CleanState::Clean,
            entry: now,
            modified: now,
        }
    }
}

impl Filterable for Room {
    fn id(&self) -> Option<u64> {
        None
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![&self.number, &self.name]
    }

    fn status_token(&self) -> &str {
        self.clean.as_str()
    }

    fn interval(&self) -> Option<DateInterval> {
        None
    }
}
