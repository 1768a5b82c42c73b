use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::stamp_serde;
use crate::filter::Filterable;
use crate::interval::DateInterval;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl BookingStatus {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "confirmed" => Some(Self::Confirmed),
            "checkedin" | "checked-in" => Some(Self::CheckedIn),
            "checkedout" | "checked-out" => Some(Self::CheckedOut),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::CheckedIn => "checkedin",
            Self::CheckedOut => "checkedout",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    #[serde(with = "stamp_serde")]
    pub entry: DateTime<Utc>,
    pub text: String,
}

/// A stay reservation. Check-in and check-out are whole days in
/// property-local time; the night count is `check_out - check_in`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub uuid: Uuid,

    #[serde(default)]
    pub id: Option<u64>,

    pub reference: String,

    pub guest: String,

    pub room: String,

    pub check_in: NaiveDate,

    pub check_out: NaiveDate,

    pub status: BookingStatus,

    #[serde(default = "default_guest_count")]
    pub guests: u32,

    #[serde(default)]
    pub rate: Option<f64>,

    #[serde(with = "stamp_serde")]
    pub entry: DateTime<Utc>,

    #[serde(with = "stamp_serde")]
    pub modified: DateTime<Utc>,

    #[serde(default)]
    pub notes: Vec<Note>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_guest_count() -> u32 {
    1
}

impl Booking {
    pub fn new_confirmed(
        guest: String,
        room: String,
        stay: DateInterval,
        now: DateTime<Utc>,
        id: u64,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            id: Some(id),
            reference: format!("BK-{id:04}"),
            guest,
            room,
            check_in: stay.start(),
            check_out: stay.end(),
            status: BookingStatus::Confirmed,
            guests: 1,
            rate: None,
            entry: now,
            modified: now,
            notes: vec![],
            extra: BTreeMap::new(),
        }
    }

    /// The booked interval. Dates already stored out of order (imports,
    /// hand-edited data files) are swapped rather than rejected.
    pub fn stay(&self) -> DateInterval {
        DateInterval::normalized(self.check_in, self.check_out)
    }

    pub fn nights(&self) -> i64 {
        self.stay().nights()
    }

    /// Stay total: nights times nightly rate, when a rate is set.
    pub fn total(&self) -> Option<f64> {
        self.rate.map(|rate| rate * self.nights() as f64)
    }

    /// Cancelled bookings stay on file but no longer occupy a room.
    pub fn occupies_room(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }
}

impl Filterable for Booking {
    fn id(&self) -> Option<u64> {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![&self.guest, &self.reference, &self.room]
    }

    fn status_token(&self) -> &str {
        self.status.as_str()
    }

    fn interval(&self) -> Option<DateInterval> {
        Some(self.stay())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::{Booking, BookingStatus};
    use crate::interval::DateInterval;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    #[test]
    fn totals_follow_night_count() {
        let stay = DateInterval::new(d(2023, 11, 5), d(2023, 11, 8)).expect("interval");
        let mut booking = Booking::new_confirmed("Ada".to_string(), "101".to_string(), stay, Utc::now(), 7);

        assert_eq!(booking.reference, "BK-0007");
        assert_eq!(booking.nights(), 3);
        assert_eq!(booking.total(), None);

        booking.rate = Some(80.0);
        assert_eq!(booking.total(), Some(240.0));
    }

    #[test]
    fn status_tokens_round_trip() {
        for status in [
            BookingStatus::Confirmed,
            BookingStatus::CheckedIn,
            BookingStatus::CheckedOut,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("checked-in"), Some(BookingStatus::CheckedIn));
        assert_eq!(BookingStatus::parse("unknown"), None);
    }
}
