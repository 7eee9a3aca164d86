//! Venue data as returned by the upstream API
//!
//! Upstream records carry more attributes than this crate needs. Anything
//! not modelled explicitly is kept in `attributes` so cached values and
//! aggregated responses round-trip the full upstream payload.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::InvalidationError;

/// Geographic area clubs are listed under
pub type PlaceId = String;
pub type ClubId = u64;
pub type CourtId = u64;

/// Format of [`Slot::datetime`]
pub const SLOT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Other shapes some upstream records use for [`Slot::datetime`]
const SLOT_DATETIME_FALLBACKS: &[&str] =
    &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Venue with one or more courts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: ClubId,
    /// Never supplied by the upstream; learned through the club → place index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<PlaceId>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Club {
    pub fn new(id: ClubId) -> Self {
        Self {
            id,
            place_id: None,
            attributes: Map::new(),
        }
    }
}

/// Bookable court of a club
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Court {
    pub id: CourtId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_id: Option<ClubId>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Court {
    pub fn new(id: CourtId, club_id: ClubId) -> Self {
        Self {
            id,
            club_id: Some(club_id),
            attributes: Map::new(),
        }
    }
}

/// Availability of one court for one start time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Start of the slot as `YYYY-MM-DD HH:mm`
    pub datetime: String,
    pub start: String,
    pub end: String,
    /// Minutes
    pub duration: u32,
    pub price: f64,
    #[serde(rename = "_priority", default)]
    pub priority: i32,
}

impl Slot {
    /// Calendar day the slot belongs to.
    ///
    /// Seconds and a `T` separator are accepted too; the reported error is
    /// the one for [`SLOT_DATETIME_FORMAT`].
    pub fn day(&self) -> Result<NaiveDate, InvalidationError> {
        let datetime = self.datetime.trim();
        NaiveDateTime::parse_from_str(datetime, SLOT_DATETIME_FORMAT)
            .or_else(|e| {
                SLOT_DATETIME_FALLBACKS
                    .iter()
                    .find_map(|format| NaiveDateTime::parse_from_str(datetime, format).ok())
                    .ok_or(e)
            })
            .map(|dt| dt.date())
            .map_err(|source| InvalidationError::InvalidSlotDate {
                datetime: self.datetime.clone(),
                source,
            })
    }
}

/// Court with its free slots for the requested day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourtWithAvailability {
    #[serde(flatten)]
    pub court: Court,
    pub available: Vec<Slot>,
}

/// Club with the availability of each of its courts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubWithAvailability {
    #[serde(flatten)]
    pub club: Club,
    pub courts: Vec<CourtWithAvailability>,
}
