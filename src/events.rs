//! Domain change events

use serde::{Deserialize, Serialize};

use crate::model::{ClubId, CourtId, Slot};

/// Club field whose change can alter availability
pub const OPENING_HOURS_FIELD: &str = "openhours";

/// Change pushed from elsewhere in the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    #[serde(rename_all = "camelCase")]
    ClubUpdated {
        club_id: ClubId,
        #[serde(default)]
        fields: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    CourtUpdated {
        club_id: ClubId,
        court_id: CourtId,
        #[serde(default)]
        fields: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    SlotBooked {
        club_id: ClubId,
        court_id: CourtId,
        slot: Slot,
    },
    #[serde(rename_all = "camelCase")]
    SlotAvailable {
        club_id: ClubId,
        court_id: CourtId,
        slot: Slot,
    },
}

impl ChangeEvent {
    pub fn club_id(&self) -> ClubId {
        match self {
            Self::ClubUpdated { club_id, .. }
            | Self::CourtUpdated { club_id, .. }
            | Self::SlotBooked { club_id, .. }
            | Self::SlotAvailable { club_id, .. } => *club_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClubUpdated { .. } => "club_updated",
            Self::CourtUpdated { .. } => "court_updated",
            Self::SlotBooked { .. } => "slot_booked",
            Self::SlotAvailable { .. } => "slot_available",
        }
    }
}
