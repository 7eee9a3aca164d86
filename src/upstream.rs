//! Upstream venue API seam

use chrono::NaiveDate;

use crate::{
    error::UpstreamError,
    model::{Club, ClubId, Court, CourtId, Slot},
};

/// Read operations the upstream venue API must expose.
///
/// The transport is up to the implementation (HTTP, gRPC, a fixture). Any
/// failure is reported as an opaque [`UpstreamError`].
#[async_trait::async_trait]
pub trait UpstreamClient: Send + Sync + 'static {
    /// Clubs listed under a place
    async fn get_clubs(&self, place_id: &str) -> Result<Vec<Club>, UpstreamError>;

    /// Courts of a club
    async fn get_courts(&self, club_id: ClubId) -> Result<Vec<Court>, UpstreamError>;

    /// Available slots of one court on one day
    async fn get_available_slots(
        &self,
        club_id: ClubId,
        court_id: CourtId,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, UpstreamError>;
}
