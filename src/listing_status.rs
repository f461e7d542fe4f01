use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// Width of the `listings.status` column.
pub const STATUS_MAX_LEN: usize = 20;

/// ListingStatus
///
/// Lifecycle tag persisted on every `listings` row as a short upper-case string.
/// Administrators may move a listing between any two states; there is no terminal
/// state (a RENTED listing can go back to AVAILABLE).
///
/// The status is independent of the `published` flag. Taking a listing "off-market"
/// means coordinating both, which is left to the caller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ListingStatus {
    #[default]
    Available,
    Pending,
    Reserved,
    Rented,
    Unavailable,
}

impl ListingStatus {
    pub const ALL: [ListingStatus; 5] = [
        ListingStatus::Available,
        ListingStatus::Pending,
        ListingStatus::Reserved,
        ListingStatus::Rented,
        ListingStatus::Unavailable,
    ];

    /// The persisted (and wire) representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Available => "AVAILABLE",
            ListingStatus::Pending => "PENDING",
            ListingStatus::Reserved => "RESERVED",
            ListingStatus::Rented => "RENTED",
            ListingStatus::Unavailable => "UNAVAILABLE",
        }
    }

    /// Short line shown next to a listing on the public pages.
    pub fn availability_message(&self) -> &'static str {
        match self {
            ListingStatus::Available => "Available now",
            ListingStatus::Pending => "Application pending",
            ListingStatus::Reserved => "Reserved",
            ListingStatus::Rented => "Currently rented",
            ListingStatus::Unavailable => "Not available",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ListingStatus::Available)
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the five status values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "invalid listing status `{0}`: expected one of AVAILABLE, PENDING, RESERVED, RENTED, UNAVAILABLE"
)]
pub struct InvalidStatus(pub String);

impl FromStr for ListingStatus {
    type Err = InvalidStatus;

    /// Exact, case-sensitive match against the persisted values.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ListingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| InvalidStatus(value.to_string()))
    }
}

// Used by `#[sqlx(try_from = "String")]` when decoding rows.
impl TryFrom<String> for ListingStatus {
    type Error = InvalidStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
