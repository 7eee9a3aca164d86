//! Cache key scheme and TTL policy
//!
//! Keys have the shape `kind:identifiers[:day]`, with days formatted as
//! `YYYY-MM-DD`. Every primary key has a shadow companion `{key}:stale`.
//!
//! | kind          | key                                 | TTL    |
//! |---------------|-------------------------------------|--------|
//! | search        | `search:{place_id}:{day}`           | 60s    |
//! | clubs         | `clubs:{place_id}`                  | 1h     |
//! | courts        | `courts:{club_id}`                  | 1h     |
//! | slots         | `slots:{club_id}:{court_id}:{day}`  | 120s   |
//! | club → place  | `club->place:{club_id}`             | 24h    |
//! | shadow        | `{key}:stale`                       | 24h    |

use chrono::NaiveDate;

use crate::model::{ClubId, CourtId};

const SHADOW_SUFFIX: &str = ":stale";

/// Fixed TTL per entity kind
pub mod ttl {
    use std::time::Duration;

    pub const SEARCH: Duration = Duration::from_secs(60);
    pub const CLUBS: Duration = Duration::from_secs(3_600);
    pub const COURTS: Duration = Duration::from_secs(3_600);
    pub const SLOTS: Duration = Duration::from_secs(120);
    pub const CLUB_TO_PLACE: Duration = Duration::from_secs(86_400);
    pub const SHADOW: Duration = Duration::from_secs(86_400);
}

fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Aggregated availability of a place for one day
pub fn search(place_id: &str, date: NaiveDate) -> String {
    format!("search:{}:{}", place_id, day(date))
}

/// Clubs listed under a place
pub fn clubs(place_id: &str) -> String {
    format!("clubs:{place_id}")
}

/// Courts of a club
pub fn courts(club_id: ClubId) -> String {
    format!("courts:{club_id}")
}

/// Available slots of one court for one day
pub fn slots(club_id: ClubId, court_id: CourtId, date: NaiveDate) -> String {
    format!("slots:{}:{}:{}", club_id, court_id, day(date))
}

/// Pattern matching every per-day slot list of every court of a club
pub fn club_slots_pattern(club_id: ClubId) -> String {
    format!("slots:{club_id}:*")
}

/// Reverse index from a club to the place it was last listed under
pub fn club_to_place(club_id: ClubId) -> String {
    format!("club->place:{club_id}")
}

/// Shadow companion of a primary key
pub fn shadow(key: &str) -> String {
    format!("{key}{SHADOW_SUFFIX}")
}

/// Whether `key` names a shadow copy
pub fn is_shadow(key: &str) -> bool {
    key.ends_with(SHADOW_SUFFIX)
}

/// Map a shadow key back to its primary; primary keys are returned as-is.
pub fn primary_of(key: &str) -> &str {
    key.strip_suffix(SHADOW_SUFFIX).unwrap_or(key)
}

/// Checks whether `key` matches a Redis-style glob pattern.
///
/// Supports `*` (any run of characters, including none) and `?` (exactly
/// one character). Every other character matches itself.
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    // Position of the last `*` seen and the key index it was matched against
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, k));
                p += 1;
            }
            Some('?') => {
                p += 1;
                k += 1;
            }
            Some(c) if *c == key[k] => {
                p += 1;
                k += 1;
            }
            _ => match backtrack {
                Some((star_p, star_k)) => {
                    p = star_p + 1;
                    k = star_k + 1;
                    backtrack = Some((star_p, star_k + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_key_shapes() {
        let d = date(2022, 8, 25);
        assert_eq!(search("G1", d), "search:G1:2022-08-25");
        assert_eq!(clubs("G1"), "clubs:G1");
        assert_eq!(courts(166), "courts:166");
        assert_eq!(slots(166, 733, d), "slots:166:733:2022-08-25");
        assert_eq!(club_to_place(166), "club->place:166");
        assert_eq!(club_slots_pattern(166), "slots:166:*");
        assert_eq!(shadow("courts:166"), "courts:166:stale");
    }

    #[test]
    fn test_day_has_no_time_component() {
        assert_eq!(slots(1, 2, date(2024, 1, 5)), "slots:1:2:2024-01-05");
    }

    #[test]
    fn test_shadow_round_trip() {
        let key = slots(166, 733, date(2022, 8, 25));
        let stale = shadow(&key);
        assert!(is_shadow(&stale));
        assert!(!is_shadow(&key));
        assert_eq!(primary_of(&stale), key);
        assert_eq!(primary_of(&key), key);
    }

    #[test]
    fn test_ttl_table() {
        assert_eq!(ttl::SEARCH.as_secs(), 60);
        assert_eq!(ttl::CLUBS.as_secs(), 3_600);
        assert_eq!(ttl::COURTS.as_secs(), 3_600);
        assert_eq!(ttl::SLOTS.as_secs(), 120);
        assert_eq!(ttl::CLUB_TO_PLACE.as_secs(), 86_400);
        assert_eq!(ttl::SHADOW.as_secs(), 86_400);
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("slots:166:*", "slots:166:733:2022-08-25"));
        assert!(pattern_matches("slots:166:*", "slots:166:733:2022-08-25:stale"));
        assert!(!pattern_matches("slots:166:*", "slots:1660:733:2022-08-25"));
        assert!(!pattern_matches("slots:166:*", "courts:166"));
        assert!(pattern_matches("*", ""));
        assert!(pattern_matches("courts:16?", "courts:166"));
        assert!(!pattern_matches("courts:16?", "courts:16"));
        assert!(pattern_matches("search:*:2022-08-25", "search:G1:2022-08-25"));
        assert!(!pattern_matches("search:*:2022-08-25", "search:G1:2022-08-26"));
        assert!(pattern_matches("a*b*c", "axxbyyc"));
        assert!(!pattern_matches("a*b*c", "axxbyy"));
        assert!(pattern_matches("exact", "exact"));
        assert!(!pattern_matches("exact", "exactly"));
    }
}
