use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DAY_MS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Artist,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "artist" => Ok(Self::Artist),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The acting user of a request, resolved from its session.
/// Handlers receive this explicitly rather than reading session state.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub user_id: Uuid,
    pub artist_name: String,
    pub role: Role,
    pub session_id: Uuid,
}

impl ActorContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Result of flipping a user's presence in a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub member: bool,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollabStatus {
    Open,
    Closed,
}

impl CollabStatus {
    /// Display status of a collab, derived from its end date.
    ///
    /// Days remaining are `ceil((end - now) / 1 day)`; zero or less is closed.
    /// A collab without an end date stays open.
    pub fn derive(end_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(end) = end_date else {
            return Self::Open;
        };

        let diff_ms = (end - now).num_milliseconds();
        let mut days_left = diff_ms.div_euclid(DAY_MS);
        if diff_ms.rem_euclid(DAY_MS) > 0 {
            days_left += 1;
        }

        if days_left <= 0 { Self::Closed } else { Self::Open }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl FromStr for CollabStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown collab status '{}'", other)),
        }
    }
}

/// Parse a date from a form field. Accepts RFC 3339 or a bare `YYYY-MM-DD`,
/// the latter read as midnight UTC.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// Normalize a tag list: values arriving as one comma-separated string are split,
/// blanks are dropped.
pub fn normalize_tags<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .flat_map(|v| {
            v.as_ref()
                .split(',')
                .map(|s| s.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|s| !s.is_empty())
        .collect()
}
