// Copyright 2026 Modelshelf Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use time::Date;
use time::Duration;
use time::OffsetDateTime;
use time::format_description;
use time::format_description::well_known::Rfc3339;

/// Source of "now" for recency predicates and record timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(OffsetDateTime),
}

impl Clock {
    pub fn now(&self) -> OffsetDateTime {
        match self {
            Clock::System => OffsetDateTime::now_utc(),
            Clock::Fixed(at) => *at,
        }
    }
}

/// RFC 3339 in UTC with whole seconds, the format stored in every
/// timestamp column.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let at = at.to_offset(time::UtcOffset::UTC);
    let at = at.replace_nanosecond(0).unwrap_or(at);
    at.format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// 0000-01-01T00:00:00Z, the earliest instant both RFC 3339 and sqlite's
/// `julianday` accept.
const EARLIEST_UNIX: i64 = -62_167_219_200;

/// `days` before `at`, saturating at year 0 instead of overflowing.
pub fn days_before(at: OffsetDateTime, days: u32) -> OffsetDateTime {
    let floor =
        OffsetDateTime::from_unix_timestamp(EARLIEST_UNIX).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    at.checked_sub(Duration::days(i64::from(days)))
        .map_or(floor, |cutoff| cutoff.max(floor))
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates.
pub fn is_timestamp(value: &str) -> bool {
    if OffsetDateTime::parse(value, &Rfc3339).is_ok() {
        return true;
    }
    format_description::parse("[year]-[month]-[day]")
        .map(|format| Date::parse(value, &format).is_ok())
        .unwrap_or(false)
}
