//! Server time-zone resolution.
//!
//! MySQL reports its effective zone through `@@time_zone` and
//! `@@system_time_zone`, in whatever spelling the host OS uses. The codecs
//! need a real zone to interpret naive DATETIME/TIMESTAMP values, so init
//! normalises those strings into a [`ServerZone`] once.

use std::fmt;

use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone,
};
use chrono_tz::Tz;
use tracing::warn;

/// The server's effective time zone: a named IANA zone or a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl ServerZone {
    pub const UTC: ServerZone = ServerZone::Named(Tz::UTC);

    /// The zone's offset when it is fixed, `None` for named zones.
    pub fn fixed_offset(&self) -> Option<FixedOffset> {
        match self {
            Self::Named(_) => None,
            Self::Fixed(offset) => Some(*offset),
        }
    }

    /// Attach this zone to a naive local time.
    ///
    /// Ambiguous local times (DST fold) take the earliest instant; local
    /// times inside a DST gap shift forward past it.
    pub fn from_local(&self, naive: NaiveDateTime) -> DateTime<ServerZone> {
        match self.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => {
                let shifted = naive + TimeDelta::hours(1);
                match self.from_local_datetime(&shifted) {
                    LocalResult::Single(dt) => dt,
                    LocalResult::Ambiguous(earliest, _) => earliest,
                    LocalResult::None => self.from_utc_datetime(&naive),
                }
            }
        }
    }
}

impl fmt::Display for ServerZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(tz) => f.write_str(tz.name()),
            Self::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ServerZoneOffset {
    Named(Tz, <Tz as TimeZone>::Offset),
    Fixed(FixedOffset),
}

impl Offset for ServerZoneOffset {
    fn fix(&self) -> FixedOffset {
        match self {
            Self::Named(_, offset) => offset.fix(),
            Self::Fixed(offset) => *offset,
        }
    }
}

impl fmt::Display for ServerZoneOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fix())
    }
}

impl TimeZone for ServerZone {
    type Offset = ServerZoneOffset;

    fn from_offset(offset: &ServerZoneOffset) -> Self {
        match offset {
            ServerZoneOffset::Named(tz, _) => Self::Named(*tz),
            ServerZoneOffset::Fixed(fixed) => Self::Fixed(*fixed),
        }
    }

    fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<ServerZoneOffset> {
        match self {
            Self::Named(tz) => tz
                .offset_from_local_date(local)
                .map(|offset| ServerZoneOffset::Named(*tz, offset)),
            Self::Fixed(fixed) => LocalResult::Single(ServerZoneOffset::Fixed(*fixed)),
        }
    }

    fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<ServerZoneOffset> {
        match self {
            Self::Named(tz) => tz
                .offset_from_local_datetime(local)
                .map(|offset| ServerZoneOffset::Named(*tz, offset)),
            Self::Fixed(fixed) => LocalResult::Single(ServerZoneOffset::Fixed(*fixed)),
        }
    }

    fn offset_from_utc_date(&self, utc: &NaiveDate) -> ServerZoneOffset {
        match self {
            Self::Named(tz) => ServerZoneOffset::Named(*tz, tz.offset_from_utc_date(utc)),
            Self::Fixed(fixed) => ServerZoneOffset::Fixed(*fixed),
        }
    }

    fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> ServerZoneOffset {
        match self {
            Self::Named(tz) => ServerZoneOffset::Named(*tz, tz.offset_from_utc_datetime(utc)),
            Self::Fixed(fixed) => ServerZoneOffset::Fixed(*fixed),
        }
    }
}

/// Resolve the zone reported by the init discovery query.
///
/// `@@time_zone` set to `SYSTEM` (or empty) defers to `@@system_time_zone`.
/// Unresolvable names fall back to `fallback` (the configured client zone)
/// rather than failing init.
pub fn resolve_server_zone(
    time_zone: &str,
    system_time_zone: &str,
    fallback: ServerZone,
) -> ServerZone {
    let raw = if time_zone.is_empty() || time_zone.eq_ignore_ascii_case("SYSTEM") {
        system_time_zone
    } else {
        time_zone
    };

    match parse_zone(raw) {
        Some(zone) => zone,
        None => {
            warn!(
                zone = raw,
                fallback = %fallback,
                "unrecognized server time zone, using the client zone"
            );
            fallback
        }
    }
}

/// Parse a single zone spelling: an offset like `+08:00`, or an IANA name
/// after prefix stripping and alias mapping.
pub fn parse_zone(raw: &str) -> Option<ServerZone> {
    let name = raw.trim();
    let name = name
        .strip_prefix("posix/")
        .or_else(|| name.strip_prefix("right/"))
        .unwrap_or(name);

    // Spellings the tz crate does not carry (or carries with a different
    // meaning than MySQL intends).
    let name = match name {
        "Factory" => "UTC",
        "America/Nuuk" => "America/Godthab",
        "ROC" => "+08:00",
        other => other,
    };

    if name.starts_with('+') || name.starts_with('-') {
        parse_offset(name).map(ServerZone::Fixed)
    } else {
        name.parse::<Tz>().ok().map(ServerZone::Named)
    }
}

fn parse_offset(spec: &str) -> Option<FixedOffset> {
    let (sign, rest) = match spec.as_bytes().first()? {
        b'+' => (1i32, &spec[1..]),
        b'-' => (-1i32, &spec[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_defers_to_system_time_zone() {
        let zone = resolve_server_zone("SYSTEM", "right/UTC", ServerZone::UTC);
        assert_eq!(zone, ServerZone::Named(Tz::UTC));
        assert_eq!(zone.to_string(), "UTC");
    }

    #[test]
    fn empty_defers_to_system_time_zone() {
        let zone = resolve_server_zone("", "Asia/Seoul", ServerZone::UTC);
        assert_eq!(zone, ServerZone::Named(Tz::Asia__Seoul));
    }

    #[test]
    fn roc_maps_to_fixed_offset() {
        let zone = resolve_server_zone("ROC", "UTC", ServerZone::UTC);
        assert_eq!(
            zone,
            ServerZone::Fixed(FixedOffset::east_opt(8 * 3600).unwrap())
        );
        assert_eq!(zone.to_string(), "+08:00");
    }

    #[test]
    fn special_names_are_mapped() {
        assert_eq!(parse_zone("Factory"), Some(ServerZone::Named(Tz::UTC)));
        assert_eq!(
            parse_zone("America/Nuuk"),
            Some(ServerZone::Named(Tz::America__Godthab))
        );
        assert_eq!(parse_zone("posix/Europe/Paris"), Some(ServerZone::Named(Tz::Europe__Paris)));
    }

    #[test]
    fn offsets_parse() {
        assert_eq!(
            parse_zone("+05:30"),
            Some(ServerZone::Fixed(FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()))
        );
        assert_eq!(
            parse_zone("-03:00"),
            Some(ServerZone::Fixed(FixedOffset::west_opt(3 * 3600).unwrap()))
        );
        assert_eq!(parse_zone("+5:99"), None);
    }

    #[test]
    fn garbage_falls_back_to_client_zone() {
        let fallback = ServerZone::Named(Tz::Asia__Tokyo);
        assert_eq!(resolve_server_zone("KST-9", "KST-9", fallback), fallback);
    }

    #[test]
    fn fold_takes_earliest_instant() {
        // Europe/Paris 2021-10-31 02:30 occurs twice; the earliest is CEST (+02:00).
        let zone = ServerZone::Named(Tz::Europe__Paris);
        let naive = NaiveDate::from_ymd_opt(2021, 10, 31)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let dt = zone.from_local(naive);
        assert_eq!(dt.offset().fix(), FixedOffset::east_opt(2 * 3600).unwrap());
    }
}
