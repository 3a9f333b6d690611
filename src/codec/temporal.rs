//! Temporal codecs.
//!
//! Binary DATE/DATETIME/TIMESTAMP cells are length-prefixed: 0, 4, 7 or 11
//! bytes depending on which fields are present. Binary TIME cells are 0, 8
//! or 12 bytes: sign, whole days, h/m/s and optional microseconds. Text
//! cells are the canonical `YYYY-MM-DD[ HH:MM:SS[.ffffff]]` and
//! `[-]HHH:MM:SS[.ffffff]` spellings, with fractions shorter than six
//! digits accepted.
//!
//! Naive server times gain meaning through the codec context: zoned values
//! attach the server zone, offset values attach the server zone's offset at
//! that local time, and instants are interpreted in the server or client
//! zone depending on `preserve_instants`.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Utc,
};
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::codec::{ColumnMeta, Decode, Encode, Parameter, Raw, text_str, unsupported};
use crate::constant::ColumnType;
use crate::context::{CodecContext, ZeroDate};
use crate::error::{Error, Result, eyre};
use crate::zone::ServerZone;

/// MySQL TIME spans at most ±838:59:59, i.e. just under 35 days.
const MAX_TIME_DELTA_HOURS: i64 = 838;

/// The sentinel zero dates round to under [`ZeroDate::Sentinel`].
fn sentinel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or_default()
}

// ============================================================================
// Binary cell layouts
// ============================================================================

/// DATE/DATETIME/TIMESTAMP - 4 bytes (date only)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
struct DateTime4 {
    year: U16LE,
    month: u8,
    day: u8,
}

/// DATE/DATETIME/TIMESTAMP - 7 bytes (no microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
struct DateTime7 {
    year: U16LE,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

/// DATE/DATETIME/TIMESTAMP - 11 bytes (with microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
struct DateTime11 {
    year: U16LE,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    microsecond: U32LE,
}

/// TIME - 8 bytes (no microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
struct Time8 {
    is_negative: u8,
    days: U32LE,
    hour: u8,
    minute: u8,
    second: u8,
}

/// TIME - 12 bytes (with microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
struct Time12 {
    is_negative: u8,
    days: U32LE,
    hour: u8,
    minute: u8,
    second: u8,
    microsecond: U32LE,
}

// ============================================================================
// Shared intermediates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct DateTimeParts {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    microsecond: u32,
}

impl DateTimeParts {
    /// A literal zero date (`0000-00-00 ...`).
    fn is_zero(&self) -> bool {
        self.month == 0 || self.day == 0
    }

    fn date(&self) -> Result<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32).ok_or(
            Error::DecodeSyntax {
                target: "date",
                input: format!("{:04}-{:02}-{:02}", self.year, self.month, self.day),
            },
        )
    }

    fn datetime(&self) -> Result<NaiveDateTime> {
        let time = NaiveTime::from_hms_micro_opt(
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
            self.microsecond,
        )
        .ok_or(Error::DecodeSyntax {
            target: "time-of-day",
            input: format!(
                "{:02}:{:02}:{:02}.{:06}",
                self.hour, self.minute, self.second, self.microsecond
            ),
        })?;
        Ok(self.date()?.and_time(time))
    }
}

/// Read a length-prefixed binary DATE/DATETIME/TIMESTAMP cell.
fn read_datetime_cell(buf: &[u8]) -> Result<DateTimeParts> {
    let (&len, rest) = buf
        .split_first()
        .ok_or_else(|| Error::ProtocolCorrupt(eyre!("empty temporal cell")))?;
    let underrun = || Error::ProtocolCorrupt(eyre!("temporal cell under-run: len {}", len));
    match len {
        0 => Ok(DateTimeParts::default()),
        4 => {
            let v = DateTime4::ref_from_bytes(rest.get(..4).ok_or_else(underrun)?)?;
            Ok(DateTimeParts {
                year: v.year.get(),
                month: v.month,
                day: v.day,
                ..DateTimeParts::default()
            })
        }
        7 => {
            let v = DateTime7::ref_from_bytes(rest.get(..7).ok_or_else(underrun)?)?;
            Ok(DateTimeParts {
                year: v.year.get(),
                month: v.month,
                day: v.day,
                hour: v.hour,
                minute: v.minute,
                second: v.second,
                microsecond: 0,
            })
        }
        11 => {
            let v = DateTime11::ref_from_bytes(rest.get(..11).ok_or_else(underrun)?)?;
            Ok(DateTimeParts {
                year: v.year.get(),
                month: v.month,
                day: v.day,
                hour: v.hour,
                minute: v.minute,
                second: v.second,
                microsecond: v.microsecond.get(),
            })
        }
        other => Err(Error::ProtocolCorrupt(eyre!(
            "invalid temporal cell length: {}",
            other
        ))),
    }
}

/// Read a length-prefixed binary TIME cell as a signed duration.
fn read_time_cell(buf: &[u8]) -> Result<TimeDelta> {
    let (&len, rest) = buf
        .split_first()
        .ok_or_else(|| Error::ProtocolCorrupt(eyre!("empty TIME cell")))?;
    let underrun = || Error::ProtocolCorrupt(eyre!("TIME cell under-run: len {}", len));

    let (negative, days, hour, minute, second, micro) = match len {
        0 => return Ok(TimeDelta::zero()),
        8 => {
            let v = Time8::ref_from_bytes(rest.get(..8).ok_or_else(underrun)?)?;
            (v.is_negative != 0, v.days.get(), v.hour, v.minute, v.second, 0)
        }
        12 => {
            let v = Time12::ref_from_bytes(rest.get(..12).ok_or_else(underrun)?)?;
            (
                v.is_negative != 0,
                v.days.get(),
                v.hour,
                v.minute,
                v.second,
                v.microsecond.get(),
            )
        }
        other => {
            return Err(Error::ProtocolCorrupt(eyre!(
                "invalid TIME cell length: {}",
                other
            )));
        }
    };

    let seconds = days as i64 * 86_400 + hour as i64 * 3_600 + minute as i64 * 60 + second as i64;
    let magnitude = TimeDelta::seconds(seconds) + TimeDelta::microseconds(micro as i64);
    Ok(if negative { -magnitude } else { magnitude })
}

// ============================================================================
// Text parsing
// ============================================================================

fn parse_fixed_u32(s: &str, target: &'static str) -> Result<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::DecodeSyntax {
            target,
            input: s.to_owned(),
        });
    }
    s.parse().map_err(|_| Error::DecodeSyntax {
        target,
        input: s.to_owned(),
    })
}

/// A fraction of 1..=6 digits, right-padded to microseconds.
fn parse_fraction(s: &str, target: &'static str) -> Result<u32> {
    if s.is_empty() || s.len() > 6 {
        return Err(Error::DecodeSyntax {
            target,
            input: s.to_owned(),
        });
    }
    let micros = parse_fixed_u32(s, target)?;
    Ok(micros * 10u32.pow(6 - s.len() as u32))
}

fn parse_date_text(text: &str) -> Result<DateTimeParts> {
    let syntax = || Error::DecodeSyntax {
        target: "date",
        input: text.to_owned(),
    };
    let mut fields = text.splitn(3, '-');
    let year = parse_fixed_u32(fields.next().ok_or_else(syntax)?, "date")?;
    let month = parse_fixed_u32(fields.next().ok_or_else(syntax)?, "date")?;
    let day = parse_fixed_u32(fields.next().ok_or_else(syntax)?, "date")?;
    if year > 9999 || month > 12 || day > 31 {
        return Err(syntax());
    }
    Ok(DateTimeParts {
        year: year as u16,
        month: month as u8,
        day: day as u8,
        ..DateTimeParts::default()
    })
}

fn parse_datetime_text(text: &str) -> Result<DateTimeParts> {
    let (date_part, time_part) = match text.split_once(' ') {
        Some((date, time)) => (date, Some(time)),
        None => (text, None),
    };
    let mut parts = parse_date_text(date_part)?;

    if let Some(time) = time_part {
        let syntax = || Error::DecodeSyntax {
            target: "datetime",
            input: text.to_owned(),
        };
        let (hms, fraction) = match time.split_once('.') {
            Some((hms, frac)) => (hms, Some(frac)),
            None => (time, None),
        };
        let mut fields = hms.splitn(3, ':');
        let hour = parse_fixed_u32(fields.next().ok_or_else(syntax)?, "datetime")?;
        let minute = parse_fixed_u32(fields.next().ok_or_else(syntax)?, "datetime")?;
        let second = parse_fixed_u32(fields.next().ok_or_else(syntax)?, "datetime")?;
        if hour > 23 || minute > 59 || second > 59 {
            return Err(syntax());
        }
        parts.hour = hour as u8;
        parts.minute = minute as u8;
        parts.second = second as u8;
        if let Some(frac) = fraction {
            parts.microsecond = parse_fraction(frac, "datetime")?;
        }
    }
    Ok(parts)
}

fn parse_time_text(text: &str) -> Result<TimeDelta> {
    let syntax = || Error::DecodeSyntax {
        target: "time",
        input: text.to_owned(),
    };
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (hms, fraction) = match rest.split_once('.') {
        Some((hms, frac)) => (hms, Some(frac)),
        None => (rest, None),
    };
    let mut fields = hms.splitn(3, ':');
    let hours = parse_fixed_u32(fields.next().ok_or_else(syntax)?, "time")?;
    let minutes = parse_fixed_u32(fields.next().ok_or_else(syntax)?, "time")?;
    let seconds = parse_fixed_u32(fields.next().ok_or_else(syntax)?, "time")?;
    if hours > MAX_TIME_DELTA_HOURS as u32 || minutes > 59 || seconds > 59 {
        return Err(syntax());
    }
    let micros = match fraction {
        Some(frac) => parse_fraction(frac, "time")?,
        None => 0,
    };

    let magnitude = TimeDelta::seconds(hours as i64 * 3_600 + minutes as i64 * 60 + seconds as i64)
        + TimeDelta::microseconds(micros as i64);
    Ok(if negative { -magnitude } else { magnitude })
}

// ============================================================================
// Shared decode plumbing
// ============================================================================

fn is_date_column(col: &ColumnMeta) -> bool {
    matches!(
        col.column_type,
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE
    )
}

fn is_time_column(col: &ColumnMeta) -> bool {
    matches!(
        col.column_type,
        ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2
    )
}

fn is_datetime_column(col: &ColumnMeta) -> bool {
    matches!(
        col.column_type,
        ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_DATETIME2
            | ColumnType::MYSQL_TYPE_TIMESTAMP
            | ColumnType::MYSQL_TYPE_TIMESTAMP2
    ) || is_date_column(col)
}

fn decode_parts(raw: Raw<'_>, col: &ColumnMeta) -> Result<DateTimeParts> {
    match raw {
        Raw::Binary(buf) => read_datetime_cell(buf),
        Raw::Text(buf) => {
            let text = text_str(buf, "datetime")?;
            if is_date_column(col) {
                parse_date_text(text)
            } else {
                parse_datetime_text(text)
            }
        }
        Raw::Null => Err(Error::LibraryBug(eyre!("null cell reached temporal codec"))),
    }
}

// ============================================================================
// Decode impls
// ============================================================================

impl Decode for NaiveDate {
    fn can_decode(col: &ColumnMeta, _ctx: &CodecContext) -> bool {
        is_date_column(col)
    }

    fn decode(raw: Raw<'_>, col: &ColumnMeta, ctx: &CodecContext) -> Result<Option<Self>> {
        let parts = decode_parts(raw, col)?;
        if parts.is_zero() {
            return match ctx.zero_date {
                ZeroDate::AsNull => Ok(None),
                ZeroDate::Sentinel => Ok(Some(sentinel_date())),
            };
        }
        parts.date().map(Some)
    }
}

impl Decode for NaiveDateTime {
    fn can_decode(col: &ColumnMeta, _ctx: &CodecContext) -> bool {
        is_datetime_column(col)
    }

    fn decode(raw: Raw<'_>, col: &ColumnMeta, ctx: &CodecContext) -> Result<Option<Self>> {
        let parts = decode_parts(raw, col)?;
        if parts.is_zero() {
            return match ctx.zero_date {
                ZeroDate::AsNull => Ok(None),
                ZeroDate::Sentinel => Ok(Some(sentinel_date().and_hms_opt(0, 0, 0).unwrap_or_default())),
            };
        }
        parts.datetime().map(Some)
    }
}

impl Decode for TimeDelta {
    fn can_decode(col: &ColumnMeta, _ctx: &CodecContext) -> bool {
        is_time_column(col)
    }

    fn decode(raw: Raw<'_>, _col: &ColumnMeta, _ctx: &CodecContext) -> Result<Option<Self>> {
        match raw {
            Raw::Binary(buf) => read_time_cell(buf).map(Some),
            Raw::Text(buf) => parse_time_text(text_str(buf, "time")?).map(Some),
            Raw::Null => Ok(None),
        }
    }
}

impl Decode for NaiveTime {
    fn can_decode(col: &ColumnMeta, _ctx: &CodecContext) -> bool {
        is_time_column(col)
    }

    fn decode(raw: Raw<'_>, col: &ColumnMeta, ctx: &CodecContext) -> Result<Option<Self>> {
        let Some(delta) = TimeDelta::decode(raw, col, ctx)? else {
            return Ok(None);
        };
        // a time of day must fall inside one day
        if delta < TimeDelta::zero() || delta >= TimeDelta::days(1) {
            return Err(unsupported::<NaiveTime>(col));
        }
        let secs = delta.num_seconds() as u32;
        let micro = delta.subsec_nanos() as u32 / 1_000;
        NaiveTime::from_num_seconds_from_midnight_opt(secs, micro * 1_000)
            .ok_or_else(|| unsupported::<NaiveTime>(col))
            .map(Some)
    }
}

impl Decode for DateTime<ServerZone> {
    fn can_decode(col: &ColumnMeta, ctx: &CodecContext) -> bool {
        NaiveDateTime::can_decode(col, ctx)
    }

    fn decode(raw: Raw<'_>, col: &ColumnMeta, ctx: &CodecContext) -> Result<Option<Self>> {
        Ok(NaiveDateTime::decode(raw, col, ctx)?.map(|naive| ctx.server_zone.from_local(naive)))
    }
}

impl Decode for DateTime<FixedOffset> {
    fn can_decode(col: &ColumnMeta, ctx: &CodecContext) -> bool {
        NaiveDateTime::can_decode(col, ctx)
    }

    fn decode(raw: Raw<'_>, col: &ColumnMeta, ctx: &CodecContext) -> Result<Option<Self>> {
        Ok(NaiveDateTime::decode(raw, col, ctx)?.map(|naive| {
            let zoned = ctx.server_zone.from_local(naive);
            zoned.fixed_offset()
        }))
    }
}

impl Decode for DateTime<Utc> {
    fn can_decode(col: &ColumnMeta, ctx: &CodecContext) -> bool {
        NaiveDateTime::can_decode(col, ctx)
    }

    fn decode(raw: Raw<'_>, col: &ColumnMeta, ctx: &CodecContext) -> Result<Option<Self>> {
        let zone = if ctx.preserve_instants {
            ctx.server_zone
        } else {
            ctx.client_zone
        };
        Ok(NaiveDateTime::decode(raw, col, ctx)?
            .map(|naive| zone.from_local(naive).with_timezone(&Utc)))
    }
}

// ============================================================================
// Encode impls
// ============================================================================

fn encode_date_fields(date: NaiveDate, out: &mut Vec<u8>) -> Result<()> {
    let year = date.year();
    if !(0..=9999).contains(&year) {
        return Err(Error::NoCodec(format!("date out of MySQL range: {}", date)));
    }
    out.extend_from_slice(&(year as u16).to_le_bytes());
    out.push(date.month() as u8);
    out.push(date.day() as u8);
    Ok(())
}

impl Encode for NaiveDate {
    fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
        let mut binary = Vec::with_capacity(5);
        binary.push(4);
        encode_date_fields(*self, &mut binary)?;
        Ok(Parameter::new(
            ColumnType::MYSQL_TYPE_DATE,
            false,
            binary,
            format!("'{}'", self.format("%Y-%m-%d")),
        ))
    }
}

impl Encode for NaiveDateTime {
    fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
        let micro = self.time().nanosecond() / 1_000;
        let (hour, minute, second) = (self.time().hour(), self.time().minute(), self.time().second());

        // the packet is compressed: trailing all-zero field groups are dropped
        let len: u8 = match (hour, minute, second, micro) {
            (0, 0, 0, 0) => 4,
            (_, _, _, 0) => 7,
            _ => 11,
        };

        let mut binary = Vec::with_capacity(len as usize + 1);
        binary.push(len);
        encode_date_fields(self.date(), &mut binary)?;
        if len > 4 {
            binary.push(hour as u8);
            binary.push(minute as u8);
            binary.push(second as u8);
        }
        if len > 7 {
            binary.extend_from_slice(&micro.to_le_bytes());
        }

        let text = if micro == 0 {
            format!("'{}'", self.format("%Y-%m-%d %H:%M:%S"))
        } else {
            format!("'{}'", self.format("%Y-%m-%d %H:%M:%S%.6f"))
        };
        Ok(Parameter::new(
            ColumnType::MYSQL_TYPE_DATETIME,
            false,
            binary,
            text,
        ))
    }
}

impl Encode for NaiveTime {
    fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
        let micro = self.nanosecond() / 1_000;
        let len: u8 = if micro == 0 { 8 } else { 12 };

        let mut binary = Vec::with_capacity(len as usize + 1);
        binary.push(len);
        binary.push(0); // non-negative
        binary.extend_from_slice(&0u32.to_le_bytes()); // zero days
        binary.push(self.hour() as u8);
        binary.push(self.minute() as u8);
        binary.push(self.second() as u8);
        if micro != 0 {
            binary.extend_from_slice(&micro.to_le_bytes());
        }

        let text = if micro == 0 {
            format!("'{}'", self.format("%H:%M:%S"))
        } else {
            format!("'{}'", self.format("%H:%M:%S%.6f"))
        };
        Ok(Parameter::new(
            ColumnType::MYSQL_TYPE_TIME,
            false,
            binary,
            text,
        ))
    }
}

impl Encode for TimeDelta {
    fn encode(&self, _ctx: &CodecContext) -> Result<Parameter> {
        let negative = *self < TimeDelta::zero();
        let magnitude = if negative { -*self } else { *self };

        let total_seconds = magnitude.num_seconds();
        let micro = (magnitude.subsec_nanos() / 1_000) as u32;
        let hours_total = total_seconds / 3_600;
        if hours_total > MAX_TIME_DELTA_HOURS {
            return Err(Error::NoCodec(format!(
                "duration out of MySQL TIME range: {} hours",
                hours_total
            )));
        }

        let days = (total_seconds / 86_400) as u32;
        let hour = ((total_seconds % 86_400) / 3_600) as u8;
        let minute = ((total_seconds % 3_600) / 60) as u8;
        let second = (total_seconds % 60) as u8;

        let len: u8 = if micro == 0 { 8 } else { 12 };
        let mut binary = Vec::with_capacity(len as usize + 1);
        binary.push(len);
        binary.push(negative as u8);
        binary.extend_from_slice(&days.to_le_bytes());
        binary.push(hour);
        binary.push(minute);
        binary.push(second);
        if micro != 0 {
            binary.extend_from_slice(&micro.to_le_bytes());
        }

        let sign = if negative { "-" } else { "" };
        let text = if micro == 0 {
            format!("'{}{:02}:{:02}:{:02}'", sign, hours_total, minute, second)
        } else {
            format!(
                "'{}{:02}:{:02}:{:02}.{:06}'",
                sign, hours_total, minute, second, micro
            )
        };
        Ok(Parameter::new(
            ColumnType::MYSQL_TYPE_TIME,
            false,
            binary,
            text,
        ))
    }
}

impl Encode for DateTime<ServerZone> {
    fn encode(&self, ctx: &CodecContext) -> Result<Parameter> {
        // same instant, server-local wall clock
        self.with_timezone(&ctx.server_zone).naive_local().encode(ctx)
    }
}

impl Encode for DateTime<FixedOffset> {
    fn encode(&self, ctx: &CodecContext) -> Result<Parameter> {
        self.with_timezone(&ctx.server_zone).naive_local().encode(ctx)
    }
}

impl Encode for DateTime<Utc> {
    fn encode(&self, ctx: &CodecContext) -> Result<Parameter> {
        let zone = if ctx.preserve_instants {
            ctx.server_zone
        } else {
            ctx.client_zone
        };
        self.with_timezone(&zone).naive_local().encode(ctx)
    }
}

impl Encode for DateTime<chrono_tz::Tz> {
    fn encode(&self, ctx: &CodecContext) -> Result<Parameter> {
        self.with_timezone(&ctx.server_zone).naive_local().encode(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::version::ServerVersion;
    use chrono::{Offset, TimeZone};
    use chrono_tz::Tz;

    fn ctx() -> CodecContext {
        CodecContext::with_defaults(ServerVersion::new(8, 0, 32))
    }

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, micro: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_micro_opt(h, mi, s, micro)
            .unwrap()
    }

    #[test]
    fn datetime6_encodes_eleven_bytes() {
        let value = dt(2021, 5, 3, 15, 2, 7, 123_456);
        let p = value.encode(&ctx()).unwrap();
        assert_eq!(
            p.binary_bytes(),
            [0x0B, 0xE5, 0x07, 0x05, 0x03, 0x0F, 0x02, 0x07, 0x40, 0xE2, 0x01, 0x00]
        );
        assert_eq!(p.text_literal(), "'2021-05-03 15:02:07.123456'");
    }

    #[test]
    fn datetime_packet_compression() {
        let p = dt(2010, 10, 17, 19, 27, 30, 0).encode(&ctx()).unwrap();
        assert_eq!(p.binary_bytes(), [7, 218, 7, 10, 17, 19, 27, 30]);

        let p = dt(2010, 10, 17, 0, 0, 0, 0).encode(&ctx()).unwrap();
        assert_eq!(p.binary_bytes(), [4, 218, 7, 10, 17]);
    }

    #[test]
    fn datetime_binary_round_trip() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_DATETIME);
        for value in [
            dt(2021, 5, 3, 15, 2, 7, 123_456),
            dt(2010, 10, 17, 19, 27, 30, 0),
            dt(2010, 10, 17, 0, 0, 0, 0),
        ] {
            let p = value.encode(&ctx()).unwrap();
            let back: Option<NaiveDateTime> =
                decode(Raw::Binary(p.binary_bytes()), &col, &ctx()).unwrap();
            assert_eq!(back, Some(value));
        }
    }

    #[test]
    fn datetime_text_accepts_short_fractions() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_DATETIME);
        let v: Option<NaiveDateTime> =
            decode(Raw::Text(b"2021-05-03 15:02:07.12"), &col, &ctx()).unwrap();
        assert_eq!(v, Some(dt(2021, 5, 3, 15, 2, 7, 120_000)));

        let v: Option<NaiveDateTime> = decode(Raw::Text(b"2021-05-03"), &col, &ctx()).unwrap();
        assert_eq!(v, Some(dt(2021, 5, 3, 0, 0, 0, 0)));
    }

    #[test]
    fn zero_date_policy() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_DATETIME);

        let v: Option<NaiveDateTime> =
            decode(Raw::Text(b"0000-00-00 00:00:00"), &col, &ctx()).unwrap();
        assert_eq!(v, None);
        let v: Option<NaiveDateTime> = decode(Raw::Binary(&[0]), &col, &ctx()).unwrap();
        assert_eq!(v, None);

        let mut round = ctx();
        round.zero_date = ZeroDate::Sentinel;
        let v: Option<NaiveDateTime> = decode(Raw::Binary(&[0]), &col, &round).unwrap();
        assert_eq!(v, Some(dt(1, 1, 1, 0, 0, 0, 0)));
    }

    #[test]
    fn date_decode_both_modes() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_DATE);
        let v: Option<NaiveDate> = decode(Raw::Binary(&[4, 218, 7, 10, 17]), &col, &ctx()).unwrap();
        assert_eq!(v, Some(NaiveDate::from_ymd_opt(2010, 10, 17).unwrap()));

        let v: Option<NaiveDate> = decode(Raw::Text(b"2010-10-17"), &col, &ctx()).unwrap();
        assert_eq!(v, Some(NaiveDate::from_ymd_opt(2010, 10, 17).unwrap()));
    }

    #[test]
    fn negative_duration_round_trip() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_TIME);
        let value = -(TimeDelta::hours(100) + TimeDelta::minutes(30) + TimeDelta::microseconds(250));
        let p = value.encode(&ctx()).unwrap();

        // sign byte + 4 whole days + 04:30:00.000250
        assert_eq!(p.binary_bytes()[0], 12);
        assert_eq!(p.binary_bytes()[1], 1);
        assert_eq!(&p.binary_bytes()[2..6], &4u32.to_le_bytes());

        let back: Option<TimeDelta> = decode(Raw::Binary(p.binary_bytes()), &col, &ctx()).unwrap();
        assert_eq!(back, Some(value));
    }

    #[test]
    fn time_text_forms() {
        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_TIME);
        let v: Option<TimeDelta> = decode(Raw::Text(b"-838:59:59"), &col, &ctx()).unwrap();
        assert_eq!(
            v,
            Some(-(TimeDelta::hours(838) + TimeDelta::minutes(59) + TimeDelta::seconds(59)))
        );

        let v: Option<NaiveTime> = decode(Raw::Text(b"15:02:07.5"), &col, &ctx()).unwrap();
        assert_eq!(v, Some(NaiveTime::from_hms_micro_opt(15, 2, 7, 500_000).unwrap()));

        let err = decode::<NaiveTime>(Raw::Text(b"25:00:00"), &col, &ctx()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion { .. }));
    }

    #[test]
    fn duration_out_of_range_is_rejected() {
        assert!(matches!(
            TimeDelta::hours(839).encode(&ctx()),
            Err(Error::NoCodec(_))
        ));
    }

    #[test]
    fn zoned_decode_attaches_server_zone() {
        let mut zoned_ctx = ctx();
        zoned_ctx.server_zone = ServerZone::Named(Tz::Asia__Seoul);

        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_TIMESTAMP);
        let v: Option<DateTime<ServerZone>> =
            decode(Raw::Text(b"2021-05-03 15:02:07"), &col, &zoned_ctx).unwrap();
        let v = v.unwrap();
        assert_eq!(v.naive_local(), dt(2021, 5, 3, 15, 2, 7, 0));
        assert_eq!(v.offset().fix(), FixedOffset::east_opt(9 * 3600).unwrap());
    }

    #[test]
    fn offset_decode_resolves_server_offset() {
        let mut fixed_ctx = ctx();
        fixed_ctx.server_zone = ServerZone::Fixed(FixedOffset::east_opt(8 * 3600).unwrap());

        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_TIMESTAMP);
        let v: Option<DateTime<FixedOffset>> =
            decode(Raw::Text(b"2021-05-03 15:02:07"), &col, &fixed_ctx).unwrap();
        let v = v.unwrap();
        assert_eq!(*v.offset(), FixedOffset::east_opt(8 * 3600).unwrap());
        assert_eq!(v.naive_local(), dt(2021, 5, 3, 15, 2, 7, 0));
    }

    #[test]
    fn instant_respects_preserve_instants() {
        let mut instant_ctx = ctx();
        instant_ctx.server_zone = ServerZone::Fixed(FixedOffset::east_opt(2 * 3600).unwrap());
        instant_ctx.preserve_instants = true;

        let col = ColumnMeta::new(ColumnType::MYSQL_TYPE_TIMESTAMP);
        let v: Option<DateTime<Utc>> =
            decode(Raw::Text(b"2021-05-03 15:02:07"), &col, &instant_ctx).unwrap();
        assert_eq!(v.unwrap().naive_utc(), dt(2021, 5, 3, 13, 2, 7, 0));

        instant_ctx.preserve_instants = false;
        let v: Option<DateTime<Utc>> =
            decode(Raw::Text(b"2021-05-03 15:02:07"), &col, &instant_ctx).unwrap();
        // client zone is UTC: wall clock taken verbatim
        assert_eq!(v.unwrap().naive_utc(), dt(2021, 5, 3, 15, 2, 7, 0));
    }

    #[test]
    fn zoned_encode_converts_to_server_zone() {
        let mut zoned_ctx = ctx();
        zoned_ctx.server_zone = ServerZone::Fixed(FixedOffset::east_opt(8 * 3600).unwrap());

        // 2021-05-03 00:00:00 UTC == 2021-05-03 08:00:00 server-local
        let value = Utc.with_ymd_and_hms(2021, 5, 3, 0, 0, 0).unwrap();
        let p = value.encode(&zoned_ctx).unwrap();
        assert_eq!(p.text_literal(), "'2021-05-03 08:00:00'");
    }
}
