//! MS-DOS date/time conversion.

use time::{Date, Month, PrimitiveDateTime, Time};

/// Convert a packed DOS date/time pair into a calendar timestamp.
///
/// Returns `None` for values that do not name a real instant (month 0,
/// February 30th, hour 25 and the like), which some writers emit.
pub fn dos_to_datetime(date: u16, time: u16) -> Option<PrimitiveDateTime> {
    let year = ((date >> 9) & 0x7F) as i32 + 1980;
    let month = Month::try_from(((date >> 5) & 0x0F) as u8).ok()?;
    let day = (date & 0x1F) as u8;

    let hour = ((time >> 11) & 0x1F) as u8;
    let minute = ((time >> 5) & 0x3F) as u8;
    let second = ((time & 0x1F) * 2) as u8;

    let date = Date::from_calendar_date(year, month, day).ok()?;
    let time = Time::from_hms(hour, minute, second).ok()?;
    Some(PrimitiveDateTime::new(date, time))
}
