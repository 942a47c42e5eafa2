// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Monotonic wall clock: seconds since 2000-01-01T00:00:00Z plus a
//! sub-second millisecond accumulator.
//!
//! The leap-year and month-length arithmetic below is transcribed from
//! `original_source/.../OSAL_Clock.c`'s `osal_ConvertUTCTime`/
//! `osal_ConvertUTCSecs`, not derived independently, since there is more than
//! one defensible way to walk years/months from a seconds count, and only
//! one of them matches what this kernel is supposed to report.

use osal_abi::{UtcTime, UtcTimeStruct, BASE_YEAR, SECONDS_PER_DAY};

fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn year_length(year: u16) -> u16 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Length in days of zero-origin month `month` (0 = January) in a year that
/// is a leap year iff `leap`.
///
/// Transcribed verbatim from the original's `monthLength`: February is
/// handled first, then every other month alternates 31/30 days by way of
/// `if mon > 6 { mon -= 1 }` before testing `mon & 1` -- reproduced exactly
/// rather than simplified, since it is responsible for matching the
/// original's calendar output bit for bit.
fn month_length(leap: bool, month: u8) -> u16 {
    if month == 1 {
        return 28 + leap as u16;
    }
    let mut mon = month;
    if mon > 6 {
        mon -= 1;
    }
    if mon & 1 == 1 {
        30
    } else {
        31
    }
}

/// Wall clock state: whole seconds since [`BASE_YEAR`]-01-01T00:00:00Z, plus
/// a millisecond accumulator for the fractional second and a free-running
/// total-milliseconds-since-boot counter (`system_ms`) that never resets,
/// unlike `seconds`/`millis`, which `set_clock` can rewrite.
#[derive(Copy, Clone, Debug, Default)]
pub struct Clock {
    seconds: u64,
    millis: u32,
    system_ms: u64,
}

impl Clock {
    pub const fn new() -> Self {
        Clock {
            seconds: 0,
            millis: 0,
            system_ms: 0,
        }
    }

    /// Advances the clock by `elapsed_ms`, carrying whole seconds into the
    /// seconds counter. Called once per dispatch pass (or once per tick
    /// interrupt under `systick-irq`).
    pub fn time_update(&mut self, elapsed_ms: u32) {
        self.system_ms += elapsed_ms as u64;
        self.millis += elapsed_ms;
        while self.millis >= 1000 {
            self.millis -= 1000;
            self.seconds += 1;
        }
    }

    /// Total milliseconds elapsed since boot. Unaffected by `set_clock`.
    pub fn system_millis(&self) -> u64 {
        self.system_ms
    }

    pub fn set_clock(&mut self, time: UtcTime) {
        self.seconds = time.0;
        self.millis = 0;
    }

    pub fn get_clock(&self) -> UtcTime {
        UtcTime(self.seconds)
    }

    /// Milliseconds elapsed in the current (not yet committed) second.
    pub fn sub_second_millis(&self) -> u32 {
        self.millis
    }
}

/// Splits a seconds-since-epoch count into a calendar representation.
pub fn convert_utc_to_struct(time: UtcTime) -> UtcTimeStruct {
    let sec_time = time.0;

    let day_seconds = (sec_time % SECONDS_PER_DAY) as u32;
    let hour = (day_seconds / 3600) as u8;
    let minute = ((day_seconds % 3600) / 60) as u8;
    let second = (day_seconds % 60) as u8;

    let mut num_days = sec_time / SECONDS_PER_DAY;

    let mut year = BASE_YEAR;
    while num_days >= year_length(year) as u64 {
        num_days -= year_length(year) as u64;
        year += 1;
    }
    let leap = is_leap_year(year);

    let mut month: u8 = 0;
    loop {
        let len = month_length(leap, month) as u64;
        if num_days < len {
            break;
        }
        num_days -= len;
        month += 1;
    }

    UtcTimeStruct {
        year,
        month,
        day: num_days as u8,
        hour,
        minute,
        second,
    }
}

/// Inverse of [`convert_utc_to_struct`]: folds a calendar representation
/// back into seconds since the epoch.
pub fn convert_struct_to_utc(time: &UtcTimeStruct) -> UtcTime {
    let mut seconds: u64 =
        time.hour as u64 * 3600 + time.minute as u64 * 60 + time.second as u64;

    let leap = is_leap_year(time.year);
    let mut days: u64 = time.day as u64;
    for month in 0..time.month {
        days += month_length(leap, month) as u64;
    }

    for year in BASE_YEAR..time.year {
        days += year_length(year) as u64;
    }

    seconds += days * SECONDS_PER_DAY;
    UtcTime(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_update_carries_whole_seconds() {
        let mut clock = Clock::new();
        clock.time_update(2500);
        assert_eq!(clock.get_clock().0, 2);
        assert_eq!(clock.sub_second_millis(), 500);
    }

    #[test]
    fn system_millis_ignores_set_clock_rewrites() {
        let mut clock = Clock::new();
        clock.time_update(2500);
        clock.set_clock(UtcTime(0));
        assert_eq!(clock.get_clock().0, 0, "set_clock rewinds the epoch counter");
        assert_eq!(clock.system_millis(), 2500, "but never the boot-uptime counter");
    }

    #[test]
    fn epoch_converts_to_jan_1_2000_midnight() {
        let s = convert_utc_to_struct(UtcTime(0));
        assert_eq!(s.year, 2000);
        assert_eq!(s.month, 0);
        assert_eq!(s.day, 0);
        assert_eq!(s.hour, 0);
        assert_eq!(s.minute, 0);
        assert_eq!(s.second, 0);
    }

    #[test]
    fn leap_day_2000_is_recognised() {
        // 2000-02-29 00:00:00Z: 31 (Jan) + 29 (Feb 0-indexed day 28) days in.
        let days = 31 + 28;
        let t = UtcTime(days * SECONDS_PER_DAY);
        let s = convert_utc_to_struct(t);
        assert_eq!(s.year, 2000);
        assert_eq!(s.month, 1);
        assert_eq!(s.day, 28);
    }

    #[test]
    fn struct_to_utc_and_back_round_trips() {
        let original = UtcTime(400 * SECONDS_PER_DAY + 12345);
        let s = convert_utc_to_struct(original);
        let back = convert_struct_to_utc(&s);
        assert_eq!(original, back);
    }

    #[test]
    fn year_boundary_crosses_correctly() {
        // 2000 is a leap year (366 days); one second into day 366 (index
        // 365) should roll over into 2001-01-01.
        let t = UtcTime(366 * SECONDS_PER_DAY);
        let s = convert_utc_to_struct(t);
        assert_eq!(s.year, 2001);
        assert_eq!(s.month, 0);
        assert_eq!(s.day, 0);
    }
}
