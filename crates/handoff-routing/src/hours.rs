// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Business-hours gate.
//!
//! A tenant is open when the current instant, converted into the tenant's
//! timezone, falls on an enabled weekday between `start` and `end`
//! (both inclusive, minute resolution). Ranges that wrap past midnight
//! (`end < start`) are never open. A tenant without a schedule is always
//! open; a schedule that cannot be read is always closed.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use handoff_core::types::{BusinessHours, Tenant};
use tracing::warn;

use crate::clock::Clock;

/// Parses an `HH:MM` local time.
fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Evaluates a schedule at `now`.
pub fn is_open_at(hours: Option<&BusinessHours>, now: DateTime<Utc>) -> bool {
    let Some(hours) = hours else {
        return true;
    };

    let tz: Tz = match hours.timezone.parse() {
        Ok(tz) => tz,
        Err(e) => {
            warn!(timezone = %hours.timezone, error = %e, "unknown business-hours timezone, treating as closed");
            return false;
        }
    };

    let local = now.with_timezone(&tz);
    let Some(day) = hours.day(local.weekday()) else {
        return false;
    };
    if !day.enabled {
        return false;
    }

    let (Some(start), Some(end)) = (parse_hhmm(&day.start), parse_hhmm(&day.end)) else {
        warn!(start = %day.start, end = %day.end, "unreadable business-hours range, treating as closed");
        return false;
    };
    if end < start {
        return false;
    }

    let Some(minute) = NaiveTime::from_hms_opt(local.hour(), local.minute(), 0) else {
        return false;
    };
    start <= minute && minute <= end
}

/// Answers "is this tenant open right now" against an injectable clock.
#[derive(Clone)]
pub struct BusinessHoursGate {
    clock: Arc<dyn Clock>,
}

impl BusinessHoursGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn is_open_now(&self, tenant: &Tenant) -> bool {
        is_open_at(tenant.business_hours.as_ref(), self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;
    use handoff_core::types::DaySchedule;
    use proptest::prelude::*;

    fn day(start: &str, end: &str) -> Option<DaySchedule> {
        Some(DaySchedule {
            enabled: true,
            start: start.into(),
            end: end.into(),
        })
    }

    fn monday_nine_to_six(timezone: &str) -> BusinessHours {
        BusinessHours {
            timezone: timezone.into(),
            monday: day("09:00", "18:00"),
            ..BusinessHours::default()
        }
    }

    /// 2026-01-05 is a Monday.
    fn monday_utc(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, hour, minute, 0).unwrap()
    }

    #[test]
    fn no_schedule_is_always_open() {
        assert!(is_open_at(None, monday_utc(3, 0)));
    }

    #[test]
    fn boundaries_are_inclusive() {
        let hours = monday_nine_to_six("UTC");
        assert!(!is_open_at(Some(&hours), monday_utc(8, 59)));
        assert!(is_open_at(Some(&hours), monday_utc(9, 0)));
        assert!(is_open_at(Some(&hours), monday_utc(17, 59)));
        assert!(is_open_at(Some(&hours), monday_utc(18, 0)));
        assert!(!is_open_at(Some(&hours), monday_utc(18, 1)));
    }

    #[test]
    fn seconds_inside_the_closing_minute_still_count() {
        let hours = monday_nine_to_six("UTC");
        let late = Utc.with_ymd_and_hms(2026, 1, 5, 18, 0, 59).unwrap();
        assert!(is_open_at(Some(&hours), late));
    }

    #[test]
    fn evaluated_in_tenant_timezone() {
        // Sao Paulo is UTC-3 all year.
        let hours = monday_nine_to_six("America/Sao_Paulo");
        assert!(!is_open_at(Some(&hours), monday_utc(11, 59)));
        assert!(is_open_at(Some(&hours), monday_utc(12, 0)));
        assert!(is_open_at(Some(&hours), monday_utc(20, 59)));
        assert!(!is_open_at(Some(&hours), monday_utc(21, 1)));
    }

    #[test]
    fn local_weekday_wins_over_utc_weekday() {
        // Monday 01:00 UTC is still Sunday evening in New York.
        let hours = BusinessHours {
            timezone: "America/New_York".into(),
            sunday: day("18:00", "23:00"),
            ..BusinessHours::default()
        };
        assert!(is_open_at(Some(&hours), monday_utc(1, 0)));
    }

    #[test]
    fn disabled_and_missing_days_are_closed() {
        let mut hours = monday_nine_to_six("UTC");
        hours.monday.as_mut().unwrap().enabled = false;
        assert!(!is_open_at(Some(&hours), monday_utc(12, 0)));

        let tuesday_noon = Utc.with_ymd_and_hms(2026, 1, 6, 12, 0, 0).unwrap();
        assert!(!is_open_at(Some(&monday_nine_to_six("UTC")), tuesday_noon));
    }

    #[test]
    fn unreadable_schedule_is_closed() {
        let bad_zone = monday_nine_to_six("Mars/Olympus_Mons");
        assert!(!is_open_at(Some(&bad_zone), monday_utc(12, 0)));

        let bad_time = BusinessHours {
            timezone: "UTC".into(),
            monday: day("9am", "18:00"),
            ..BusinessHours::default()
        };
        assert!(!is_open_at(Some(&bad_time), monday_utc(12, 0)));
    }

    #[test]
    fn gate_reads_the_injected_clock() {
        let clock = Arc::new(FixedClock::new(monday_utc(8, 59)));
        let gate = BusinessHoursGate::new(clock.clone());
        let tenant = Tenant {
            id: "t1".into(),
            name: "Acme".into(),
            support_email: None,
            business_hours: Some(monday_nine_to_six("UTC")),
            knowledge_base: None,
        };
        assert!(!gate.is_open_now(&tenant));
        clock.set(monday_utc(9, 0));
        assert!(gate.is_open_now(&tenant));
    }

    proptest! {
        #[test]
        fn open_exactly_inside_the_range(minute_of_day in 0u32..1440) {
            let hours = monday_nine_to_six("UTC");
            let now = monday_utc(minute_of_day / 60, minute_of_day % 60);
            let expected = (9 * 60..=18 * 60).contains(&minute_of_day);
            prop_assert_eq!(is_open_at(Some(&hours), now), expected);
        }

        #[test]
        fn overnight_ranges_never_open(
            start_hour in 13u32..24,
            end_hour in 0u32..12,
            minute_of_day in 0u32..1440,
        ) {
            let hours = BusinessHours {
                timezone: "UTC".into(),
                monday: day(&format!("{start_hour:02}:00"), &format!("{end_hour:02}:00")),
                ..BusinessHours::default()
            };
            let now = monday_utc(minute_of_day / 60, minute_of_day % 60);
            prop_assert!(!is_open_at(Some(&hours), now));
        }
    }
}
