use chrono::{DateTime, Datelike, NaiveDate, Timelike};
use chrono_tz::Tz;

/// Wall-clock view of a unix timestamp in one timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalStamp {
    pub date: NaiveDate,
    pub minute_of_day: u32,
}

impl LocalStamp {
    pub fn year_month(&self) -> (i32, u32) {
        (self.date.year(), self.date.month())
    }
}

/// Converts unix seconds to local calendar time using the tz database, so
/// DST transitions shift the wall clock correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalCalendar {
    tz: Tz,
}

impl LocalCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// `None` when `ts` is outside chrono's representable range.
    pub fn local(&self, ts: i64) -> Option<LocalStamp> {
        let local = DateTime::from_timestamp(ts, 0)?.with_timezone(&self.tz);
        Some(LocalStamp {
            date: local.date_naive(),
            minute_of_day: local.hour() * 60 + local.minute(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    #[test]
    fn local_follows_dst() {
        let calendar = LocalCalendar::new(New_York);

        // 09:30 EST (UTC-5) in January, 09:30 EDT (UTC-4) in July
        let winter = New_York.with_ymd_and_hms(2024, 1, 10, 9, 30, 0).unwrap();
        let summer = New_York.with_ymd_and_hms(2024, 7, 10, 9, 30, 0).unwrap();

        let w = calendar.local(winter.timestamp()).unwrap();
        let s = calendar.local(summer.timestamp()).unwrap();
        assert_eq!(w.minute_of_day, 9 * 60 + 30);
        assert_eq!(s.minute_of_day, 9 * 60 + 30);
        assert_eq!(w.date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(s.year_month(), (2024, 7));
    }

    #[test]
    fn local_date_differs_from_utc_date() {
        let calendar = LocalCalendar::new(New_York);
        // 2024-03-01 02:00 UTC is still Feb 29 in New York
        let ts = chrono::Utc
            .with_ymd_and_hms(2024, 3, 1, 2, 0, 0)
            .unwrap()
            .timestamp();
        let stamp = calendar.local(ts).unwrap();
        assert_eq!(stamp.year_month(), (2024, 2));
        assert_eq!(stamp.minute_of_day, 21 * 60);
    }

    #[test]
    fn out_of_range_timestamp_is_none() {
        let calendar = LocalCalendar::new(New_York);
        assert!(calendar.local(i64::MAX).is_none());
    }
}
