use chrono::Days;

use crate::anchor::AnchorConfig;
use crate::anchor::calendar::{LocalCalendar, LocalStamp};
use crate::model::AnchorType;

/// Gap that starts a new `week` period: 4 days of raw elapsed time.
///
/// This is a gap heuristic, not a calendar week. Short holiday weeks can
/// misfire.
pub const WEEK_GAP_SECS: i64 = 4 * 24 * 60 * 60;

/// Decides whether a bar opens a new anchor period relative to its
/// predecessor.
#[derive(Debug, Clone)]
pub struct AnchorDetector {
    calendar: LocalCalendar,
    anchor_type: AnchorType,
    anchor_minutes: u32,
}

impl AnchorDetector {
    pub fn new(config: &AnchorConfig) -> Self {
        Self {
            calendar: LocalCalendar::new(config.timezone),
            anchor_type: config.anchor_type,
            anchor_minutes: config.anchor_minutes,
        }
    }

    /// `true` when the bar at `curr` starts a new period after the bar at
    /// `prev`. Timestamps outside the calendar's range always reset.
    pub fn is_new_period(&self, prev: i64, curr: i64) -> bool {
        match self.anchor_type {
            AnchorType::Week => curr.saturating_sub(prev) > WEEK_GAP_SECS,
            AnchorType::Session | AnchorType::Rth => self.local_pair(prev, curr).is_none_or(
                |(p, c)| self.session_boundary(p, c),
            ),
            AnchorType::Month => self
                .local_pair(prev, curr)
                .is_none_or(|(p, c)| p.year_month() != c.year_month()),
        }
    }

    fn local_pair(&self, prev: i64, curr: i64) -> Option<(LocalStamp, LocalStamp)> {
        Some((self.calendar.local(prev)?, self.calendar.local(curr)?))
    }

    fn session_boundary(&self, prev: LocalStamp, curr: LocalStamp) -> bool {
        if prev.date == curr.date {
            return prev.minute_of_day < self.anchor_minutes
                && self.anchor_minutes <= curr.minute_of_day;
        }
        self.session_date(prev) != self.session_date(curr)
    }

    /// Date of the session a local time belongs to: times before the anchor
    /// belong to the previous day's session.
    fn session_date(&self, stamp: LocalStamp) -> chrono::NaiveDate {
        if stamp.minute_of_day < self.anchor_minutes {
            stamp
                .date
                .checked_sub_days(Days::new(1))
                .unwrap_or(stamp.date)
        } else {
            stamp.date
        }
    }
}
