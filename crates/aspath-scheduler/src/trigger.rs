//! Trigger — maps a schedule to its next fire time.

use chrono::{DateTime, Days, NaiveTime, Utc};

use aspath_state::CronSchedule;

pub trait Trigger {
    /// First fire time strictly after `after`.
    fn next_fire_after(&self, after: DateTime<Utc>) -> DateTime<Utc>;

    /// Whether a fire is due at `now` given the previous reference point.
    fn is_due(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.next_fire_after(since) <= now
    }
}

impl Trigger for CronSchedule {
    fn next_fire_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        // Entries added outside the reconciler are not range-checked.
        let hour = u32::from(self.hour.min(23));
        let minute = u32::from(self.minute.min(59));
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
        let today = after.date_naive().and_time(time).and_utc();
        if today > after {
            today
        } else {
            today
                .checked_add_days(Days::new(1))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        }
    }
}
