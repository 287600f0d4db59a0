//! When the cron trigger should actually send the daily report.

use chrono::{DateTime, FixedOffset, Timelike, Utc};

use crate::settings::EmailSettings;

/// Minutes either side of the configured send time that still count.
pub const SEND_WINDOW_MINUTES: u32 = 5;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Outcome of a cron tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronDecision {
    /// No settings file has been saved
    NotConfigured,
    /// Reports are switched off
    Disabled,
    /// Not within the send window; times are local `HH:MM`
    OutsideWindow { current: String, target: String },
    /// A report already went out this local day
    AlreadySent,
    /// Send now
    Send,
}

/// True if `now` is within the window around `target`, both minutes after
/// midnight. The window wraps across midnight.
pub fn within_window(now: u32, target: u32) -> bool {
    let diff = now.abs_diff(target);
    diff <= SEND_WINDOW_MINUTES || diff >= MINUTES_PER_DAY - SEND_WINDOW_MINUTES
}

/// True if `last_sent` falls on the same local calendar day as `now`.
pub fn sent_today(last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>, offset: FixedOffset) -> bool {
    last_sent.is_some_and(|sent| {
        sent.with_timezone(&offset).date_naive() == now.with_timezone(&offset).date_naive()
    })
}

pub fn decide(settings: Option<&EmailSettings>, now: DateTime<Utc>, offset: FixedOffset) -> CronDecision {
    let Some(settings) = settings else {
        return CronDecision::NotConfigured;
    };
    if !settings.enabled {
        return CronDecision::Disabled;
    }

    let local = now.with_timezone(&offset);
    let current_minutes = local.hour() * 60 + local.minute();
    let current = format!("{:02}:{:02}", local.hour(), local.minute());

    let Some(target) = settings.send_minutes() else {
        return CronDecision::OutsideWindow {
            current,
            target: settings.send_time.clone(),
        };
    };

    if !within_window(current_minutes, target) {
        return CronDecision::OutsideWindow {
            current,
            target: settings.send_time.clone(),
        };
    }

    if sent_today(settings.last_sent, now, offset) {
        return CronDecision::AlreadySent;
    }

    CronDecision::Send
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn settings(time: &str) -> EmailSettings {
        EmailSettings {
            enabled: true,
            email_addresses: vec!["ops@example.com".to_string()],
            send_time: time.to_string(),
            ..EmailSettings::default()
        }
    }

    /// UTC instant for a JST wall-clock time on 2025-05-10.
    fn at_jst(hour: u32, minute: u32) -> DateTime<Utc> {
        jst()
            .with_ymd_and_hms(2025, 5, 10, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_window_bounds() {
        assert!(within_window(540, 540));
        assert!(within_window(545, 540));
        assert!(within_window(535, 540));
        assert!(!within_window(546, 540));
        assert!(!within_window(534, 540));
    }

    #[test]
    fn test_window_wraps_midnight() {
        // 23:58 vs 00:02
        assert!(within_window(1438, 2));
        assert!(within_window(2, 1438));
        assert!(!within_window(1430, 2));
    }

    #[test]
    fn test_decide() {
        let s = settings("09:00");
        assert_eq!(decide(Some(&s), at_jst(9, 3), jst()), CronDecision::Send);
        assert_eq!(
            decide(Some(&s), at_jst(10, 0), jst()),
            CronDecision::OutsideWindow {
                current: "10:00".to_string(),
                target: "09:00".to_string()
            }
        );
        assert_eq!(decide(None, at_jst(9, 0), jst()), CronDecision::NotConfigured);

        let disabled = EmailSettings {
            enabled: false,
            ..settings("09:00")
        };
        assert_eq!(decide(Some(&disabled), at_jst(9, 0), jst()), CronDecision::Disabled);
    }

    #[test]
    fn test_once_per_local_day() {
        let mut s = settings("09:00");
        s.last_sent = Some(at_jst(8, 58));
        assert_eq!(decide(Some(&s), at_jst(9, 4), jst()), CronDecision::AlreadySent);

        // Sent yesterday.
        s.last_sent = Some(
            jst()
                .with_ymd_and_hms(2025, 5, 9, 9, 0, 0)
                .unwrap()
                .with_timezone(&Utc),
        );
        assert_eq!(decide(Some(&s), at_jst(9, 0), jst()), CronDecision::Send);
    }

    #[test]
    fn test_single_digit_hour() {
        let s = settings("7:05");
        assert_eq!(decide(Some(&s), at_jst(7, 9), jst()), CronDecision::Send);
    }
}
