//! Arabic relative timestamps ("منذ 3 ساعة").

use chrono::{DateTime, Utc};

/// Describe how long ago `created` was, relative to `now`.
#[must_use]
pub fn time_ago(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created);
    let days = elapsed.num_days();
    let seconds = elapsed.num_seconds() - days * 86_400;

    if days > 0 {
        format!("منذ {days} يوم")
    } else if seconds > 3600 {
        format!("منذ {} ساعة", seconds / 3600)
    } else if seconds > 60 {
        format!("منذ {} دقيقة", seconds / 60)
    } else {
        "منذ لحظات".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_time_ago_units() {
        let now = Utc::now();
        assert_eq!(time_ago(now - Duration::days(2), now), "منذ 2 يوم");
        assert_eq!(time_ago(now - Duration::hours(5), now), "منذ 5 ساعة");
        assert_eq!(time_ago(now - Duration::minutes(7), now), "منذ 7 دقيقة");
        assert_eq!(time_ago(now - Duration::seconds(30), now), "منذ لحظات");
    }

    #[test]
    fn test_time_ago_exact_hour_reports_minutes() {
        let now = Utc::now();
        assert_eq!(time_ago(now - Duration::seconds(3600), now), "منذ 60 دقيقة");
    }
}
