use chrono::{DateTime, TimeZone};

/// Compact age of `then` as seen from `now`: `42s`, `5m`, `3h`, `12d`.
pub fn relative_age<A: TimeZone, B: TimeZone>(then: &DateTime<A>, now: &DateTime<B>) -> String {
    let diff = now.clone().signed_duration_since(then.clone());
    let seconds = diff.num_seconds().max(0);
    match seconds {
        s if s < 60 => format!("{s}s"),
        s if s < 60 * 60 => format!("{}m", s / 60),
        s if s < 24 * 60 * 60 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86_400),
    }
}
