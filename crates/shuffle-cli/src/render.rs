//! Text formatting for the now-playing display.

use chrono::NaiveDate;
use shuffle_core::catalog::VideoRecord;
use shuffle_core::session::NowPlaying;

pub const LOADING: &str = "Loading metadata...";

/// `YYYYMMDD` → `Jan 15, 2024`.
pub fn format_date(raw: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .ok()
        .map(|d| d.format("%b %d, %Y").to_string())
}

/// `1234567` → `1,234,567`.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `H:MM:SS`, or `M:SS` under an hour.
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Date, views and duration joined with ` • `; unknown parts are left out.
pub fn meta_line(video: &VideoRecord) -> String {
    let mut parts = Vec::with_capacity(3);
    if let Some(date) = video.upload_date.as_deref().and_then(format_date) {
        parts.push(date);
    }
    if video.view_count > 0 {
        parts.push(format!("{} views", format_count(video.view_count)));
    }
    if video.duration_seconds > 0 {
        parts.push(format_duration(video.duration_seconds));
    }
    if parts.is_empty() {
        LOADING.to_string()
    } else {
        parts.join(" • ")
    }
}

pub fn position_line(now: &NowPlaying<'_>) -> String {
    format!("{} / {}", now.position, now.history_len)
}

/// The three-line block printed after every navigation.
pub fn now_playing(now: &NowPlaying<'_>) -> String {
    format!(
        "{}\n  {}\n  [{}]",
        now.video.title,
        meta_line(now.video),
        position_line(now)
    )
}
