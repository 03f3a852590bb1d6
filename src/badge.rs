//! Badge values (label, message, color) for status, uptime, ping and response badges.
//!
//! Rendering to SVG is left to the client; this module only decides what a
//! badge says.

use serde::{Deserialize, Serialize};

use crate::db::Status;
use crate::error::{Error, Result};
use crate::uptime::UptimeData;

pub const NA_COLOR: &str = "#999";
pub const DEFAULT_UP_COLOR: &str = "#66c20a";
pub const DEFAULT_DOWN_COLOR: &str = "#c2290a";
pub const DEFAULT_PENDING_COLOR: &str = "#f8a306";
pub const DEFAULT_MAINTENANCE_COLOR: &str = "#1747f5";
pub const DEFAULT_PING_COLOR: &str = "blue";
pub const DEFAULT_STYLE: &str = "flat";

const STYLES: &[&str] = &["flat", "flat-square", "plastic", "for-the-badge", "social"];

/// Every recognized badge option. Missing fields take the documented defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BadgeOptions {
    /// Replaces the generated label.
    pub label: Option<String>,
    pub label_prefix: Option<String>,
    /// Unit shown after the duration in uptime/ping labels (defaults to the token's unit).
    pub label_suffix: Option<String>,
    pub prefix: Option<String>,
    /// Defaults to "%" for uptime and "ms" for ping badges.
    pub suffix: Option<String>,
    /// Fixed message color. Uptime badges otherwise derive it from the percentage.
    pub color: Option<String>,
    pub label_color: Option<String>,
    pub style: String,
    pub up_label: String,
    pub down_label: String,
    pub pending_label: String,
    pub maintenance_label: String,
    pub up_color: String,
    pub down_color: String,
    pub pending_color: String,
    pub maintenance_color: String,
}

impl Default for BadgeOptions {
    fn default() -> Self {
        Self {
            label: None,
            label_prefix: None,
            label_suffix: None,
            prefix: None,
            suffix: None,
            color: None,
            label_color: None,
            style: DEFAULT_STYLE.to_string(),
            up_label: "Up".to_string(),
            down_label: "Down".to_string(),
            pending_label: "Pending".to_string(),
            maintenance_label: "Maintenance".to_string(),
            up_color: DEFAULT_UP_COLOR.to_string(),
            down_color: DEFAULT_DOWN_COLOR.to_string(),
            pending_color: DEFAULT_PENDING_COLOR.to_string(),
            maintenance_color: DEFAULT_MAINTENANCE_COLOR.to_string(),
        }
    }
}

impl BadgeOptions {
    /// Reject options no renderer could honor.
    pub fn validate(self) -> Result<Self> {
        if !STYLES.contains(&self.style.as_str()) {
            return Err(Error::InvalidInput(format!("unknown badge style: {}", self.style)));
        }
        let colors = [
            &self.up_color,
            &self.down_color,
            &self.pending_color,
            &self.maintenance_color,
        ];
        if colors.iter().any(|c| c.trim().is_empty()) {
            return Err(Error::InvalidInput("badge colors must not be empty".to_string()));
        }
        Ok(self)
    }
}

/// What a badge displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadgeValues {
    pub label: String,
    pub message: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_color: Option<String>,
    pub style: String,
}

impl BadgeValues {
    fn not_available(opts: &BadgeOptions, label: String) -> Self {
        Self {
            label,
            message: "N/A".to_string(),
            color: NA_COLOR.to_string(),
            label_color: None,
            style: opts.style.clone(),
        }
    }
}

/// Badge for the latest known status.
pub fn status_badge(opts: &BadgeOptions, latest: Option<Status>) -> BadgeValues {
    let label = opts.label.clone().unwrap_or_else(|| "Status".to_string());
    let (message, color) = match latest {
        Some(Status::Up) => (&opts.up_label, &opts.up_color),
        Some(Status::Down) => (&opts.down_label, &opts.down_color),
        Some(Status::Pending) => (&opts.pending_label, &opts.pending_color),
        Some(Status::Maintenance) => (&opts.maintenance_label, &opts.maintenance_color),
        None => return BadgeValues::not_available(opts, label),
    };
    BadgeValues {
        label,
        message: message.clone(),
        color: color.clone(),
        label_color: opts.label_color.clone(),
        style: opts.style.clone(),
    }
}

/// Badge for the uptime over a duration token such as "24h".
pub fn uptime_badge(opts: &BadgeOptions, token: &str, data: Result<UptimeData>) -> BadgeValues {
    let label = join(&[
        opts.label_prefix.as_deref(),
        Some(&opts.label.clone().unwrap_or_else(|| format!("Uptime ({})", duration_label(opts, token)))),
    ]);

    let Ok(data) = data else {
        return BadgeValues::not_available(opts, label);
    };

    let percent = to_precision(data.uptime * 100.0, 4);
    BadgeValues {
        label,
        message: join(&[
            opts.prefix.as_deref(),
            Some(&percent),
            Some(opts.suffix.as_deref().unwrap_or("%")),
        ]),
        color: opts.color.clone().unwrap_or_else(|| percentage_to_color(data.uptime)),
        label_color: opts.label_color.clone(),
        style: opts.style.clone(),
    }
}

/// Badge for the average ping over a duration token.
pub fn ping_badge(opts: &BadgeOptions, token: &str, avg_ping: Option<f64>) -> BadgeValues {
    millis_badge(opts, format!("Avg. Ping ({})", duration_label(opts, token)), avg_ping)
}

/// Ping of the monitor's most recent heartbeat.
pub fn response_badge(opts: &BadgeOptions, ping: Option<f64>) -> BadgeValues {
    millis_badge(opts, "Response".to_string(), ping)
}

pub fn avg_response_badge(opts: &BadgeOptions, token: &str, avg_ping: Option<f64>) -> BadgeValues {
    millis_badge(opts, format!("Avg. Response ({})", duration_label(opts, token)), avg_ping)
}

/// Whole milliseconds, "ms" suffix unless overridden.
fn millis_badge(opts: &BadgeOptions, default_label: String, value: Option<f64>) -> BadgeValues {
    let label = join(&[
        opts.label_prefix.as_deref(),
        Some(opts.label.as_deref().unwrap_or(&default_label)),
    ]);

    let Some(ms) = value else {
        return BadgeValues::not_available(opts, label);
    };

    BadgeValues {
        label,
        message: join(&[
            opts.prefix.as_deref(),
            Some(&(ms.round() as i64).to_string()),
            Some(opts.suffix.as_deref().unwrap_or("ms")),
        ]),
        color: opts.color.clone().unwrap_or_else(|| DEFAULT_PING_COLOR.to_string()),
        label_color: opts.label_color.clone(),
        style: opts.style.clone(),
    }
}

/// "24h" stays "24h"; a label suffix replaces the unit.
fn duration_label(opts: &BadgeOptions, token: &str) -> String {
    match &opts.label_suffix {
        Some(suffix) => {
            let number = token.trim_end_matches(|c: char| c.is_ascii_alphabetic());
            format!("{}{}", number, suffix)
        }
        None => token.to_string(),
    }
}

fn join(parts: &[Option<&str>]) -> String {
    parts.iter().flatten().filter(|p| !p.is_empty()).copied().collect()
}

/// Format with `digits` significant digits.
fn to_precision(value: f64, digits: i32) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{:.*}", (digits - 1).max(0) as usize, 0.0);
    }
    let decimals = |v: f64| (digits - (v.abs().log10().floor() as i32 + 1)).max(0) as usize;
    // Rounding can carry into a new digit (99.996 -> 100.00), so size the result again.
    let rounded: f64 = format!("{:.*}", decimals(value), value).parse().unwrap_or(value);
    format!("{:.*}", decimals(rounded), rounded)
}

/// Red (0) through green (1) for an uptime ratio.
pub fn percentage_to_color(ratio: f64) -> String {
    const MAX_HUE: f64 = 90.0;
    const MIN_HUE: f64 = 10.0;
    let hue = ratio.clamp(0.0, 1.0) * (MAX_HUE - MIN_HUE) + MIN_HUE;
    hsl_to_hex(hue, 0.9, 0.4)
}

fn hsl_to_hex(hue: f64, saturation: f64, lightness: f64) -> String {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let h = hue / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    let to_byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", to_byte(r), to_byte(g), to_byte(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(uptime: f64) -> Result<UptimeData> {
        Ok(UptimeData {
            uptime,
            avg_ping: None,
            up_seconds: uptime * 100.0,
            down_seconds: (1.0 - uptime) * 100.0,
            maintenance_seconds: 0.0,
        })
    }

    #[test]
    fn test_status_badge() {
        let opts = BadgeOptions::default();
        let badge = status_badge(&opts, Some(Status::Down));
        assert_eq!(badge.label, "Status");
        assert_eq!(badge.message, "Down");
        assert_eq!(badge.color, DEFAULT_DOWN_COLOR);

        let na = status_badge(&opts, None);
        assert_eq!(na.message, "N/A");
        assert_eq!(na.color, NA_COLOR);
    }

    #[test]
    fn test_uptime_badge() {
        let opts = BadgeOptions::default();
        let badge = uptime_badge(&opts, "24h", data(0.995));
        assert_eq!(badge.label, "Uptime (24h)");
        assert_eq!(badge.message, "99.50%");

        let full = uptime_badge(&opts, "30d", data(1.0));
        assert_eq!(full.label, "Uptime (30d)");
        assert_eq!(full.message, "100.0%");
        assert_eq!(full.color, percentage_to_color(1.0));
    }

    #[test]
    fn test_uptime_rounding_up_to_full() {
        let badge = uptime_badge(&BadgeOptions::default(), "24h", data(0.99996));
        assert_eq!(badge.message, "100.0%");

        let nearly = uptime_badge(&BadgeOptions::default(), "24h", data(0.9994));
        assert_eq!(nearly.message, "99.94%");
        assert_eq!(to_precision(9.9996, 4), "10.00");
    }

    #[test]
    fn test_response_badges() {
        let opts = BadgeOptions::default();
        let badge = response_badge(&opts, Some(87.4));
        assert_eq!(badge.label, "Response");
        assert_eq!(badge.message, "87ms");
        assert_eq!(badge.color, DEFAULT_PING_COLOR);

        let na = response_badge(&opts, None);
        assert_eq!(na.message, "N/A");
        assert_eq!(na.color, NA_COLOR);

        let avg = avg_response_badge(&opts, "7d", Some(250.5));
        assert_eq!(avg.label, "Avg. Response (7d)");
        assert_eq!(avg.message, "251ms");

        let custom = BadgeOptions {
            label: Some("Latency".to_string()),
            suffix: Some(" ms".to_string()),
            ..Default::default()
        };
        let badge = avg_response_badge(&custom, "24h", Some(10.0));
        assert_eq!(badge.label, "Latency");
        assert_eq!(badge.message, "10 ms");
    }

    #[test]
    fn test_no_data_is_not_zero_percent() {
        let badge = uptime_badge(&BadgeOptions::default(), "24h", Err(Error::NoData));
        assert_eq!(badge.message, "N/A");
        assert_eq!(badge.color, NA_COLOR);

        let zero = uptime_badge(&BadgeOptions::default(), "24h", data(0.0));
        assert_eq!(zero.message, "0.000%");
    }

    #[test]
    fn test_ping_badge_with_overrides() {
        let opts = BadgeOptions {
            label_prefix: Some("API ".to_string()),
            label_suffix: Some(" hours".to_string()),
            prefix: Some("~".to_string()),
            color: Some("green".to_string()),
            ..Default::default()
        };
        let badge = ping_badge(&opts, "24h", Some(123.6));
        assert_eq!(badge.label, "API Avg. Ping (24 hours)");
        assert_eq!(badge.message, "~124ms");
        assert_eq!(badge.color, "green");

        assert_eq!(ping_badge(&opts, "24h", None).message, "N/A");
    }

    #[test]
    fn test_validate() {
        assert!(BadgeOptions::default().validate().is_ok());
        let bad = BadgeOptions {
            style: "neon".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_percentage_to_color_ends() {
        // hue 10 at 0%, hue 90 at 100%
        assert_eq!(percentage_to_color(0.0), "#c2290a");
        assert_eq!(percentage_to_color(1.0), "#66c20a");
    }
}
