use chrono::{NaiveDate, NaiveDateTime};

/// Format the CRM export writes timestamps in.
pub const PRIMARY_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%d.%m.%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const FALLBACK_DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d"];

/// Parses timestamp text. A configured format is tried first, then the
/// primary export format, then the fallbacks. Anything else is `None`.
#[derive(Debug, Clone, Default)]
pub struct DateParser {
    custom: Option<String>,
}

impl DateParser {
    pub fn new(custom: Option<String>) -> Self {
        Self {
            custom: custom.filter(|f| !f.trim().is_empty()),
        }
    }

    pub fn parse(&self, raw: &str) -> Option<NaiveDateTime> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        if let Some(fmt) = &self.custom {
            if let Some(dt) = parse_with(s, fmt) {
                return Some(dt);
            }
        }

        if let Ok(dt) = NaiveDateTime::parse_from_str(s, PRIMARY_FORMAT) {
            return Some(dt);
        }
        for fmt in FALLBACK_DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(dt);
            }
        }
        for fmt in FALLBACK_DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return d.and_hms_opt(0, 0, 0);
            }
        }
        None
    }
}

/// A custom format may describe a date without a time part.
fn parse_with(s: &str, fmt: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, fmt).ok().or_else(|| {
        NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

/// Render a timestamp the way the export writes it.
pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(PRIMARY_FORMAT).to_string()
}
