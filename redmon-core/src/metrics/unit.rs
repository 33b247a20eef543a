use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// Unit tag attached to every metric.
///
/// The known variants mirror the unit strings the monitoring sink accepts.
/// `Raw` carries any unit text that did not match one of them so it can still
/// be forwarded unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MetricUnit {
    Seconds,
    Microseconds,
    Milliseconds,
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
    Bits,
    Kilobits,
    Megabits,
    Gigabits,
    Terabits,
    Percent,
    Count,
    BytesSecond,
    KilobytesSecond,
    MegabytesSecond,
    GigabytesSecond,
    TerabytesSecond,
    BitsSecond,
    KilobitsSecond,
    MegabitsSecond,
    GigabitsSecond,
    TerabitsSecond,
    CountSecond,
    #[default]
    None,
    Raw(String),
}

const KNOWN_UNITS: [MetricUnit; 27] = [
    MetricUnit::Seconds,
    MetricUnit::Microseconds,
    MetricUnit::Milliseconds,
    MetricUnit::Bytes,
    MetricUnit::Kilobytes,
    MetricUnit::Megabytes,
    MetricUnit::Gigabytes,
    MetricUnit::Terabytes,
    MetricUnit::Bits,
    MetricUnit::Kilobits,
    MetricUnit::Megabits,
    MetricUnit::Gigabits,
    MetricUnit::Terabits,
    MetricUnit::Percent,
    MetricUnit::Count,
    MetricUnit::BytesSecond,
    MetricUnit::KilobytesSecond,
    MetricUnit::MegabytesSecond,
    MetricUnit::GigabytesSecond,
    MetricUnit::TerabytesSecond,
    MetricUnit::BitsSecond,
    MetricUnit::KilobitsSecond,
    MetricUnit::MegabitsSecond,
    MetricUnit::GigabitsSecond,
    MetricUnit::TerabitsSecond,
    MetricUnit::CountSecond,
    MetricUnit::None,
];

impl MetricUnit {
    /// Resolves a unit from configuration text.
    ///
    /// Matching is case-insensitive on the trimmed text. Blank text means
    /// `None`; unrecognised text is passed through as `Raw` rather than
    /// rejected.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return MetricUnit::None;
        }

        KNOWN_UNITS
            .iter()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(trimmed))
            .cloned()
            .unwrap_or_else(|| MetricUnit::Raw(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            MetricUnit::Seconds => "Seconds",
            MetricUnit::Microseconds => "Microseconds",
            MetricUnit::Milliseconds => "Milliseconds",
            MetricUnit::Bytes => "Bytes",
            MetricUnit::Kilobytes => "Kilobytes",
            MetricUnit::Megabytes => "Megabytes",
            MetricUnit::Gigabytes => "Gigabytes",
            MetricUnit::Terabytes => "Terabytes",
            MetricUnit::Bits => "Bits",
            MetricUnit::Kilobits => "Kilobits",
            MetricUnit::Megabits => "Megabits",
            MetricUnit::Gigabits => "Gigabits",
            MetricUnit::Terabits => "Terabits",
            MetricUnit::Percent => "Percent",
            MetricUnit::Count => "Count",
            MetricUnit::BytesSecond => "Bytes/Second",
            MetricUnit::KilobytesSecond => "Kilobytes/Second",
            MetricUnit::MegabytesSecond => "Megabytes/Second",
            MetricUnit::GigabytesSecond => "Gigabytes/Second",
            MetricUnit::TerabytesSecond => "Terabytes/Second",
            MetricUnit::BitsSecond => "Bits/Second",
            MetricUnit::KilobitsSecond => "Kilobits/Second",
            MetricUnit::MegabitsSecond => "Megabits/Second",
            MetricUnit::GigabitsSecond => "Gigabits/Second",
            MetricUnit::TerabitsSecond => "Terabits/Second",
            MetricUnit::CountSecond => "Count/Second",
            MetricUnit::None => "None",
            MetricUnit::Raw(raw) => raw.as_str(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, MetricUnit::None)
    }
}

impl From<&str> for MetricUnit {
    fn from(raw: &str) -> Self {
        MetricUnit::normalize(raw)
    }
}

impl Display for MetricUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MetricUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_known_units() {
        assert_eq!(MetricUnit::normalize("Count"), MetricUnit::Count);
        assert_eq!(MetricUnit::normalize("  megabytes "), MetricUnit::Megabytes);
        assert_eq!(MetricUnit::normalize("bytes/second"), MetricUnit::BytesSecond);
        assert_eq!(MetricUnit::normalize("NONE"), MetricUnit::None);
    }

    #[test]
    fn test_normalize_blank_defaults_to_none() {
        assert_eq!(MetricUnit::normalize(""), MetricUnit::None);
        assert_eq!(MetricUnit::normalize("   "), MetricUnit::None);
    }

    #[test]
    fn test_unknown_unit_passes_through() {
        let unit = MetricUnit::normalize(" Widgets ");
        assert_eq!(unit, MetricUnit::Raw("Widgets".to_string()));
        assert_eq!(unit.to_string(), "Widgets");
        assert!(!unit.is_none());
    }
}
