//! Time-range selection and resolution
//!
//! Every consumer of a time window (views, reports, CLI, simulator) resolves
//! symbolic selectors through this one pure function instead of carrying its
//! own "latest 24h" arithmetic. Resolution never touches fetched data: same
//! inputs, same bounds.

use crate::error::{Result, SensorViewError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Symbolic window length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangePreset {
    /// Last hour
    LastHour,
    /// Last 24 hours
    LastDay,
    /// Last 7 days (legacy wire alias `1w`)
    LastWeek,
    /// Last 30 days (legacy wire alias `1m`)
    LastMonth,
    /// Entire history, no bounds
    All,
}

impl RangePreset {
    /// Parse a wire/CLI selector. Legacy aliases from the original query
    /// enum (`1w`, `1m`) are accepted; `latest24h` is handled one level up
    /// because it also fixes the anchor.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "1h" => Ok(Self::LastHour),
            "24h" => Ok(Self::LastDay),
            "7d" | "1w" => Ok(Self::LastWeek),
            "30d" | "1m" => Ok(Self::LastMonth),
            "all" => Ok(Self::All),
            other => Err(SensorViewError::parsing(format!(
                "unknown range preset '{other}' (expected 1h, 24h, 7d, 30d or all)"
            ))),
        }
    }

    /// Canonical wire spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastHour => "1h",
            Self::LastDay => "24h",
            Self::LastWeek => "7d",
            Self::LastMonth => "30d",
            Self::All => "all",
        }
    }

    /// Window length, None for `all`
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::LastHour => Some(Duration::hours(1)),
            Self::LastDay => Some(Duration::hours(24)),
            Self::LastWeek => Some(Duration::days(7)),
            Self::LastMonth => Some(Duration::days(30)),
            Self::All => None,
        }
    }
}

impl std::fmt::Display for RangePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the window end is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeAnchor {
    /// End at current wall-clock time
    FromNow,
    /// End at the newest available reading timestamp
    FromData,
}

/// A symbolic window: preset length plus anchor toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSelector {
    pub preset: RangePreset,
    pub anchor: RangeAnchor,
}

impl Default for RangeSelector {
    /// The backend's historical default window, `latest24h`
    fn default() -> Self {
        Self {
            preset: RangePreset::LastDay,
            anchor: RangeAnchor::FromData,
        }
    }
}

impl RangeSelector {
    pub fn new(preset: RangePreset, anchor: RangeAnchor) -> Self {
        Self { preset, anchor }
    }

    /// Interpret the wire pair (`range`, `fromNow`) the way the original
    /// backend did: `latest24h` is 24h anchored to data and ignores the
    /// toggle; every other preset defaults to wall-clock anchoring.
    pub fn from_wire(range: &str, from_now: Option<bool>) -> Result<Self> {
        if range.trim() == "latest24h" {
            return Ok(Self::new(RangePreset::LastDay, RangeAnchor::FromData));
        }
        let preset = RangePreset::parse(range)?;
        let anchor = match from_now {
            Some(false) => RangeAnchor::FromData,
            _ => RangeAnchor::FromNow,
        };
        Ok(Self::new(preset, anchor))
    }

    /// Resolve to concrete bounds.
    ///
    /// `latest` is the newest reading timestamp known for the subject (node
    /// or sensor); it is only consulted for `FromData` anchoring. A data
    /// anchor with no data yields [`ResolvedRange::Empty`].
    pub fn resolve(&self, now: DateTime<Utc>, latest: Option<DateTime<Utc>>) -> ResolvedRange {
        let duration = match self.preset.duration() {
            Some(d) => d,
            None => return ResolvedRange::Unbounded,
        };
        let end = match self.anchor {
            RangeAnchor::FromNow => now,
            RangeAnchor::FromData => match latest {
                Some(ts) => ts,
                None => return ResolvedRange::Empty,
            },
        };
        ResolvedRange::Window {
            start: end - duration,
            end,
        }
    }
}

impl std::fmt::Display for RangeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.anchor {
            RangeAnchor::FromNow => write!(f, "{}", self.preset),
            RangeAnchor::FromData => write!(f, "{} (from data)", self.preset),
        }
    }
}

/// Concrete timestamp bounds produced by resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedRange {
    /// No bounds, fetch everything
    Unbounded,
    /// Inclusive window
    Window {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Data-anchored selector with no data; callers surface an empty result
    Empty,
}

impl ResolvedRange {
    /// Explicit bounds, e.g. from report CLI flags
    pub fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::Window { start, end }
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Window { start, .. } => Some(*start),
            _ => None,
        }
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Window { end, .. } => Some(*end),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Bound check, inclusive at both ends
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Empty => false,
            Self::Window { start, end } => ts >= *start && ts <= *end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, 0).unwrap()
    }

    #[rstest]
    #[case("1h", RangePreset::LastHour)]
    #[case("24h", RangePreset::LastDay)]
    #[case("7d", RangePreset::LastWeek)]
    #[case("1w", RangePreset::LastWeek)]
    #[case("30d", RangePreset::LastMonth)]
    #[case("1m", RangePreset::LastMonth)]
    #[case("all", RangePreset::All)]
    fn test_preset_parse(#[case] wire: &str, #[case] expected: RangePreset) {
        assert_eq!(RangePreset::parse(wire).unwrap(), expected);
    }

    #[test]
    fn test_preset_parse_rejects_unknown() {
        let err = RangePreset::parse("48h").unwrap_err();
        assert!(err.to_string().contains("unknown range preset"));
    }

    #[test]
    fn test_latest24h_wire_value_fixes_anchor() {
        let sel = RangeSelector::from_wire("latest24h", None).unwrap();
        assert_eq!(sel.preset, RangePreset::LastDay);
        assert_eq!(sel.anchor, RangeAnchor::FromData);

        // The toggle is meaningless for latest24h and gets ignored
        let sel = RangeSelector::from_wire("latest24h", Some(true)).unwrap();
        assert_eq!(sel.anchor, RangeAnchor::FromData);
    }

    #[test]
    fn test_plain_presets_default_to_wall_clock() {
        let sel = RangeSelector::from_wire("7d", None).unwrap();
        assert_eq!(sel.anchor, RangeAnchor::FromNow);

        let sel = RangeSelector::from_wire("7d", Some(false)).unwrap();
        assert_eq!(sel.anchor, RangeAnchor::FromData);
    }

    #[test]
    fn test_resolve_from_now() {
        let now = at(10, 0);
        let sel = RangeSelector::new(RangePreset::LastHour, RangeAnchor::FromNow);
        let resolved = sel.resolve(now, Some(at(9, 30)));
        assert_eq!(resolved, ResolvedRange::window(at(9, 0), at(10, 0)));
    }

    #[test]
    fn test_resolve_from_data_anchors_at_latest_reading() {
        let now = at(10, 0);
        let sel = RangeSelector::new(RangePreset::LastHour, RangeAnchor::FromData);
        let resolved = sel.resolve(now, Some(at(8, 15)));
        assert_eq!(resolved, ResolvedRange::window(at(7, 15), at(8, 15)));
    }

    #[test]
    fn test_resolve_from_data_without_data_is_empty() {
        let sel = RangeSelector::default();
        let resolved = sel.resolve(at(10, 0), None);
        assert!(resolved.is_empty());
        assert!(!resolved.contains(at(9, 0)));
    }

    #[test]
    fn test_resolve_all_ignores_anchor() {
        let sel = RangeSelector::new(RangePreset::All, RangeAnchor::FromData);
        assert_eq!(sel.resolve(at(10, 0), None), ResolvedRange::Unbounded);
        assert!(ResolvedRange::Unbounded.contains(at(0, 1)));
    }

    #[test]
    fn test_resolution_is_pure() {
        let sel = RangeSelector::new(RangePreset::LastDay, RangeAnchor::FromData);
        let a = sel.resolve(at(10, 0), Some(at(9, 0)));
        let b = sel.resolve(at(11, 30), Some(at(9, 0)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let w = ResolvedRange::window(at(9, 0), at(10, 0));
        assert!(w.contains(at(9, 0)));
        assert!(w.contains(at(10, 0)));
        assert!(!w.contains(at(10, 1)));
        assert!(!w.contains(at(8, 59)));
    }
}
