use chrono::{DateTime, Datelike, Utc};
use std::fmt;
use std::str::FromStr;

/// Which calendar granularity the deployment reviews on. Fixed per
/// installation via `REVIEW_PERIOD_MODE`; the period key itself carries the
/// granularity so historical rows stay readable either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeriodMode {
    Quarter,
    Month,
}

impl PeriodMode {
    pub fn parse(raw: &str) -> Option<PeriodMode> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "quarter" | "quarterly" => Some(PeriodMode::Quarter),
            "month" | "monthly" => Some(PeriodMode::Month),
            _ => None,
        }
    }
}

/// A review cycle key, rendered `"Q<n> <year>"` or `"M<n> <year>"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PeriodKey {
    Quarter { quarter: u8, year: i32 },
    Month { month: u8, year: i32 },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid period key")]
pub struct ParsePeriodError;

impl PeriodKey {
    /// Period containing `now` under the given mode. Months 1-3 map to Q1,
    /// 4-6 to Q2, 7-9 to Q3, 10-12 to Q4.
    pub fn current(mode: PeriodMode, now: DateTime<Utc>) -> PeriodKey {
        let month = now.month() as u8;
        let year = now.year();
        match mode {
            PeriodMode::Quarter => PeriodKey::Quarter {
                quarter: (month - 1) / 3 + 1,
                year,
            },
            PeriodMode::Month => PeriodKey::Month { month, year },
        }
    }

    pub fn previous(&self) -> PeriodKey {
        match *self {
            PeriodKey::Quarter { quarter: 1, year } => PeriodKey::Quarter {
                quarter: 4,
                year: year - 1,
            },
            PeriodKey::Quarter { quarter, year } => PeriodKey::Quarter {
                quarter: quarter - 1,
                year,
            },
            PeriodKey::Month { month: 1, year } => PeriodKey::Month {
                month: 12,
                year: year - 1,
            },
            PeriodKey::Month { month, year } => PeriodKey::Month {
                month: month - 1,
                year,
            },
        }
    }

    /// The `n` most recent periods ending at `self`, oldest first. Used for
    /// trend charts.
    pub fn last_n(&self, n: usize) -> Vec<PeriodKey> {
        let mut keys = Vec::with_capacity(n);
        let mut cursor = *self;
        for _ in 0..n {
            keys.push(cursor);
            cursor = cursor.previous();
        }
        keys.reverse();
        keys
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Quarter { quarter, year } => write!(f, "Q{} {}", quarter, year),
            PeriodKey::Month { month, year } => write!(f, "M{} {}", month, year),
        }
    }
}

impl FromStr for PeriodKey {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (kind, rest) = if let Some(rest) = trimmed.strip_prefix('Q') {
            ("Q", rest)
        } else if let Some(rest) = trimmed.strip_prefix('M') {
            ("M", rest)
        } else {
            return Err(ParsePeriodError);
        };
        let (index, year) = rest.split_once(' ').ok_or(ParsePeriodError)?;
        let index: u8 = index.parse().map_err(|_| ParsePeriodError)?;
        let year: i32 = year.trim().parse().map_err(|_| ParsePeriodError)?;
        if !(1000..=9999).contains(&year) {
            return Err(ParsePeriodError);
        }
        match kind {
            "Q" if (1..=4).contains(&index) => Ok(PeriodKey::Quarter {
                quarter: index,
                year,
            }),
            "M" if (1..=12).contains(&index) => Ok(PeriodKey::Month { month: index, year }),
            _ => Err(ParsePeriodError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(year: i32, month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn months_map_to_quarters() {
        let cases = [
            (1, 1),
            (2, 1),
            (3, 1),
            (4, 2),
            (6, 2),
            (7, 3),
            (9, 3),
            (10, 4),
            (12, 4),
        ];
        for (month, quarter) in cases {
            let key = PeriodKey::current(PeriodMode::Quarter, at(2025, month));
            assert_eq!(
                key,
                PeriodKey::Quarter {
                    quarter,
                    year: 2025
                },
                "month {}",
                month
            );
        }
    }

    #[test]
    fn month_mode_maps_directly() {
        let key = PeriodKey::current(PeriodMode::Month, at(2025, 7));
        assert_eq!(key, PeriodKey::Month { month: 7, year: 2025 });
        assert_eq!(key.to_string(), "M7 2025");
    }

    #[test]
    fn display_parse_round_trip() {
        for raw in ["Q1 2025", "Q4 1999", "M1 2025", "M12 2030"] {
            let key: PeriodKey = raw.parse().unwrap();
            assert_eq!(key.to_string(), raw);
        }
    }

    #[test]
    fn rejects_malformed_keys() {
        for raw in ["", "Q5 2025", "M0 2025", "M13 2025", "X1 2025", "Q1", "Q1 25"] {
            assert!(raw.parse::<PeriodKey>().is_err(), "{:?}", raw);
        }
    }

    #[test]
    fn previous_wraps_year_boundary() {
        let q1: PeriodKey = "Q1 2025".parse().unwrap();
        assert_eq!(q1.previous().to_string(), "Q4 2024");
        let m1: PeriodKey = "M1 2025".parse().unwrap();
        assert_eq!(m1.previous().to_string(), "M12 2024");
    }

    #[test]
    fn last_n_is_oldest_first() {
        let key: PeriodKey = "Q2 2025".parse().unwrap();
        let keys: Vec<String> = key.last_n(4).iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["Q3 2024", "Q4 2024", "Q1 2025", "Q2 2025"]);
    }
}
