use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Day of the week a reservation recurs on.
///
/// Index 0 = Monday … 6 = Sunday, matching chrono's `num_days_from_monday`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// 0 = Monday … 6 = Sunday.
    pub fn index(self) -> u8 {
        match self {
            Weekday::Monday => 0,
            Weekday::Tuesday => 1,
            Weekday::Wednesday => 2,
            Weekday::Thursday => 3,
            Weekday::Friday => 4,
            Weekday::Saturday => 5,
            Weekday::Sunday => 6,
        }
    }

    /// Inverse of [`Weekday::index`]; `idx` is taken modulo 7.
    pub fn from_index(idx: u8) -> Weekday {
        Weekday::ALL[(idx % 7) as usize]
    }

    /// The day before, wrapping Monday → Sunday. Booking windows open one day
    /// ahead of the class, so triggers are armed on `class_day.prev()`.
    pub fn prev(self) -> Weekday {
        Weekday::from_index(self.index() + 6)
    }
}

impl std::fmt::Display for Weekday {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
            Weekday::Sunday => "sunday",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Weekday {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monday" => Ok(Weekday::Monday),
            "tuesday" => Ok(Weekday::Tuesday),
            "wednesday" => Ok(Weekday::Wednesday),
            "thursday" => Ok(Weekday::Thursday),
            "friday" => Ok(Weekday::Friday),
            "saturday" => Ok(Weekday::Saturday),
            "sunday" => Ok(Weekday::Sunday),
            other => Err(CoreError::InvalidWeekday(other.to_string())),
        }
    }
}

/// Wall-clock time of a class, minute precision.
///
/// Parsed from the `"HH:MM"` form used by the API and stored as the same
/// string in SQLite. Hour and minute are range-checked at parse time, so the
/// rest of the codebase can treat a `ClassTime` as always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassTime {
    pub hour: u8,
    pub minute: u8,
}

impl ClassTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, CoreError> {
        if hour > 23 || minute > 59 {
            return Err(CoreError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(ClassTime { hour, minute })
    }
}

impl std::fmt::Display for ClassTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl std::str::FromStr for ClassTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidTime(s.to_string()))?;
        let hour: u8 = h
            .parse()
            .map_err(|_| CoreError::InvalidTime(s.to_string()))?;
        let minute: u8 = m
            .parse()
            .map_err(|_| CoreError::InvalidTime(s.to_string()))?;
        ClassTime::new(hour, minute)
    }
}

impl Serialize for ClassTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClassTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_roundtrip_through_index() {
        for day in Weekday::ALL {
            assert_eq!(Weekday::from_index(day.index()), day);
        }
    }

    #[test]
    fn weekday_prev_wraps() {
        assert_eq!(Weekday::Monday.prev(), Weekday::Sunday);
        assert_eq!(Weekday::Sunday.prev(), Weekday::Saturday);
        assert_eq!(Weekday::Thursday.prev(), Weekday::Wednesday);
    }

    #[test]
    fn weekday_parse_case_insensitive() {
        assert_eq!("Monday".parse::<Weekday>().unwrap(), Weekday::Monday);
        assert_eq!("SUNDAY".parse::<Weekday>().unwrap(), Weekday::Sunday);
        assert!("someday".parse::<Weekday>().is_err());
    }

    #[test]
    fn class_time_parse_and_display() {
        let t: ClassTime = "09:05".parse().unwrap();
        assert_eq!((t.hour, t.minute), (9, 5));
        assert_eq!(t.to_string(), "09:05");

        // Unpadded hours parse too — the provider renders "9:00" in places.
        let t: ClassTime = "9:00".parse().unwrap();
        assert_eq!(t.to_string(), "09:00");
    }

    #[test]
    fn class_time_rejects_out_of_range() {
        assert!("24:00".parse::<ClassTime>().is_err());
        assert!("10:60".parse::<ClassTime>().is_err());
        assert!("1000".parse::<ClassTime>().is_err());
        assert!("aa:bb".parse::<ClassTime>().is_err());
    }
}
