//! Ambient named settings consulted by steps, such as `timeout`.

use crate::expect::MAX_TIMEOUT;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Timeout used when no usable `timeout` setting is present.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Name of the setting holding the expect timeout, in seconds.
pub const TIMEOUT: &str = "timeout";

#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Number(f64),
    Text(String),
}

/// Named values visible to every step of a run.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, Setting>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Setting) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Setting> {
        self.values.get(name)
    }

    /// The expect timeout.
    ///
    /// Only a finite number counts; it is read as whole seconds (fractions
    /// are truncated), negative values mean zero and values above
    /// [`MAX_TIMEOUT`] are capped. Anything else yields [`DEFAULT_TIMEOUT`].
    pub fn timeout(&self) -> Duration {
        match self.get(TIMEOUT) {
            Some(Setting::Number(secs)) if secs.is_finite() => {
                let secs = secs.clamp(0.0, MAX_TIMEOUT.as_secs() as f64);
                Duration::from_secs(secs as u64)
            }
            _ => DEFAULT_TIMEOUT,
        }
    }
}

impl Extend<Assignment> for Settings {
    fn extend<I: IntoIterator<Item = Assignment>>(&mut self, iter: I) {
        for Assignment { name, value } in iter {
            self.set(name, value);
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AssignmentError {
    #[error("expected NAME=VALUE, got: {0}")]
    MissingEquals(String),

    #[error("setting name must not be empty")]
    EmptyName,
}

/// A `NAME=VALUE` pair, as given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Setting,
}

impl FromStr for Assignment {
    type Err = AssignmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, raw) = s
            .split_once('=')
            .ok_or_else(|| AssignmentError::MissingEquals(s.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AssignmentError::EmptyName);
        }
        let value = match raw.trim().parse::<f64>() {
            Ok(n) => Setting::Number(n),
            Err(_) => Setting::Text(raw.to_string()),
        };
        Ok(Self {
            name: name.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_timeout(value: Setting) -> Settings {
        let mut settings = Settings::new();
        settings.set(TIMEOUT, value);
        settings
    }

    #[test]
    fn test_default_timeout_is_one_hour() {
        assert_eq!(Settings::new().timeout(), Duration::from_secs(3600));
    }

    #[test]
    fn test_numeric_timeout() {
        assert_eq!(with_timeout(Setting::Number(5.0)).timeout(), Duration::from_secs(5));
        assert_eq!(with_timeout(Setting::Number(0.0)).timeout(), Duration::ZERO);
    }

    #[test]
    fn test_fractional_timeout_truncates() {
        assert_eq!(with_timeout(Setting::Number(2.9)).timeout(), Duration::from_secs(2));
        assert_eq!(with_timeout(Setting::Number(0.5)).timeout(), Duration::ZERO);
    }

    #[test]
    fn test_negative_timeout_is_zero() {
        assert_eq!(with_timeout(Setting::Number(-3.0)).timeout(), Duration::ZERO);
    }

    #[test]
    fn test_huge_timeout_is_capped() {
        assert_eq!(with_timeout(Setting::Number(1e30)).timeout(), MAX_TIMEOUT);
        assert_eq!(with_timeout(Setting::Number(f64::MAX)).timeout(), MAX_TIMEOUT);
    }

    #[test]
    fn test_non_numeric_timeout_uses_default() {
        assert_eq!(with_timeout(Setting::Text("5".into())).timeout(), DEFAULT_TIMEOUT);
        assert_eq!(with_timeout(Setting::Number(f64::NAN)).timeout(), DEFAULT_TIMEOUT);
        assert_eq!(with_timeout(Setting::Number(f64::INFINITY)).timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_parse_assignment() {
        let a: Assignment = "timeout=10".parse().unwrap();
        assert_eq!(a.name, "timeout");
        assert_eq!(a.value, Setting::Number(10.0));

        let a: Assignment = "prompt=$ ".parse().unwrap();
        assert_eq!(a.value, Setting::Text("$ ".into()));

        let a: Assignment = "empty=".parse().unwrap();
        assert_eq!(a.value, Setting::Text(String::new()));
    }

    #[test]
    fn test_parse_assignment_errors() {
        assert_eq!(
            "timeout".parse::<Assignment>(),
            Err(AssignmentError::MissingEquals("timeout".into()))
        );
        assert_eq!("=5".parse::<Assignment>(), Err(AssignmentError::EmptyName));
    }

    #[test]
    fn test_extend_with_assignments() {
        let mut settings = Settings::new();
        settings.extend(vec![
            "timeout=7".parse::<Assignment>().unwrap(),
            "timeout=3".parse::<Assignment>().unwrap(),
        ]);
        assert_eq!(settings.timeout(), Duration::from_secs(3));
    }
}
