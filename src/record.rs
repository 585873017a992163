use std::borrow::Cow;
use std::fmt;
use std::time::SystemTime;

/// Severity of a [`Record`]. Larger values are more severe.
///
/// The named levels are spaced [`Level::GAP`] apart so that intermediate
/// severities (`INFO+2`, `WARN-1`) can be expressed without new names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(i8);

impl Level {
    pub const TRACE: Level = Level(-8);
    pub const DEBUG: Level = Level(-4);
    pub const INFO: Level = Level(0);
    pub const WARN: Level = Level(4);
    pub const ERROR: Level = Level(8);

    /// Distance between two adjacent named levels.
    pub const GAP: i8 = 4;

    pub const fn new(severity: i8) -> Self {
        Level(severity)
    }

    pub const fn severity(self) -> i8 {
        self.0
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::INFO
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, base) = match self.0 {
            i8::MIN..=-5 => ("TRACE", Level::TRACE),
            -4..=-1 => ("DEBUG", Level::DEBUG),
            0..=3 => ("INFO", Level::INFO),
            4..=7 => ("WARN", Level::WARN),
            _ => ("ERROR", Level::ERROR),
        };
        let delta = i16::from(self.0) - i16::from(base.0);
        if delta == 0 {
            f.write_str(name)
        } else {
            write!(f, "{name}{delta:+}")
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::TRACE,
            tracing::Level::DEBUG => Level::DEBUG,
            tracing::Level::INFO => Level::INFO,
            tracing::Level::WARN => Level::WARN,
            _ => Level::ERROR,
        }
    }
}

/// A structured attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(Cow<'static, str>),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::I64(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&'static str> for Value {
    fn from(s: &'static str) -> Self {
        Value::Str(Cow::Borrowed(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Cow::Owned(s))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I64(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::U64(v as u64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// A key/value pair attached to a record or a handler.
#[derive(Clone, Debug, PartialEq)]
pub struct Attr {
    pub key: Cow<'static, str>,
    pub value: Value,
}

impl Attr {
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One structured log event.
#[derive(Clone, Debug)]
pub struct Record {
    pub level: Level,
    pub message: Cow<'static, str>,
    pub time: SystemTime,
    pub attrs: Vec<Attr>,
}

impl Record {
    /// Create a record stamped with the current time.
    pub fn new(level: Level, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            level,
            message: message.into(),
            time: SystemTime::now(),
            attrs: Vec::new(),
        }
    }

    pub fn with_time(mut self, time: SystemTime) -> Self {
        self.time = time;
        self
    }

    pub fn attr(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        self.attrs.push(Attr::new(key, value));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_levels_display() {
        assert_eq!(Level::TRACE.to_string(), "TRACE");
        assert_eq!(Level::DEBUG.to_string(), "DEBUG");
        assert_eq!(Level::INFO.to_string(), "INFO");
        assert_eq!(Level::WARN.to_string(), "WARN");
        assert_eq!(Level::ERROR.to_string(), "ERROR");
    }

    #[test]
    fn intermediate_levels_display_offset() {
        assert_eq!(Level::new(2).to_string(), "INFO+2");
        assert_eq!(Level::new(3).to_string(), "INFO+3");
        assert_eq!(Level::new(-2).to_string(), "DEBUG+2");
        assert_eq!(Level::new(12).to_string(), "ERROR+4");
        assert_eq!(Level::new(-10).to_string(), "TRACE-2");
    }

    #[test]
    fn severity_ordering_is_ascending() {
        assert!(Level::TRACE < Level::DEBUG);
        assert!(Level::DEBUG < Level::INFO);
        assert!(Level::INFO < Level::WARN);
        assert!(Level::WARN < Level::ERROR);
        assert!(Level::from(tracing::Level::ERROR) > Level::from(tracing::Level::TRACE));
    }
}
