//! Eventos de log emitidos por un job y su nivel.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::TRUNCATION_MARKER;

/// Nivel de un evento, ordenado por severidad (`Trace` < ... < `Error`).
///
/// El ordinal persistido es el de severidad, así "nivel >= mínimo" se traduce
/// directamente a `level >= $min` en SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [Self::Trace, Self::Debug, Self::Info, Self::Warn, Self::Error];

    pub fn ordinal(self) -> i32 {
        self as i32
    }

    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        usize::try_from(ordinal).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter()
                 .copied()
                 .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
                 .ok_or_else(|| format!("unknown log level: {s}"))
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

/// Excepción asociada a un evento (tipo + mensaje).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrowableInfo {
    pub type_name: String,
    pub message: Option<String>,
}

/// Evento de log de un job.
///
/// `message` es la plantilla con `{}` como marcadores; `arguments` se
/// sustituyen en orden por `formatted_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub marker: Option<String>,
    #[serde(default)]
    pub throwable: Option<ThrowableInfo>,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self { level,
               message: message.into(),
               arguments: Vec::new(),
               timestamp: Utc::now(),
               marker: None,
               throwable: None }
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_throwable(mut self, type_name: impl Into<String>, message: Option<String>) -> Self {
        self.throwable = Some(ThrowableInfo { type_name: type_name.into(), message });
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Mensaje con los argumentos sustituidos. Los `{}` sobrantes quedan tal
    /// cual; los argumentos sobrantes se ignoran.
    pub fn formatted_message(&self) -> String {
        if self.arguments.is_empty() {
            return self.message.clone();
        }
        let mut out = String::with_capacity(self.message.len());
        let mut args = self.arguments.iter();
        let mut rest = self.message.as_str();
        while let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            match args.next() {
                Some(arg) => out.push_str(arg),
                None => out.push_str("{}"),
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        out
    }
}

/// Trunca `text` a `cap` caracteres, terminando en `...` cuando se corta.
///
/// Un texto de `cap + 1` caracteres queda con exactamente `cap` caracteres,
/// marca incluida. Trabaja sobre `char`, nunca corta un code point.
pub fn truncate_with_marker(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if cap <= marker_len {
        return text.chars().take(cap).collect();
    }
    let mut out: String = text.chars().take(cap - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_LOG_MESSAGE_LENGTH;

    #[test]
    fn severity_order_and_ordinals() {
        assert!(LogLevel::Error > LogLevel::Info);
        assert!(LogLevel::Trace < LogLevel::Debug);
        for level in LogLevel::ALL {
            assert_eq!(LogLevel::from_ordinal(level.ordinal()), Some(level));
        }
        assert_eq!(LogLevel::from_ordinal(-1), None);
        assert_eq!(LogLevel::from_ordinal(9), None);
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(LogLevel::from(log::Level::Info), LogLevel::Info);
    }

    #[test]
    fn formats_arguments_in_order() {
        let ev = LogEvent::new(LogLevel::Info, "moved {} to {} ({})").with_arguments(["a", "b"]);
        assert_eq!(ev.formatted_message(), "moved a to b ({})");
        assert_eq!(LogEvent::new(LogLevel::Info, "plain").formatted_message(), "plain");
    }

    #[test]
    fn truncation_marker_sits_at_cap() {
        let input = "x".repeat(MAX_LOG_MESSAGE_LENGTH + 1);
        let out = truncate_with_marker(&input, MAX_LOG_MESSAGE_LENGTH);
        assert_eq!(out.chars().count(), MAX_LOG_MESSAGE_LENGTH);
        assert!(out.ends_with("..."));
        assert_eq!(&out[..MAX_LOG_MESSAGE_LENGTH - 3], &input[..MAX_LOG_MESSAGE_LENGTH - 3]);

        let exact = "y".repeat(MAX_LOG_MESSAGE_LENGTH);
        assert_eq!(truncate_with_marker(&exact, MAX_LOG_MESSAGE_LENGTH), exact);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let out = truncate_with_marker("ñandú-ñandú", 6);
        assert_eq!(out, "ñan...");
    }
}
