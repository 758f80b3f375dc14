//! statsd line parser.
//!
//! Turns one `name:value|type[|@rate][|#tags]` line into an [`Operation`].
//! Parsing never panics; every line either yields an operation or a
//! [`ParseError`] that the caller logs and drops.

use crate::metrics::types::{OpKind, OpValue, Operation};
use thiserror::Error;

/// Why a line was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("missing metric name or ':' separator")]
    MissingName,

    #[error("missing value or type after ':'")]
    MissingValueOrType,

    #[error("invalid sample rate '{0}'")]
    InvalidSampleRate(String),

    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),

    #[error("invalid {kind} value '{value}'")]
    InvalidValue { kind: &'static str, value: String },

    #[error("unknown metric type '{0}'")]
    UnknownType(String),
}

impl ParseError {
    fn invalid(kind: &'static str, value: &str) -> Self {
        Self::InvalidValue {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Parse a single statsd line.
pub fn parse_line(line: &str) -> Result<Operation, ParseError> {
    let colon = match line.find(':') {
        Some(pos) if pos > 0 => pos,
        _ => return Err(ParseError::MissingName),
    };

    // The first '|' must follow the value and leave room for a type.
    let bar = match line.find('|') {
        Some(pos) if pos > colon + 1 && pos + 1 < line.len() => pos,
        _ => return Err(ParseError::MissingValueOrType),
    };

    let name = &line[..colon];
    let value = &line[colon + 1..bar];
    let (type_token, modifiers) = match line[bar + 1..].split_once('|') {
        Some((token, rest)) => (token, Some(rest)),
        None => (&line[bar + 1..], None),
    };

    let mut sample_rate = None;
    if let Some(modifiers) = modifiers {
        for segment in modifiers.split('|') {
            match segment.as_bytes().first() {
                Some(b'@') => sample_rate = Some(parse_sample_rate(&segment[1..])?),
                // Tags are tolerated but not stored.
                Some(b'#') => {},
                _ => return Err(ParseError::UnknownModifier(segment.to_owned())),
            }
        }
    }

    let (kind, value) = match type_token {
        "c" => match value.parse::<i64>() {
            Ok(v) if v >= 0 => (OpKind::CounterAdd, OpValue::Int(v)),
            _ => return Err(ParseError::invalid("counter", value)),
        },
        "ms" => match value.parse::<f64>() {
            Ok(v) if v.is_finite() => (OpKind::TimerSample, OpValue::Float(v)),
            _ => return Err(ParseError::invalid("timer", value)),
        },
        "g" => parse_gauge(value)?,
        "s" => (OpKind::SetAdd, OpValue::Str(value.to_owned())),
        // Histograms are recorded as plain gauges.
        "h" => match value.parse::<i64>() {
            Ok(v) => (OpKind::GaugeSet, OpValue::Int(v)),
            Err(_) => return Err(ParseError::invalid("histogram", value)),
        },
        other => return Err(ParseError::UnknownType(other.to_owned())),
    };

    Ok(Operation::new(kind, name, value).with_sample_rate(sample_rate))
}

fn parse_sample_rate(raw: &str) -> Result<f64, ParseError> {
    match raw.parse::<f64>() {
        Ok(rate) if rate.is_finite() && (0.0..=1.0).contains(&rate) => Ok(rate),
        _ => Err(ParseError::InvalidSampleRate(raw.to_owned())),
    }
}

fn parse_gauge(value: &str) -> Result<(OpKind, OpValue), ParseError> {
    let parsed = value
        .parse::<i64>()
        .map_err(|_| ParseError::invalid("gauge", value))?;

    if value.starts_with('+') {
        Ok((OpKind::GaugeIncrement, OpValue::Int(parsed)))
    } else if value.starts_with('-') {
        let magnitude = parsed
            .checked_neg()
            .ok_or_else(|| ParseError::invalid("gauge", value))?;
        Ok((OpKind::GaugeDecrement, OpValue::Int(magnitude)))
    } else {
        Ok((OpKind::GaugeSet, OpValue::Int(parsed)))
    }
}
