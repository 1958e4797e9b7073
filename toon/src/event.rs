//! The shared event vocabulary the parser emits and the generator consumes.
//! See `spec.md` §4.3.1.

use crate::token::Number;

/// One step of a streaming document walk.
///
/// The parser produces a sequence of these from TOON text; the generator
/// consumes the same sequence and produces TOON text. Neither side needs to
/// know about the other's internals, only this vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StartObject,
    EndObject,
    StartArray { len: usize },
    EndArray,
    FieldName(String),
    ValueString(String),
    ValueIntegral(i64),
    ValueFractional(f64),
    ValueTrue,
    ValueFalse,
    ValueNull,
    Eof,
}

impl Event {
    /// Build the matching `Value*` event for a lexed number, keeping the
    /// integral/fractional distinction the generator needs.
    pub fn from_number(number: Number) -> Event {
        match number {
            Number::Integral(v) => Event::ValueIntegral(v),
            Number::Fractional(v) => Event::ValueFractional(v),
        }
    }

    pub fn is_scalar_value(&self) -> bool {
        matches!(
            self,
            Event::ValueString(_)
                | Event::ValueIntegral(_)
                | Event::ValueFractional(_)
                | Event::ValueTrue
                | Event::ValueFalse
                | Event::ValueNull
        )
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Event::ValueString(s) => Some(s.as_str()),
            Event::FieldName(s) => Some(s.as_str()),
            _ => None,
        }
    }
}
