//! TOON (Token-Oriented Object Notation): a line-oriented, indentation-based
//! text encoding that represents the same data model as JSON in fewer
//! tokens. This crate is a streaming codec built from three stages that
//! share one event vocabulary:
//!
//! - [`lexer`] turns source text into a token stream, tracking indentation
//!   with an explicit dedent queue instead of a single lookahead token.
//! - [`parser`] turns a token stream into [`event::Event`]s with a 2-token
//!   lookahead, context-stack-driven dispatch.
//! - [`generator`] turns an event stream back into TOON text.
//!
//! The top-level [`decode`] and [`encode`] functions are the common
//! entry points; the staged modules are public for callers that want to
//! consume or produce events directly.

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod generator;
pub mod lexer;
pub mod parser;
pub mod token;

pub use config::Options;
pub use error::{Error, ErrorKind, Result};
pub use event::Event;
pub use generator::Mode;
pub use parser::Parser;

/// Parse `input` into a flat event stream, per [`config::Options`].
pub fn decode(input: &str, options: Options) -> Result<Vec<Event>> {
    Parser::new(input, options).collect_events()
}

/// Render an event stream (as produced by [`decode`]) back to TOON text.
pub fn encode(events: Vec<Event>, options: Options, mode: Mode) -> Result<String> {
    generator::generate(events, &options, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_then_encode_is_stable_for_a_simple_document() {
        let options = Options::default();
        let events = decode("name: Alice\nage: 30", options).unwrap();
        let text = encode(events, options, Mode::Streaming).unwrap();
        assert_eq!(text, "name: Alice\nage: 30");
    }

    #[test]
    fn decode_then_encode_round_trips_nested_structures() {
        let options = Options::default();
        let source = "user:\n  id: 1\n  tags[2]: a,b\npeople[2]:\n  - id: 1\n    name: Alice\n  - id: 2\n    name: Bob";
        let events = decode(source, options).unwrap();
        let text = encode(events, options, Mode::Streaming).unwrap();
        assert_eq!(text, source);
    }

    #[test]
    fn encoding_is_idempotent() {
        let options = Options::default();
        let events = decode("a: 1\nb[3]: x,y,z", options).unwrap();
        let first = encode(events.clone(), options, Mode::Streaming).unwrap();
        let events_again = decode(&first, options).unwrap();
        let second = encode(events_again, options, Mode::Streaming).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn strict_mode_rejects_tab_indentation() {
        let err = decode("a:\n\tb: 1", Options::strict()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Indentation);
    }

    #[test]
    fn lenient_mode_accepts_non_multiple_indentation() {
        let events = decode("a:\n   b: 1", Options::lenient()).unwrap();
        assert!(events.contains(&Event::ValueIntegral(1)));
    }
}
