use toon::{decode, encode, Error, ErrorKind, Event, Mode, Options};

fn events(src: &str) -> Vec<Event> {
    decode(src, Options::default()).expect("expected a successful parse")
}

fn assert_balanced(events: &[Event]) {
    let mut objects = 0i64;
    let mut arrays = 0i64;
    for event in events {
        match event {
            Event::StartObject => objects += 1,
            Event::EndObject => {
                objects -= 1;
                assert!(objects >= 0, "EndObject without a matching StartObject");
            }
            Event::StartArray { .. } => arrays += 1,
            Event::EndArray => {
                arrays -= 1;
                assert!(arrays >= 0, "EndArray without a matching StartArray");
            }
            _ => {}
        }
    }
    assert_eq!(objects, 0, "unbalanced StartObject/EndObject");
    assert_eq!(arrays, 0, "unbalanced StartArray/EndArray");
}

#[test]
fn property_balance_holds_for_nested_documents() {
    let source = "user:\n  id: 1\n  tags[2]: a,b\npeople[2]:\n  - id: 1\n    name: Alice\n  - id: 2\n    name: Bob";
    assert_balanced(&events(source));
}

#[test]
fn property_round_trip_primitive_scalars() {
    let options = Options::default();
    let cases: Vec<(Vec<Event>, &str)> = vec![
        (
            vec![
                Event::StartObject,
                Event::FieldName("v".into()),
                Event::ValueString("plain".into()),
                Event::EndObject,
                Event::Eof,
            ],
            "plain",
        ),
        (
            vec![
                Event::StartObject,
                Event::FieldName("v".into()),
                Event::ValueString("has: colon, comma | pipe \"quote\"".into()),
                Event::EndObject,
                Event::Eof,
            ],
            "quoted special string",
        ),
        (
            vec![
                Event::StartObject,
                Event::FieldName("v".into()),
                Event::ValueIntegral(i64::MAX),
                Event::EndObject,
                Event::Eof,
            ],
            "i64::MAX",
        ),
        (
            vec![
                Event::StartObject,
                Event::FieldName("v".into()),
                Event::ValueIntegral(i64::MIN),
                Event::EndObject,
                Event::Eof,
            ],
            "i64::MIN",
        ),
        (
            vec![
                Event::StartObject,
                Event::FieldName("v".into()),
                Event::ValueFractional(3.5),
                Event::EndObject,
                Event::Eof,
            ],
            "fractional",
        ),
        (
            vec![
                Event::StartObject,
                Event::FieldName("v".into()),
                Event::ValueTrue,
                Event::EndObject,
                Event::Eof,
            ],
            "true",
        ),
        (
            vec![
                Event::StartObject,
                Event::FieldName("v".into()),
                Event::ValueFalse,
                Event::EndObject,
                Event::Eof,
            ],
            "false",
        ),
        (
            vec![
                Event::StartObject,
                Event::FieldName("v".into()),
                Event::ValueNull,
                Event::EndObject,
                Event::Eof,
            ],
            "null",
        ),
    ];

    for (original, label) in cases {
        let text = encode(original.clone(), options, Mode::Streaming).unwrap();
        let parsed = decode(&text, options).unwrap();
        assert_eq!(parsed, original, "round-trip failed for {label}: {text:?}");
    }
}

#[test]
fn property_round_trip_structural() {
    let documents = [
        "name: Alice",
        "user:\n  id: 123\n  name: Ada",
        "[3]: a,b,c",
        "users[2]{id,name}:\n  1,Alice\n  2,Bob",
        "items[2]:\n  - id: 1\n    name: First\n  - id: 2\n    name: Second",
        "42",
        "tags[3]: a,b,c",
        "empty:\nrest: 1",
    ];
    for document in documents {
        let first = events(document);
        let text = encode(first.clone(), Options::default(), Mode::Buffered).unwrap();
        let second = decode(&text, Options::default()).unwrap();
        assert_eq!(second, first, "structural round-trip drifted for {document:?}");
    }
}

#[test]
fn property_idempotence_of_generation() {
    let documents = [
        "a: 1\nb[3]: x,y,z",
        "user:\n  id: 1\n  tags[2]: a,b",
        "items[2]:\n  - id: 1\n    name: First\n  - id: 2\n    name: Second",
    ];
    for document in documents {
        let parsed = events(document);
        let first = encode(parsed, Options::default(), Mode::Streaming).unwrap();
        let reparsed = decode(&first, Options::default()).unwrap();
        let second = encode(reparsed, Options::default(), Mode::Streaming).unwrap();
        assert_eq!(first, second, "generation was not idempotent for {document:?}");
    }
}

#[test]
fn property_number_canonicalization() {
    use toon::token::Number;

    // `1e6` and `-0.0` keep a trailing `.0` here, diverging from the
    // spec's literal property-5 examples ("1000000", "0"): both are
    // whole-valued `f64`s indistinguishable from `42.0` by the time they
    // reach `format_number`, and `42.0` must print as `"42.0"` to stay
    // distinguishable from `ValueIntegral(42)` on re-decode. See
    // DESIGN.md's number-canonicalization decision.
    assert_eq!(toon::generator::format_number(Number::Fractional(1e6)), "1000000.0");
    assert_eq!(toon::generator::format_number(Number::Fractional(-0.0)), "0.0");
    assert_eq!(toon::generator::format_number(Number::Fractional(1.5000)), "1.5");
    assert_eq!(toon::generator::format_number(Number::Fractional(42.0)), "42.0");
}

#[test]
fn property_quoting_minimality_leaves_plain_strings_untouched() {
    let plain_words = ["alice", "hello_world", "version1", "x"];
    for word in plain_words {
        let source = format!("v: {word}");
        let events = events(&source);
        let text = encode(events, Options::default(), Mode::Streaming).unwrap();
        assert_eq!(text, source, "{word:?} should not have been quoted");
    }
}

#[test]
fn property_strict_mode_rejects_known_bad_inputs() {
    let bad_inputs: &[(&str, ErrorKind)] = &[
        ("[3]: a,b", ErrorKind::Structural),
        ("[2]: a,b,c", ErrorKind::Structural),
        ("user:\n   id: 1", ErrorKind::Indentation),
        (
            "users[2]{id,name}:\n  1,Alice\n  2,Bob,extra",
            ErrorKind::Structural,
        ),
        ("user:\n\tid: 1", ErrorKind::Indentation),
        ("\"unterminated", ErrorKind::Lexical),
    ];

    for (input, expected_kind) in bad_inputs {
        let err: Error = decode(input, Options::strict()).unwrap_err();
        assert_eq!(&err.kind, expected_kind, "wrong error kind for {input:?}: {err:?}");
    }
}

#[test]
fn property_lenient_mode_accepts_the_same_inputs() {
    let inputs_that_still_error_leniently = ["user:\n\tid: 1", "\"unterminated"];
    let recoverable_inputs = [
        "[3]: a,b",
        "[2]: a,b,c",
        "user:\n   id: 1",
        "users[2]{id,name}:\n  1,Alice\n  2,Bob,extra",
    ];

    for input in recoverable_inputs {
        decode(input, Options::lenient())
            .unwrap_or_else(|e| panic!("expected lenient recovery for {input:?}, got {e:?}"));
    }

    for input in inputs_that_still_error_leniently {
        assert!(
            decode(input, Options::lenient()).is_err(),
            "{input:?} should remain an error even in lenient mode"
        );
    }
}

#[test]
fn property_dedent_unwinding_emits_exactly_two_dedents() {
    use toon::token::TokenKind;

    let mut lexer = toon::lexer::Lexer::new("a:\n  b:\n    c: v\nd: w", Options::default());
    let mut between_c_and_d = Vec::new();
    let mut seen_c_value = false;
    let mut seen_d_key = false;

    loop {
        let token = lexer.next_token();
        if token.kind == TokenKind::Eof {
            break;
        }
        if seen_c_value && !seen_d_key {
            if let TokenKind::Identifier(ref name) = token.kind {
                if name == "d" {
                    seen_d_key = true;
                }
            }
            if !seen_d_key {
                between_c_and_d.push(token.kind.clone());
            }
        }
        if let TokenKind::Identifier(ref name) = token.kind {
            if name == "v" {
                seen_c_value = true;
            }
        }
    }

    let dedent_count = between_c_and_d
        .iter()
        .filter(|k| matches!(k, TokenKind::Dedent))
        .count();
    assert_eq!(dedent_count, 2, "expected exactly two Dedent tokens, saw {between_c_and_d:?}");
}

#[test]
fn seed_a_flat_scalar_field() {
    assert_eq!(
        events("name: Alice"),
        vec![
            Event::StartObject,
            Event::FieldName("name".into()),
            Event::ValueString("Alice".into()),
            Event::EndObject,
            Event::Eof,
        ]
    );
}

#[test]
fn seed_b_nested_object() {
    assert_eq!(
        events("user:\n  id: 123\n  name: Ada"),
        vec![
            Event::StartObject,
            Event::FieldName("user".into()),
            Event::StartObject,
            Event::FieldName("id".into()),
            Event::ValueIntegral(123),
            Event::FieldName("name".into()),
            Event::ValueString("Ada".into()),
            Event::EndObject,
            Event::EndObject,
            Event::Eof,
        ]
    );
}

#[test]
fn seed_c_root_inline_array() {
    assert_eq!(
        events("[3]: a,b,c"),
        vec![
            Event::StartArray { len: 3 },
            Event::ValueString("a".into()),
            Event::ValueString("b".into()),
            Event::ValueString("c".into()),
            Event::EndArray,
            Event::Eof,
        ]
    );
}

#[test]
fn seed_d_tabular_array_of_objects() {
    assert_eq!(
        events("users[2]{id,name}:\n  1,Alice\n  2,Bob"),
        vec![
            Event::StartObject,
            Event::FieldName("users".into()),
            Event::StartArray { len: 2 },
            Event::StartObject,
            Event::FieldName("id".into()),
            Event::ValueIntegral(1),
            Event::FieldName("name".into()),
            Event::ValueString("Alice".into()),
            Event::EndObject,
            Event::StartObject,
            Event::FieldName("id".into()),
            Event::ValueIntegral(2),
            Event::FieldName("name".into()),
            Event::ValueString("Bob".into()),
            Event::EndObject,
            Event::EndArray,
            Event::EndObject,
            Event::Eof,
        ]
    );
}

#[test]
fn seed_e_list_array_of_objects() {
    assert_eq!(
        events("items[2]:\n  - id: 1\n    name: First\n  - id: 2\n    name: Second"),
        vec![
            Event::StartObject,
            Event::FieldName("items".into()),
            Event::StartArray { len: 2 },
            Event::StartObject,
            Event::FieldName("id".into()),
            Event::ValueIntegral(1),
            Event::FieldName("name".into()),
            Event::ValueString("First".into()),
            Event::EndObject,
            Event::StartObject,
            Event::FieldName("id".into()),
            Event::ValueIntegral(2),
            Event::FieldName("name".into()),
            Event::ValueString("Second".into()),
            Event::EndObject,
            Event::EndArray,
            Event::EndObject,
            Event::Eof,
        ]
    );
}

#[test]
fn seed_f_bare_root_scalar() {
    assert_eq!(events("42"), vec![Event::ValueIntegral(42), Event::Eof]);
}
