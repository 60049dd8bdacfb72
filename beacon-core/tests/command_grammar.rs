use beacon_core::command::{Field, ParseError, parse_command};
use beacon_core::pattern::{COUNT_RANGE, FREQUENCY_RANGE};

#[test]
fn accepts_every_boundary_combination() {
    let counts = [*COUNT_RANGE.start(), 2, 50, 99, *COUNT_RANGE.end()];
    let frequencies = [*FREQUENCY_RANGE.start(), 3, 7, 10, *FREQUENCY_RANGE.end()];

    for count in counts {
        for frequency in frequencies {
            let line = format!("LED:{count}:{frequency}");
            let spec = parse_command(line.as_bytes())
                .unwrap_or_else(|err| panic!("{line} should parse: {err}"));
            assert_eq!(spec.count(), count, "{line}");
            assert_eq!(spec.frequency_hz(), frequency, "{line}");
            assert_eq!(spec.half_period_ms(), 500 / frequency, "{line}");
        }
    }
}

#[test]
fn rejects_out_of_range_values() {
    let cases: [(&[u8], ParseError); 5] = [
        (b"LED:0:5", ParseError::CountOutOfRange(0)),
        (b"LED:101:5", ParseError::CountOutOfRange(101)),
        (b"LED:5:0", ParseError::FrequencyOutOfRange(0)),
        (b"LED:5:101", ParseError::FrequencyOutOfRange(101)),
        (b"LED:0:0", ParseError::CountOutOfRange(0)),
    ];

    for (line, expected) in cases {
        assert_eq!(
            parse_command(line),
            Err(expected),
            "{}",
            String::from_utf8_lossy(line)
        );
    }
}

#[test]
fn rejects_malformed_lines() {
    let cases: [(&[u8], ParseError); 7] = [
        (b"", ParseError::MissingField(Field::Count)),
        (b"LED", ParseError::MissingField(Field::Count)),
        (b"LED:4", ParseError::MissingField(Field::Frequency)),
        (b"BUZ:4:4", ParseError::TagMismatch),
        (b"LED:4:4:4", ParseError::TrailingField),
        (b"LED:four:4", ParseError::CountOutOfRange(0)),
        (b"LED:4:", ParseError::FrequencyOutOfRange(0)),
    ];

    for (line, expected) in cases {
        assert_eq!(
            parse_command(line),
            Err(expected),
            "{}",
            String::from_utf8_lossy(line)
        );
    }
}

#[test]
fn trailing_garbage_after_digits_is_ignored() {
    let spec = parse_command(b"LED:4x:20hz").expect("atoi-style prefix should parse");
    assert_eq!(spec.count(), 4);
    assert_eq!(spec.frequency_hz(), 20);
}

#[test]
fn leading_space_and_plus_sign_are_skipped() {
    let spec = parse_command(b"LED: 5:10").expect("leading space should parse");
    assert_eq!(spec.count(), 5);
    assert_eq!(spec.frequency_hz(), 10);

    let spec = parse_command(b"LED:+2:\t+3").expect("plus sign should parse");
    assert_eq!(spec.count(), 2);
    assert_eq!(spec.frequency_hz(), 3);

    assert_eq!(
        parse_command(b"LED:-5:10"),
        Err(ParseError::CountOutOfRange(0))
    );
}

#[test]
fn errors_render_for_diagnostics() {
    assert_eq!(
        ParseError::MissingField(Field::Frequency).to_string(),
        "missing frequency field"
    );
    assert_eq!(
        ParseError::CountOutOfRange(0).to_string(),
        "count 0 outside 1..=100"
    );
}
