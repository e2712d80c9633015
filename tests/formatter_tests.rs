use device_event_log::{
    emit_event, format_message, lprintf, next_message, Geometry, HostLog, EVT_PRINTF, LOST_MESSAGE,
};

/// Emits a message with the given template and arguments and renders it back.
macro_rules! rendered {
    ($template:expr $(, $arg:expr)* $(,)?) => {{
        let mut host = HostLog::new(Geometry::new(1, 1));
        emit_event!(host, EVT_PRINTF, 0, $template $(, $arg)*);
        let generation = host.generation();
        let mut stream = generation.stream();
        let text = next_message(&mut stream).map(|(_, text)| text);
        text.unwrap_or_default()
    }};
}

#[test]
fn test_default_float_precision() {
    assert_eq!(
        rendered!("body %d at %f,%f", 3i32, 1.5f64, -2.25f64),
        "body 3 at 1.500000,-2.250000"
    );
}

#[test]
fn test_literal_percent_consumes_nothing() {
    assert_eq!(rendered!("100%% done, %d left", 4i32), "100% done, 4 left");
    assert_eq!(rendered!("%%"), "%");
}

#[test]
fn test_strings() {
    assert_eq!(rendered!("%s and %s", "a", "bc"), "a and bc");
    assert_eq!(rendered!("[%.3s]", "abcdef"), "[abc]");
    assert_eq!(rendered!("[%6s|%-6s]", "hi", "hi"), "[    hi|hi    ]");
}

#[test]
fn test_integer_width_and_flags() {
    assert_eq!(rendered!("%5d|%-5d|%05d", 42i32, 42i32, 42i32), "   42|42   |00042");
    assert_eq!(rendered!("%05d", -42i32), "-0042");
    assert_eq!(rendered!("%+d % d", 5i32, 5i32), "+5  5");
    assert_eq!(rendered!("%d", i64::MIN), "-9223372036854775808");
    assert_eq!(rendered!("%u", -1i32), "4294967295");
    assert_eq!(rendered!("%ld %lu %hhd", 7i64, 8u64, -9i8), "7 8 -9");
}

#[test]
fn test_unsigned_conversions() {
    assert_eq!(
        rendered!("%x %X %#x %o %#o %c", 255u32, 255u32, 255u32, 8u32, 8u32, 65u8),
        "ff FF 0xff 10 010 A"
    );
    assert_eq!(rendered!("%08x", 0xbeefu32), "0000beef");
    assert_eq!(rendered!("%p", 0x1000u64), "0x1000");
}

#[test]
fn test_fixed_and_exponential() {
    assert_eq!(
        rendered!("%.2f|%8.3f|%-8.1f|", 3.14159f64, 2.5f64, -1.26f64),
        "3.14|   2.500|-1.3    |"
    );
    assert_eq!(rendered!("%e %E", 1234.5f64, 0.000123f64), "1.234500e+03 1.230000E-04");
    assert_eq!(rendered!("%.0f|%#.0f", 7.0f64, 7.0f64), "7|7.");
    assert_eq!(rendered!("%+.1e", 0.0f64), "+0.0e+00");
}

#[test]
fn test_general_format() {
    assert_eq!(rendered!("%g %g %g", 100000.0f64, 0.00001f64, 0.5f64), "100000 1e-05 0.5");
    assert_eq!(rendered!("%G", 1.5e20f64), "1.5E+20");
    assert_eq!(rendered!("%.3g", 3.14159f64), "3.14");
}

#[test]
fn test_hex_float() {
    assert_eq!(rendered!("%a", 1.0f64), "0x1p+0");
    assert_eq!(rendered!("%A", 0.5f64), "0X1P-1");
    assert_eq!(rendered!("%a", -3.0f64), "-0x1.8p+1");
}

#[test]
fn test_single_precision_is_widened() {
    assert_eq!(rendered!("%f", 0.5f32), "0.500000");
    assert_eq!(rendered!("%.3f", 1.1f32), "1.100");
    assert_eq!(rendered!("%g", 0.25f32), "0.25");
}

#[test]
fn test_non_finite_values() {
    assert_eq!(rendered!("%f %F", f64::INFINITY, f64::NAN), "inf NAN");
    assert_eq!(rendered!("%5f|%-5f|", f64::NEG_INFINITY, f64::INFINITY), " -inf|inf  |");
}

#[test]
fn test_missing_arguments_render_defaults() {
    assert_eq!(rendered!("%d and %d", 1i32), "1 and 0");
    assert_eq!(rendered!("[%s]"), "[]");
}

#[test]
fn test_unterminated_specifier_is_literal() {
    assert_eq!(rendered!("50%"), "50%");
    assert_eq!(rendered!("load %d%", 9i32), "load 9%");
}

#[test]
fn test_template_from_lprintf() {
    let mut host = HostLog::new(Geometry::new(4, 1));
    lprintf!(host, 4, "Collision detected in system %d\n", 17i32);

    let generation = host.generation();
    let mut stream = generation.stream();
    let (header, text) = next_message(&mut stream).unwrap();
    assert_eq!(header.thread_id, 4);
    assert_eq!(text, "Collision detected in system 17\n");
    assert!(next_message(&mut stream).is_none());
}

#[test]
fn test_next_message_skips_other_events() {
    let mut host = HostLog::new(Geometry::new(4, 1));
    emit_event!(host, 30, 0, 1i32);
    lprintf!(host, 0, "only message");
    emit_event!(host, 31, 0, 2i32);

    let generation = host.generation();
    let mut stream = generation.stream();
    let (header, text) = next_message(&mut stream).unwrap();
    assert_eq!(header.sequence, 1);
    assert_eq!(text, "only message");
    assert!(next_message(&mut stream).is_none());
}

#[test]
fn test_lost_message_placeholder() {
    let mut host = HostLog::new(Geometry::new(2, 1));
    let long = "y".repeat(4096);
    lprintf!(host, 0, "%s", long);
    emit_event!(host, 3, 0, 1i32);

    let generation = host.generation();
    let mut stream = generation.stream();
    stream.advance();
    assert_eq!(format_message(stream.record()).as_deref(), Some(LOST_MESSAGE));
    stream.advance();
    assert_eq!(format_message(stream.record()), None);
}

#[test]
fn test_count_conversion_renders_nothing() {
    assert_eq!(rendered!("a%nb %d", 4i32), "ab 4");
    assert_eq!(rendered!("%n%s", "kept"), "kept");
}

#[test]
fn test_string_precision_counts_bytes() {
    assert_eq!(rendered!("[%.2s]", "héllo"), "[h]");
    assert_eq!(rendered!("[%.3s]", "héllo"), "[hé]");
    assert_eq!(rendered!("%c", 0xe9u8), "é");
}
