//! Host-side rendering of printf-style messages.
//!
//! A message record carries its template as the first field and one field per
//! conversion after it. The template is interpreted here, on the host, with
//! the usual `%[flags][width][.precision][length]conversion` syntax over a
//! closed set of conversions:
//!
//! | conversion            | argument field                          |
//! |-----------------------|-----------------------------------------|
//! | `d i`                 | signed integer, 1 to 8 bytes            |
//! | `o u x X c p`         | unsigned integer, 1 to 8 bytes          |
//! | `e E f g G a A`       | `f32` (widened to `f64`) or `f64`       |
//! | `s`                   | string blob                             |
//! | `%`                   | none                                    |
//! | `n`                   | none; renders nothing                   |
//!
//! Length modifiers are accepted and ignored: the stored field width decides
//! how an argument is read. A template with a `%` that never reaches a
//! conversion character is copied through verbatim from that `%` on.

use std::fmt::Write as _;

use crate::decoder::{EventStream, RecordCursor};
use crate::record_format::{EventHeader, EVT_EOF, EVT_MSGLOST, EVT_PRINTF};

/// Placeholder rendered for a message that did not fit in its slot.
pub const LOST_MESSAGE: &str = "Message lost (too big).";

const CONVERSIONS: &[u8] = b"%cdiouxXeEfgGaApsn";

/// Renders the record under `record` if it is a message.
///
/// Returns `None` for any other kind of event, leaving the cursor untouched.
pub fn format_message(record: &mut RecordCursor<'_>) -> Option<String> {
    match record.kind() {
        EVT_PRINTF => {
            let template = record.read_string();
            let text = render(template, record);
            record.skip_to_end();
            Some(text)
        }
        EVT_MSGLOST => {
            let mut probe = record.clone();
            if probe.read_scalar::<i32>() != EVT_PRINTF {
                return None;
            }
            record.skip_to_end();
            Some(LOST_MESSAGE.to_string())
        }
        _ => None,
    }
}

/// Advances `stream` to the next message and renders it.
///
/// Non-message records in between are skipped. Returns `None` at the end of
/// the stream.
pub fn next_message(stream: &mut EventStream<'_>) -> Option<(EventHeader, String)> {
    loop {
        if stream.advance() == EVT_EOF {
            return None;
        }
        let record = stream.record();
        if let Some(text) = format_message(record) {
            return Some((record.header(), text));
        }
    }
}

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    alt: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    conversion: u8,
}

impl Spec {
    fn parse(directives: &[u8], conversion: u8) -> Self {
        let mut spec = Spec {
            conversion,
            ..Spec::default()
        };
        let mut i = 0;
        while i < directives.len() {
            match directives[i] {
                b'-' => spec.left = true,
                b'+' => spec.plus = true,
                b' ' => spec.space = true,
                b'#' => spec.alt = true,
                b'0' => spec.zero = true,
                _ => break,
            }
            i += 1;
        }
        while i < directives.len() && directives[i].is_ascii_digit() {
            spec.width = spec.width * 10 + (directives[i] - b'0') as usize;
            i += 1;
        }
        if i < directives.len() && directives[i] == b'.' {
            i += 1;
            let mut precision = 0;
            while i < directives.len() && directives[i].is_ascii_digit() {
                precision = precision * 10 + (directives[i] - b'0') as usize;
                i += 1;
            }
            spec.precision = Some(precision);
        }
        // anything left is a length modifier
        spec
    }

    fn uppercase(&self) -> bool {
        self.conversion.is_ascii_uppercase()
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }

    fn pad(&self, out: &mut String, sign: &str, prefix: &str, body: &str, zero_fill: bool) {
        let len = sign.len() + prefix.len() + body.chars().count();
        let fill = self.width.saturating_sub(len);
        if self.left {
            out.push_str(sign);
            out.push_str(prefix);
            out.push_str(body);
            out.extend(std::iter::repeat(' ').take(fill));
        } else if self.zero && zero_fill {
            out.push_str(sign);
            out.push_str(prefix);
            out.extend(std::iter::repeat('0').take(fill));
            out.push_str(body);
        } else {
            out.extend(std::iter::repeat(' ').take(fill));
            out.push_str(sign);
            out.push_str(prefix);
            out.push_str(body);
        }
    }
}

/// Renders `template`, pulling one argument from `args` per conversion.
pub fn render(template: &str, args: &mut RecordCursor<'_>) -> String {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len() + 16);
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        out.push_str(&template[literal_start..i]);

        let directives_start = i + 1;
        let Some(found) = bytes[directives_start..]
            .iter()
            .position(|b| CONVERSIONS.contains(b))
        else {
            literal_start = i;
            break;
        };
        let conversion_at = directives_start + found;
        let spec = Spec::parse(&bytes[directives_start..conversion_at], bytes[conversion_at]);
        render_one(&mut out, &spec, args);

        i = conversion_at + 1;
        literal_start = i;
    }

    out.push_str(&template[literal_start..]);
    out
}

fn render_one(out: &mut String, spec: &Spec, args: &mut RecordCursor<'_>) {
    match spec.conversion {
        b'%' => out.push('%'),
        b'n' => {}
        b'd' | b'i' => {
            let value = read_signed(args);
            let digits = integer_digits(value.unsigned_abs(), 10, false, spec.precision);
            spec.pad(out, spec.sign(value < 0), "", &digits, spec.precision.is_none());
        }
        b'u' => {
            let digits = integer_digits(read_unsigned(args), 10, false, spec.precision);
            spec.pad(out, "", "", &digits, spec.precision.is_none());
        }
        b'o' => {
            let mut digits = integer_digits(read_unsigned(args), 8, false, spec.precision);
            if spec.alt && !digits.starts_with('0') {
                digits.insert(0, '0');
            }
            spec.pad(out, "", "", &digits, spec.precision.is_none());
        }
        b'x' | b'X' => {
            let value = read_unsigned(args);
            let digits = integer_digits(value, 16, spec.uppercase(), spec.precision);
            let prefix = match (spec.alt && value != 0, spec.uppercase()) {
                (false, _) => "",
                (true, false) => "0x",
                (true, true) => "0X",
            };
            spec.pad(out, "", prefix, &digits, spec.precision.is_none());
        }
        b'p' => {
            let digits = format!("{:x}", read_unsigned(args));
            spec.pad(out, "", "0x", &digits, false);
        }
        b'c' => {
            // one byte, as in C; bytes above 0x7f come out as their Latin-1 char
            let value = read_unsigned(args) as u8;
            spec.pad(out, "", "", &char::from(value).to_string(), false);
        }
        b's' => {
            let text = args.read_string();
            let text = match spec.precision {
                Some(max) => truncate_bytes(text, max),
                None => text,
            };
            spec.pad(out, "", "", text, false);
        }
        conversion => {
            let value = read_float(args);
            render_float(out, spec, conversion.to_ascii_lowercase(), value);
        }
    }
}

/// At most `max` bytes of `text`, cut back to a char boundary.
fn truncate_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}

fn read_signed(args: &mut RecordCursor<'_>) -> i64 {
    let Some(field) = args.read_field() else {
        return 0;
    };
    let b = field.bytes;
    match b.len() {
        1 => b[0] as i8 as i64,
        2 => i16::from_le_bytes([b[0], b[1]]) as i64,
        4 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64,
        8 => i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        _ => 0,
    }
}

fn read_unsigned(args: &mut RecordCursor<'_>) -> u64 {
    let Some(field) = args.read_field() else {
        return 0;
    };
    let b = field.bytes;
    match b.len() {
        1 => b[0] as u64,
        2 => u16::from_le_bytes([b[0], b[1]]) as u64,
        4 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as u64,
        8 => u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        _ => 0,
    }
}

fn read_float(args: &mut RecordCursor<'_>) -> f64 {
    let Some(field) = args.read_field() else {
        return 0.0;
    };
    let b = field.bytes;
    match b.len() {
        4 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
        8 => f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        _ => 0.0,
    }
}

fn integer_digits(value: u64, radix: u32, upper: bool, precision: Option<usize>) -> String {
    let mut digits = if precision == Some(0) && value == 0 {
        String::new()
    } else {
        match (radix, upper) {
            (8, _) => format!("{:o}", value),
            (16, false) => format!("{:x}", value),
            (16, true) => format!("{:X}", value),
            _ => value.to_string(),
        }
    };
    if let Some(min) = precision {
        if digits.len() < min {
            digits.insert_str(0, &"0".repeat(min - digits.len()));
        }
    }
    digits
}

fn render_float(out: &mut String, spec: &Spec, style: u8, value: f64) {
    let sign = spec.sign(value.is_sign_negative());
    let magnitude = value.abs();

    if !magnitude.is_finite() {
        let body = match (magnitude.is_nan(), spec.uppercase()) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        let sign = if magnitude.is_nan() { spec.sign(false) } else { sign };
        spec.pad(out, sign, "", body, false);
        return;
    }

    let (prefix, mut body) = match style {
        b'f' => ("", fixed(magnitude, spec.precision.unwrap_or(6), spec.alt)),
        b'e' => ("", exponential(magnitude, spec.precision.unwrap_or(6), spec.alt)),
        b'g' => ("", general(magnitude, spec.precision.unwrap_or(6), spec.alt)),
        _ => ("0x", hexadecimal(magnitude, spec.precision, spec.alt)),
    };
    let prefix = if spec.uppercase() {
        body.make_ascii_uppercase();
        prefix.to_ascii_uppercase()
    } else {
        prefix.to_string()
    };
    spec.pad(out, sign, &prefix, &body, true);
}

fn fixed(magnitude: f64, precision: usize, alt: bool) -> String {
    let mut text = format!("{:.*}", precision, magnitude);
    if alt && precision == 0 {
        text.push('.');
    }
    text
}

/// Splits Rust's `{:e}` output into mantissa and decimal exponent.
fn split_exponent(text: &str) -> (&str, i32) {
    match text.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse().unwrap_or(0)),
        None => (text, 0),
    }
}

fn exponential(magnitude: f64, precision: usize, alt: bool) -> String {
    let text = format!("{:.*e}", precision, magnitude);
    let (mantissa, exponent) = split_exponent(&text);
    let mut out = String::with_capacity(text.len() + 3);
    out.push_str(mantissa);
    if alt && precision == 0 {
        out.push('.');
    }
    let _ = write!(
        out,
        "e{}{:02}",
        if exponent < 0 { '-' } else { '+' },
        exponent.unsigned_abs()
    );
    out
}

fn general(magnitude: f64, precision: usize, alt: bool) -> String {
    let precision = precision.max(1);
    let probe = format!("{:.*e}", precision - 1, magnitude);
    let (_, exponent) = split_exponent(&probe);

    if exponent >= -4 && (exponent as i64) < precision as i64 {
        let decimals = (precision as i64 - 1 - exponent as i64) as usize;
        let text = fixed(magnitude, decimals, alt);
        if alt {
            text
        } else {
            strip_trailing_zeros(&text).to_string()
        }
    } else {
        let text = exponential(magnitude, precision - 1, alt);
        if alt {
            return text;
        }
        match text.split_once('e') {
            Some((mantissa, exponent)) => {
                format!("{}e{}", strip_trailing_zeros(mantissa), exponent)
            }
            None => text,
        }
    }
}

fn strip_trailing_zeros(text: &str) -> &str {
    if !text.contains('.') {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.')
}

fn hexadecimal(magnitude: f64, precision: Option<usize>, alt: bool) -> String {
    const MANTISSA_BITS: u32 = 52;
    const NIBBLES: usize = 13;

    let bits = magnitude.to_bits();
    let biased = ((bits >> MANTISSA_BITS) & 0x7ff) as i32;
    let mut mantissa = bits & ((1u64 << MANTISSA_BITS) - 1);

    let (mut lead, exponent) = match (biased, mantissa) {
        (0, 0) => (0u64, 0),
        (0, _) => (0u64, -1022),
        _ => (1u64, biased - 1023),
    };

    let nibbles = match precision {
        Some(wanted) if wanted < NIBBLES => {
            let shift = 4 * (NIBBLES - wanted) as u32;
            let kept = mantissa >> shift;
            let rest = mantissa & ((1u64 << shift) - 1);
            let half = 1u64 << (shift - 1);
            let last_odd = if wanted == 0 { lead & 1 == 1 } else { kept & 1 == 1 };
            let round_up = rest > half || (rest == half && last_odd);
            let mut kept = kept + round_up as u64;
            if wanted == 0 {
                lead += kept;
                kept = 0;
            } else if kept >> (4 * wanted as u32) != 0 {
                lead += 1;
                kept &= (1u64 << (4 * wanted as u32)) - 1;
            }
            mantissa = kept;
            wanted
        }
        Some(wanted) => wanted,
        None => {
            let mut count = NIBBLES;
            while count > 0 && mantissa & 0xf == 0 {
                mantissa >>= 4;
                count -= 1;
            }
            count
        }
    };

    let mut out = format!("{:x}", lead);
    if nibbles > 0 || alt {
        out.push('.');
    }
    if nibbles > 0 {
        let shown = nibbles.min(NIBBLES);
        let _ = write!(out, "{:0width$x}", mantissa, width = shown);
        out.extend(std::iter::repeat('0').take(nibbles - shown));
    }
    let _ = write!(out, "p{}{}", if exponent < 0 { '-' } else { '+' }, exponent.unsigned_abs());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_format::{encode_record, EventSlot, RecordEncoder};

    fn render_with<F: FnOnce(&mut RecordEncoder<'_>)>(template: &str, fill: F) -> String {
        let mut slot = EventSlot::EMPTY;
        encode_record(&mut slot, EVT_PRINTF, 0, 0, |enc| {
            enc.push_str(template);
            fill(enc);
        });
        let mut cursor = RecordCursor::new(slot.as_bytes());
        format_message(&mut cursor).unwrap_or_default()
    }

    #[test]
    fn test_general_notation() {
        assert_eq!(general(100000.0, 6, false), "100000");
        assert_eq!(general(1000000.0, 6, false), "1e+06");
        assert_eq!(general(0.0001, 6, false), "0.0001");
        assert_eq!(general(0.00001, 6, false), "1e-05");
        assert_eq!(general(2.5, 6, true), "2.50000");
        assert_eq!(general(0.0, 6, false), "0");
    }

    #[test]
    fn test_exponential_notation() {
        assert_eq!(exponential(1234.5, 2, false), "1.23e+03");
        assert_eq!(exponential(1.0e-300, 1, false), "1.0e-300");
        assert_eq!(exponential(0.0, 6, false), "0.000000e+00");
    }

    #[test]
    fn test_hexadecimal_float() {
        assert_eq!(hexadecimal(1.0, None, false), "1p+0");
        assert_eq!(hexadecimal(0.5, None, false), "1p-1");
        assert_eq!(hexadecimal(1.5, None, false), "1.8p+0");
        assert_eq!(hexadecimal(0.0, None, false), "0p+0");
        assert_eq!(hexadecimal(1.5, Some(3), false), "1.800p+0");
        assert_eq!(hexadecimal(1.5, Some(0), false), "2p+0");
    }

    #[test]
    fn test_integer_precision() {
        assert_eq!(render_with("[%.3d]", |e| e.push_scalar(7i32)), "[007]");
        assert_eq!(render_with("[%.0d]", |e| e.push_scalar(0i32)), "[]");
        assert_eq!(render_with("[%#o]", |e| e.push_scalar(8u32)), "[010]");
        assert_eq!(render_with("[%#x]", |e| e.push_scalar(0u32)), "[0]");
    }

    #[test]
    fn test_unterminated_specifier_is_copied() {
        assert_eq!(render_with("100%", |_| {}), "100%");
        assert_eq!(render_with("rate %-5", |_| {}), "rate %-5");
    }
}
