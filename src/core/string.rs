//! PHP string values and numeric-string scanning.
//!
//! PHP strings come in two flavors here: byte-oriented ("binary") strings,
//! which is what scripts produce by default, and character-oriented
//! ("unicode") strings produced by hosts that hand us decoded text. Both
//! are immutable once constructed; `StringBuilder` is the distinct growable
//! form used while a string is being assembled.
//!
//! The numeric-string scanner implements PHP's lenient parse: leading
//! whitespace, optional sign, digit run, optional fraction and exponent, or
//! a `0x` hex integer. Trailing garbage does not fail the scan; the numeric
//! prefix's value is used and the scan is flagged as not fully numeric.
//!
//! Reference: $PHP_SRC_PATH/Zend/zend_operators.c - is_numeric_string_ex

use std::borrow::Cow;
use std::cmp::Ordering;
use std::rc::Rc;

/// Immutable PHP string. Cheap to clone (shared buffer).
#[derive(Debug, Clone)]
pub enum StringValue {
    /// Byte-oriented string; the default flavor.
    Binary(Rc<Vec<u8>>),
    /// Character-oriented string handed in by the host.
    Unicode(Rc<String>),
}

impl StringValue {
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        StringValue::Binary(Rc::new(bytes.into()))
    }

    pub fn unicode(text: impl Into<String>) -> Self {
        StringValue::Unicode(Rc::new(text.into()))
    }

    pub fn empty() -> Self {
        StringValue::Binary(Rc::new(Vec::new()))
    }

    pub fn is_unicode(&self) -> bool {
        matches!(self, StringValue::Unicode(_))
    }

    /// Raw bytes of the string (UTF-8 for the unicode flavor).
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            StringValue::Binary(b) => b,
            StringValue::Unicode(s) => s.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Canonical character decode. Binary strings decode lossily; this is
    /// the single funnel through which cross-flavor comparison goes.
    pub fn to_unicode_lossy(&self) -> Cow<'_, str> {
        match self {
            StringValue::Binary(b) => String::from_utf8_lossy(b),
            StringValue::Unicode(s) => Cow::Borrowed(s.as_str()),
        }
    }

    /// Byte-wise ordering; cross-flavor pairs compare their canonical
    /// decode so that equal text is equal regardless of flavor.
    pub fn cmp_with(&self, other: &StringValue) -> Ordering {
        match (self, other) {
            (StringValue::Binary(a), StringValue::Binary(b)) => a.cmp(b),
            (StringValue::Unicode(a), StringValue::Unicode(b)) => a.cmp(b),
            _ => self.to_unicode_lossy().cmp(&other.to_unicode_lossy()),
        }
    }

    pub fn scan_numeric(&self) -> NumericScan {
        parse_numeric_prefix(self.as_bytes())
    }

    /// True for a string `is_numeric()` would accept: the numeric prefix
    /// must consume the whole string (leading whitespace allowed).
    pub fn is_numeric(&self) -> bool {
        let scan = self.scan_numeric();
        scan.matched && scan.fully_numeric
    }

    pub fn to_long(&self) -> i64 {
        match self.scan_numeric().value {
            Num::Int(i) => i,
            Num::Float(f) => double_to_long(f),
        }
    }

    pub fn to_double(&self) -> f64 {
        match self.scan_numeric().value {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

impl PartialEq for StringValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_with(other) == Ordering::Equal
    }
}

impl Eq for StringValue {}

impl From<&str> for StringValue {
    fn from(s: &str) -> Self {
        StringValue::binary(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for StringValue {
    fn from(b: &[u8]) -> Self {
        StringValue::binary(b.to_vec())
    }
}

/// Growable string under construction. Freezing produces an immutable
/// `StringValue`; the builder itself is never stored in a value slot.
#[derive(Debug, Default)]
pub struct StringBuilder {
    buf: Vec<u8>,
}

impl StringBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn append_str(&mut self, s: &StringValue) -> &mut Self {
        self.append_bytes(s.as_bytes())
    }

    pub fn append_byte(&mut self, b: u8) -> &mut Self {
        self.buf.push(b);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> StringValue {
        StringValue::Binary(Rc::new(self.buf))
    }
}

/// Result of scanning a string for a leading number.
#[derive(Debug, Clone, Copy)]
pub struct NumericScan {
    pub value: Num,
    /// Bytes consumed, including leading whitespace.
    pub consumed: usize,
    /// True if at least one digit was seen.
    pub matched: bool,
    /// True if nothing followed the numeric prefix.
    pub fully_numeric: bool,
}

/// A parsed number: integer when the text had no fraction or exponent and
/// fit in i64, float otherwise.
#[derive(Debug, Clone, Copy)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn to_long(self) -> i64 {
        match self {
            Num::Int(i) => i,
            Num::Float(f) => double_to_long(f),
        }
    }

    pub fn to_double(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Num::Float(_))
    }
}

/// PHP float-to-int cast: truncation toward zero, zero for non-finite.
pub fn double_to_long(f: f64) -> i64 {
    if f.is_nan() || f.is_infinite() {
        0
    } else if f >= i64::MAX as f64 {
        i64::MAX
    } else if f <= i64::MIN as f64 {
        i64::MIN
    } else {
        f as i64
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Scan a leading number off `bytes`.
///
/// Grammar: `[ws] [+-] digits [. digits] [eE [+-] digits]` or
/// `[ws] [+-] 0x hexdigits`. The scan stops at the first byte that cannot
/// extend the number; whatever was matched so far is the value.
pub fn parse_numeric_prefix(bytes: &[u8]) -> NumericScan {
    let mut pos = 0;
    while pos < bytes.len() && is_space(bytes[pos]) {
        pos += 1;
    }

    let mut negative = false;
    if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
        negative = bytes[pos] == b'-';
        pos += 1;
    }

    // Hex integer scan: 0x prefix must be followed by at least one digit.
    if pos + 2 < bytes.len()
        && bytes[pos] == b'0'
        && (bytes[pos + 1] == b'x' || bytes[pos + 1] == b'X')
        && bytes[pos + 2].is_ascii_hexdigit()
    {
        let mut value: i64 = 0;
        pos += 2;
        while pos < bytes.len() && bytes[pos].is_ascii_hexdigit() {
            let digit = (bytes[pos] as char).to_digit(16).unwrap() as i64;
            value = value.wrapping_mul(16).wrapping_add(digit);
            pos += 1;
        }
        if negative {
            value = value.wrapping_neg();
        }
        return NumericScan {
            value: Num::Int(value),
            consumed: pos,
            matched: true,
            fully_numeric: pos == bytes.len(),
        };
    }

    let digits_start = pos;
    let mut int_digits = 0;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        int_digits += 1;
        pos += 1;
    }

    let mut is_float = false;
    if pos < bytes.len() && bytes[pos] == b'.' {
        // A bare "." with no digits on either side is not a number.
        let frac_start = pos + 1;
        let mut frac = frac_start;
        while frac < bytes.len() && bytes[frac].is_ascii_digit() {
            frac += 1;
        }
        if int_digits > 0 || frac > frac_start {
            is_float = true;
            pos = frac;
        }
    }

    let digits_seen = int_digits > 0 || is_float;
    if !digits_seen {
        return NumericScan {
            value: Num::Int(0),
            consumed: 0,
            matched: false,
            fully_numeric: false,
        };
    }

    // Exponent only counts if at least one digit follows it.
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            while exp < bytes.len() && bytes[exp].is_ascii_digit() {
                exp += 1;
            }
            is_float = true;
            pos = exp;
        }
    }

    let text = &bytes[digits_start..pos];
    // The matched slice is ASCII digits and punctuation, always valid UTF-8.
    let text = std::str::from_utf8(text).unwrap_or("0");

    let value = if is_float {
        let f: f64 = text.parse().unwrap_or(0.0);
        Num::Float(if negative { -f } else { f })
    } else {
        match text.parse::<i64>() {
            Ok(i) => Num::Int(if negative { -i } else { i }),
            // Integer overflow promotes to float, like an oversized literal.
            Err(_) => {
                let f: f64 = text.parse().unwrap_or(0.0);
                Num::Float(if negative { -f } else { f })
            }
        }
    };

    NumericScan {
        value,
        consumed: pos,
        matched: true,
        fully_numeric: pos == bytes.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_long(s: &str) -> i64 {
        parse_numeric_prefix(s.as_bytes()).value.to_long()
    }

    #[test]
    fn plain_integers() {
        assert_eq!(scan_long("42"), 42);
        assert_eq!(scan_long("-17"), -17);
        assert_eq!(scan_long("+3"), 3);
        assert_eq!(scan_long("  12"), 12);
    }

    #[test]
    fn trailing_garbage_keeps_prefix() {
        let scan = parse_numeric_prefix(b"12abc");
        assert_eq!(scan.value.to_long(), 12);
        assert!(scan.matched);
        assert!(!scan.fully_numeric);

        assert_eq!(scan_long("3.5kg"), 3);
    }

    #[test]
    fn non_numeric_yields_zero() {
        let scan = parse_numeric_prefix(b"abc");
        assert!(!scan.matched);
        assert_eq!(scan.value.to_long(), 0);
    }

    #[test]
    fn floats_and_exponents() {
        let scan = parse_numeric_prefix(b"1.5");
        assert!(scan.value.is_float());
        assert_eq!(scan.value.to_double(), 1.5);

        assert_eq!(parse_numeric_prefix(b"1e3").value.to_double(), 1000.0);
        assert_eq!(parse_numeric_prefix(b"2E-1").value.to_double(), 0.2);
        assert_eq!(parse_numeric_prefix(b".5").value.to_double(), 0.5);
        // "1e" has no exponent digits; the "e" is trailing garbage.
        let scan = parse_numeric_prefix(b"1e");
        assert_eq!(scan.value.to_long(), 1);
        assert!(!scan.fully_numeric);
    }

    #[test]
    fn hex_scan() {
        assert_eq!(scan_long("0x1A"), 26);
        assert_eq!(scan_long("0XFF"), 255);
        assert!(parse_numeric_prefix(b"0xFF").fully_numeric);
        // "0x" with no digit is just "0" followed by garbage.
        let scan = parse_numeric_prefix(b"0x");
        assert_eq!(scan.value.to_long(), 0);
        assert!(!scan.fully_numeric);
    }

    #[test]
    fn overflow_promotes_to_float() {
        let scan = parse_numeric_prefix(b"99999999999999999999");
        assert!(scan.value.is_float());
    }

    #[test]
    fn is_numeric_requires_full_match() {
        assert!(StringValue::from("10").is_numeric());
        assert!(StringValue::from(" 1.5").is_numeric());
        assert!(!StringValue::from("10 ").is_numeric());
        assert!(!StringValue::from("12abc").is_numeric());
        assert!(!StringValue::from("").is_numeric());
    }

    #[test]
    fn cross_flavor_compare() {
        let bin = StringValue::binary(b"caf\xc3\xa9".to_vec());
        let uni = StringValue::unicode("café");
        assert_eq!(bin, uni);
        assert_eq!(bin.cmp_with(&uni), Ordering::Equal);
    }

    #[test]
    fn builder_freezes() {
        let mut b = StringBuilder::new();
        b.append_bytes(b"ab").append_byte(b'c');
        let s = b.finish();
        assert_eq!(s.as_bytes(), b"abc");
    }
}
