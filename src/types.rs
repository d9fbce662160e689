//! Numeric and message types that have no direct counterpart in `std`.
//!
//! These carry the payloads for the bignum (tags 2/3), decimal fraction (tag 4),
//! rational (tag 30) and MIME message (tag 36) encoders.

use std::fmt;
use std::str::FromStr;

/// Error returned when a numeric literal cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid numeric literal: {0:?}")]
pub struct ParseNumberError(String);

/// Arbitrary-precision signed integer
///
/// Stored as a sign and a minimal big-endian magnitude. Zero has an empty
/// magnitude and is never negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BigInt {
    negative: bool,
    magnitude: Vec<u8>,
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

impl BigInt {
    /// Build from a sign and a big-endian magnitude (leading zeros allowed)
    pub fn from_bytes_be(negative: bool, magnitude: &[u8]) -> Self {
        let magnitude = strip_leading_zeros(magnitude).to_vec();
        BigInt {
            negative: negative && !magnitude.is_empty(),
            magnitude,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_empty()
    }

    /// Minimal big-endian magnitude (absolute value)
    pub fn magnitude(&self) -> &[u8] {
        &self.magnitude
    }

    /// Returns the value as an `i128`, if it fits
    pub fn to_i128(&self) -> Option<i128> {
        if self.magnitude.len() > 16 {
            return None;
        }
        let mut buf = [0u8; 16];
        buf[16 - self.magnitude.len()..].copy_from_slice(&self.magnitude);
        let m = u128::from_be_bytes(buf);
        if self.negative {
            0i128.checked_sub_unsigned(m)
        } else {
            i128::try_from(m).ok()
        }
    }

    /// The unsigned argument CBOR carries for this integer: the magnitude for
    /// non-negative values, `-1 - value` for negative ones. Minimal big-endian.
    pub fn cbor_argument(&self) -> Vec<u8> {
        if !self.negative {
            return self.magnitude.clone();
        }
        let mut arg = self.magnitude.clone();
        for byte in arg.iter_mut().rev() {
            if *byte == 0 {
                *byte = 0xff;
            } else {
                *byte -= 1;
                break;
            }
        }
        strip_leading_zeros(&arg).to_vec()
    }

    // magnitude = magnitude * mul + add
    fn mul_add_small(&mut self, mul: u8, add: u8) {
        let mut carry = add as u32;
        for byte in self.magnitude.iter_mut().rev() {
            let v = (*byte as u32) * (mul as u32) + carry;
            *byte = v as u8;
            carry = v >> 8;
        }
        while carry > 0 {
            self.magnitude.insert(0, carry as u8);
            carry >>= 8;
        }
        let stripped = strip_leading_zeros(&self.magnitude).len();
        self.magnitude.drain(..self.magnitude.len() - stripped);
    }

    fn from_digits(negative: bool, digits: &str) -> Self {
        let mut value = BigInt::default();
        for d in digits.bytes() {
            value.mul_add_small(10, d - b'0');
        }
        value.negative = negative && !value.is_zero();
        value
    }
}

impl FromStr for BigInt {
    type Err = ParseNumberError;

    /// Parses an optionally signed base-10 integer
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, digits) = split_sign(s);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseNumberError(s.to_string()));
        }
        Ok(BigInt::from_digits(negative, digits))
    }
}

macro_rules! impl_bigint_from_unsigned {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for BigInt {
                fn from(v: $ty) -> Self {
                    BigInt::from_bytes_be(false, &(v as u128).to_be_bytes())
                }
            }
        )*
    };
}

macro_rules! impl_bigint_from_signed {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for BigInt {
                fn from(v: $ty) -> Self {
                    let v = v as i128;
                    BigInt::from_bytes_be(v < 0, &v.unsigned_abs().to_be_bytes())
                }
            }
        )*
    };
}

impl_bigint_from_unsigned!(u8, u16, u32, u64, u128, usize);
impl_bigint_from_signed!(i8, i16, i32, i64, i128, isize);

fn split_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else {
        (false, s.strip_prefix('+').unwrap_or(s))
    }
}

/// Arbitrary-precision decimal number: `mantissa * 10^exponent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decimal {
    Finite { mantissa: BigInt, exponent: i64 },
    NaN,
    Infinity,
    NegInfinity,
}

impl Decimal {
    pub fn new(mantissa: impl Into<BigInt>, exponent: i64) -> Self {
        Decimal::Finite {
            mantissa: mantissa.into(),
            exponent,
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Decimal::NaN)
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Decimal::Infinity | Decimal::NegInfinity)
    }
}

impl FromStr for Decimal {
    type Err = ParseNumberError;

    /// Accepts `[+-]digits[.digits][(e|E)[+-]digits]` as well as `NaN`,
    /// `Infinity` and `Inf` (case-insensitive, optionally signed).
    /// Trailing zeros are significant and kept in the mantissa.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseNumberError(s.to_string());
        let (negative, body) = split_sign(s.trim());

        match body.to_ascii_lowercase().as_str() {
            "nan" => return Ok(Decimal::NaN),
            "inf" | "infinity" if negative => return Ok(Decimal::NegInfinity),
            "inf" | "infinity" => return Ok(Decimal::Infinity),
            _ => {}
        }

        let (number, exponent) = match body.find(['e', 'E']) {
            Some(pos) => {
                let exponent: i64 = body[pos + 1..].parse().map_err(|_| err())?;
                (&body[..pos], exponent)
            }
            None => (body, 0),
        };
        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        let digits = format!("{int_part}{frac_part}");
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let exponent = i64::try_from(frac_part.len())
            .ok()
            .and_then(|frac| exponent.checked_sub(frac))
            .ok_or_else(err)?;

        Ok(Decimal::Finite {
            mantissa: BigInt::from_digits(negative, &digits),
            exponent,
        })
    }
}

impl From<rust_decimal::Decimal> for Decimal {
    fn from(d: rust_decimal::Decimal) -> Self {
        Decimal::new(d.mantissa(), -i64::from(d.scale()))
    }
}

/// Rational number in lowest terms with a positive denominator
///
/// Both components are `i128`; a fraction whose reduced form does not fit
/// (e.g. `i128::MIN / -1`) cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    numerator: i128,
    denominator: i128,
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl Rational {
    /// Returns `None` for a zero denominator or when the reduced fraction
    /// does not fit in `i128`
    pub fn new(numerator: i128, denominator: i128) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let negative = (numerator < 0) != (denominator < 0);
        let (n, d) = (numerator.unsigned_abs(), denominator.unsigned_abs());
        let g = gcd(n, d);
        let (n, d) = (n / g, d / g);
        let numerator = if negative {
            0i128.checked_sub_unsigned(n)?
        } else {
            i128::try_from(n).ok()?
        };
        Some(Rational {
            numerator,
            denominator: i128::try_from(d).ok()?,
        })
    }

    pub fn numerator(&self) -> i128 {
        self.numerator
    }

    pub fn denominator(&self) -> i128 {
        self.denominator
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// A MIME message: ordered headers followed by a body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeMessage {
    headers: Vec<(String, String)>,
    body: String,
}

impl MimeMessage {
    pub fn new(body: impl Into<String>) -> Self {
        MimeMessage {
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Serialized form: one `Name: value` line per header, a blank line, then the body
    pub fn as_string(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bigint_from_primitives() {
        assert_eq!(BigInt::from(0u8).magnitude(), &[] as &[u8]);
        assert_eq!(BigInt::from(256u32).magnitude(), &[1, 0]);
        let min = BigInt::from(i128::MIN);
        assert!(min.is_negative());
        assert_eq!(min.to_i128(), Some(i128::MIN));
        assert_eq!(BigInt::from(-5i8).to_i128(), Some(-5));
    }

    #[test]
    fn test_bigint_parse() {
        let v: BigInt = "18446744073709551616".parse().unwrap();
        assert_eq!(v.magnitude(), &[1, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(!v.is_negative());

        let zero: BigInt = "-000".parse().unwrap();
        assert!(zero.is_zero());
        assert!(!zero.is_negative());

        assert!("12a".parse::<BigInt>().is_err());
        assert!("-".parse::<BigInt>().is_err());
    }

    #[test]
    fn test_bigint_cbor_argument() {
        assert_eq!(BigInt::from(-1).cbor_argument(), Vec::<u8>::new());
        assert_eq!(BigInt::from(-256).cbor_argument(), vec![0xff]);
        assert_eq!(BigInt::from(-257).cbor_argument(), vec![1, 0]);
        let big: BigInt = "-18446744073709551617".parse().unwrap();
        assert_eq!(big.cbor_argument(), vec![1, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decimal_parse() {
        assert_eq!("273.15".parse::<Decimal>().unwrap(), Decimal::new(27315, -2));
        assert_eq!("-1.50".parse::<Decimal>().unwrap(), Decimal::new(-150, -2));
        assert_eq!("1E+3".parse::<Decimal>().unwrap(), Decimal::new(1, 3));
        assert_eq!("2.5e-3".parse::<Decimal>().unwrap(), Decimal::new(25, -4));
        assert!("NaN".parse::<Decimal>().unwrap().is_nan());
        assert_eq!("-Infinity".parse::<Decimal>().unwrap(), Decimal::NegInfinity);
        assert_eq!("inf".parse::<Decimal>().unwrap(), Decimal::Infinity);
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_decimal_from_rust_decimal() {
        let d = rust_decimal::Decimal::new(-12345, 3);
        assert_eq!(Decimal::from(d), Decimal::new(-12345, -3));
    }

    #[test]
    fn test_rational_normalizes() {
        let r = Rational::new(2, -6).unwrap();
        assert_eq!((r.numerator(), r.denominator()), (-1, 3));
        assert_eq!(Rational::new(0, 5).unwrap().denominator(), 1);
        assert!(Rational::new(1, 0).is_none());
        assert_eq!(r.to_string(), "-1/3");
    }

    #[test]
    fn test_rational_range() {
        // Reduction happens before the range check
        let one = Rational::new(i128::MIN, i128::MIN).unwrap();
        assert_eq!((one.numerator(), one.denominator()), (1, 1));
        let half = Rational::new(i128::MIN, 2).unwrap();
        assert_eq!(half.numerator(), i128::MIN / 2);
        let min = Rational::new(i128::MIN, 1).unwrap();
        assert_eq!(min.numerator(), i128::MIN);

        // 2^127 has no i128 representation
        assert!(Rational::new(i128::MIN, -1).is_none());
        assert!(Rational::new(1, i128::MIN).is_none());
        assert_eq!(Rational::new(0, -7).unwrap().to_string(), "0/1");
    }

    #[test]
    fn test_mime_as_string() {
        let msg = MimeMessage::new("Hello")
            .with_header("Content-Type", "text/plain")
            .with_header("Subject", "greeting");
        assert_eq!(
            msg.as_string(),
            "Content-Type: text/plain\nSubject: greeting\n\nHello"
        );
    }
}
