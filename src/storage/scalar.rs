use std::fmt;

use nom::{
    character::complete::{char, digit1},
    combinator::{all_consuming, opt, recognize},
    IResult, Parser,
};

use crate::error::{DbError, DbResult};

// ┌────────────────────────────────────────────────────────────┐
// │ Offset │ Length │ Description                              │
// │────────┼────────┼──────────────────────────────────────────│
// │   0    │   1    │ TYPE_TAG (0 = bool, 1 = number, 2 = str) │
// │   1    │   1    │ bool: 0 or 1                             │
// │   1    │   8    │ number: f64, big-endian                  │
// │   1    │   N    │ str: raw UTF-8 to the end of the value   │
// └────────────────────────────────────────────────────────────┘

const TAG_BOOLEAN: u8 = 0x00;
const TAG_NUMBER: u8 = 0x01;
const TAG_STRING: u8 = 0x02;

/// A value as stored under a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Scalar {
    /// Classify a raw string the way `set` receives it: `true`/`false`
    /// become booleans, decimal literals become numbers, anything else stays
    /// a string.
    pub fn from_input(input: &str) -> Self {
        match input {
            "true" => return Scalar::Boolean(true),
            "false" => return Scalar::Boolean(false),
            _ => {}
        }
        if numeric_literal(input).is_ok() {
            if let Ok(n) = input.parse::<f64>() {
                return Scalar::Number(n);
            }
        }
        Scalar::String(input.to_string())
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Scalar::Boolean(b) => {
                buf.push(TAG_BOOLEAN);
                buf.push(if *b { 1 } else { 0 });
            }
            Scalar::Number(n) => {
                buf.push(TAG_NUMBER);
                buf.extend(&n.to_be_bytes());
            }
            Scalar::String(s) => {
                buf.push(TAG_STRING);
                buf.extend(s.as_bytes());
            }
        }
        buf
    }

    /// Decode a stored value. An unknown tag reads the remainder as text.
    pub fn deserialize(bytes: &[u8]) -> DbResult<Scalar> {
        let (&tag, rest) = bytes
            .split_first()
            .ok_or_else(|| DbError::InvalidValue("empty value".into()))?;
        match tag {
            TAG_BOOLEAN => match rest.first() {
                Some(b) => Ok(Scalar::Boolean(*b == 1)),
                None => Err(DbError::InvalidValue("boolean without payload".into())),
            },
            TAG_NUMBER => {
                let raw: [u8; 8] = rest
                    .get(..8)
                    .and_then(|b| b.try_into().ok())
                    .ok_or_else(|| DbError::InvalidValue(format!("number needs 8 bytes, got {}", rest.len())))?;
                Ok(Scalar::Number(f64::from_be_bytes(raw)))
            }
            _ => Ok(Scalar::String(String::from_utf8_lossy(rest).to_string())),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::String(s) => write!(f, "{}", s),
        }
    }
}

/// `-?digits(.digits)?` and nothing else.
fn numeric_literal(input: &str) -> IResult<&str, &str> {
    all_consuming(recognize((opt(char('-')), digit1, opt((char('.'), digit1))))).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_layouts() {
        let buf = Scalar::Number(1.0).serialize();
        assert_eq!(buf.len(), 9);
        assert_eq!(buf[0], TAG_NUMBER);
        assert_eq!(f64::from_be_bytes(buf[1..].try_into().unwrap()), 1.0);

        let buf = Scalar::String("a".into()).serialize();
        assert_eq!(buf, vec![TAG_STRING, b'a']);

        assert_eq!(Scalar::Boolean(true).serialize(), vec![TAG_BOOLEAN, 1]);
        assert_eq!(Scalar::Boolean(false).serialize(), vec![TAG_BOOLEAN, 0]);
    }

    #[test]
    fn deserialize_reads_back_each_type() {
        for v in [
            Scalar::Number(-12.5),
            Scalar::String("héllo wörld".into()),
            Scalar::String(String::new()),
            Scalar::Boolean(true),
            Scalar::Boolean(false),
        ] {
            assert_eq!(Scalar::deserialize(&v.serialize()).unwrap(), v);
        }
    }

    #[test]
    fn deserialize_rejects_truncated_values() {
        assert!(Scalar::deserialize(&[]).is_err());
        assert!(Scalar::deserialize(&[TAG_BOOLEAN]).is_err());
        assert!(Scalar::deserialize(&[TAG_NUMBER, 0, 0, 0]).is_err());
        assert_eq!(
            Scalar::deserialize(&[0x7f, b'x']).unwrap(),
            Scalar::String("x".into())
        );
    }

    #[test]
    fn classifies_input_strings() {
        assert_eq!(Scalar::from_input("true"), Scalar::Boolean(true));
        assert_eq!(Scalar::from_input("false"), Scalar::Boolean(false));
        assert_eq!(Scalar::from_input("True"), Scalar::String("True".into()));
        assert_eq!(Scalar::from_input("42"), Scalar::Number(42.0));
        assert_eq!(Scalar::from_input("-7"), Scalar::Number(-7.0));
        assert_eq!(Scalar::from_input("3.25"), Scalar::Number(3.25));
        assert_eq!(Scalar::from_input("1e5"), Scalar::String("1e5".into()));
        assert_eq!(Scalar::from_input("12abc"), Scalar::String("12abc".into()));
        assert_eq!(Scalar::from_input("-"), Scalar::String("-".into()));
        assert_eq!(Scalar::from_input("1."), Scalar::String("1.".into()));
        assert_eq!(Scalar::from_input(""), Scalar::String(String::new()));
    }

    #[test]
    fn display_matches_input_form() {
        assert_eq!(Scalar::Number(42.0).to_string(), "42");
        assert_eq!(Scalar::Number(0.1).to_string(), "0.1");
        assert_eq!(Scalar::Boolean(true).to_string(), "true");
        assert_eq!(Scalar::String("hi".into()).to_string(), "hi");
        for n in [0.1, -3.75, 1e-7, 123456789.0, f64::MAX] {
            assert_eq!(Scalar::from_input(&Scalar::Number(n).to_string()), Scalar::Number(n));
        }
    }
}
