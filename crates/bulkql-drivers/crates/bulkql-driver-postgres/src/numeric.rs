//! Binary NUMERIC codec
//!
//! PostgreSQL sends NUMERIC as base-10000 digit groups:
//! `ndigits, weight, sign, dscale` followed by `ndigits` big-endian i16 groups.

use bytes::{BufMut, BytesMut};
use postgres_types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use std::error::Error;

type BoxError = Box<dyn Error + Sync + Send>;

const SIGN_POSITIVE: u16 = 0x0000;
const SIGN_NEGATIVE: u16 = 0x4000;
const SIGN_NAN: u16 = 0xC000;

/// A NUMERIC value carried as its decimal text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgNumeric(pub String);

impl PgNumeric {
    pub fn into_inner(self) -> String {
        self.0
    }
}

pub(crate) fn decode_numeric(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("invalid NUMERIC payload: too short".into());
    }

    let ndigits = i16::from_be_bytes([raw[0], raw[1]]).max(0) as usize;
    let weight = i16::from_be_bytes([raw[2], raw[3]]);
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = i16::from_be_bytes([raw[6], raw[7]]).max(0) as usize;

    if raw.len() < 8 + ndigits * 2 {
        return Err("invalid NUMERIC payload: truncated digits".into());
    }
    if sign == SIGN_NAN {
        return Ok("NaN".to_string());
    }

    let mut digits = Vec::with_capacity(ndigits);
    for index in 0..ndigits {
        let offset = 8 + index * 2;
        let group = u16::from_be_bytes([raw[offset], raw[offset + 1]]);
        if group > 9999 {
            return Err("invalid NUMERIC payload: group out of range".into());
        }
        digits.push(group);
    }

    let integer_groups = if weight >= 0 { weight as usize + 1 } else { 0 };

    let mut integer_text = String::new();
    for index in 0..integer_groups {
        let group = digits.get(index).copied().unwrap_or(0);
        if integer_text.is_empty() {
            if group != 0 {
                integer_text.push_str(&group.to_string());
            }
        } else {
            integer_text.push_str(&format!("{group:04}"));
        }
    }
    if integer_text.is_empty() {
        integer_text.push('0');
    }

    let mut fraction_text = String::new();
    if dscale > 0 {
        // Groups skipped between the decimal point and the first stored group
        if weight < -1 {
            fraction_text.push_str(&"0000".repeat((-(weight as i32) - 1) as usize));
        }
        for group in digits.iter().skip(integer_groups.min(digits.len())) {
            fraction_text.push_str(&format!("{group:04}"));
        }
        if fraction_text.len() < dscale {
            fraction_text.push_str(&"0".repeat(dscale - fraction_text.len()));
        } else {
            fraction_text.truncate(dscale);
        }
    }

    let mut output = String::new();
    if sign == SIGN_NEGATIVE && digits.iter().any(|&group| group != 0) {
        output.push('-');
    }
    output.push_str(&integer_text);
    if !fraction_text.is_empty() {
        output.push('.');
        output.push_str(&fraction_text);
    }
    Ok(output)
}

pub(crate) fn encode_numeric(text: &str, out: &mut BytesMut) -> Result<(), BoxError> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("nan") {
        out.put_i16(0);
        out.put_i16(0);
        out.put_u16(SIGN_NAN);
        out.put_u16(0);
        return Ok(());
    }

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(format!("invalid NUMERIC literal: {:?}", text).into());
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid NUMERIC literal: {:?}", text).into());
    }

    let int_part = int_part.trim_start_matches('0');
    let int_pad = (4 - int_part.len() % 4) % 4;
    let frac_pad = (4 - frac_part.len() % 4) % 4;

    let mut padded = String::with_capacity(int_pad + int_part.len() + frac_part.len() + frac_pad);
    padded.push_str(&"0".repeat(int_pad));
    padded.push_str(int_part);
    padded.push_str(frac_part);
    padded.push_str(&"0".repeat(frac_pad));

    let mut groups = padded
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0i16, |acc, digit| acc * 10 + i16::from(digit - b'0'))
        })
        .collect::<Vec<_>>();
    let mut weight = ((int_pad + int_part.len()) / 4) as i16 - 1;

    let leading_zeros = groups.iter().take_while(|&&group| group == 0).count();
    groups.drain(..leading_zeros);
    weight -= leading_zeros as i16;
    while groups.last() == Some(&0) {
        groups.pop();
    }
    if groups.is_empty() {
        weight = 0;
    }

    out.put_i16(groups.len() as i16);
    out.put_i16(weight);
    out.put_u16(if negative && !groups.is_empty() {
        SIGN_NEGATIVE
    } else {
        SIGN_POSITIVE
    });
    out.put_u16(frac_part.len() as u16);
    for group in groups {
        out.put_i16(group);
    }
    Ok(())
}

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        decode_numeric(raw).map(Self)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

impl ToSql for PgNumeric {
    fn to_sql(&self, _: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        encode_numeric(&self.0, out)?;
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }

    to_sql_checked!();
}
