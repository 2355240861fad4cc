//! Format and checksum predicates for nation-specific identifiers.
//!
//! All validators are pure `&str -> bool` functions: no allocation beyond
//! scratch, no errors. Callers decide what a rejection means.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FISCAL_CODE_SHAPE: Regex =
        Regex::new(r"^[A-Z]{6}\d{2}[A-Z]\d{2}[A-Z]\d{3}[A-Z]$").unwrap();
    static ref EMAIL_SHAPE: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap();
}

const CHECKSUM_LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Positional value of a character at an odd position (1-indexed) of a
/// Codice Fiscale.
fn cf_odd_value(c: u8) -> u32 {
    match c {
        b'0' | b'A' => 1,
        b'1' | b'B' => 0,
        b'2' | b'C' => 5,
        b'3' | b'D' => 7,
        b'4' | b'E' => 9,
        b'5' | b'F' => 13,
        b'6' | b'G' => 15,
        b'7' | b'H' => 17,
        b'8' | b'I' => 19,
        b'9' | b'J' => 21,
        b'K' => 2,
        b'L' => 4,
        b'M' => 18,
        b'N' => 20,
        b'O' => 11,
        b'P' => 3,
        b'Q' => 6,
        b'R' => 8,
        b'S' => 12,
        b'T' => 14,
        b'U' => 16,
        b'V' => 10,
        b'W' => 22,
        b'X' => 25,
        b'Y' => 24,
        b'Z' => 23,
        _ => 0,
    }
}

/// Positional value at an even position: digits keep their value, letters
/// map to their alphabet index.
fn cf_even_value(c: u8) -> u32 {
    match c {
        b'0'..=b'9' => (c - b'0') as u32,
        b'A'..=b'Z' => (c - b'A') as u32,
        _ => 0,
    }
}

/// Validate an Italian Codice Fiscale (16 uppercase alphanumerics with a
/// positional checksum in the last character).
pub fn validate_fiscal_code(cf: &str) -> bool {
    if cf.len() != 16 || !FISCAL_CODE_SHAPE.is_match(cf) {
        return false;
    }

    let bytes = cf.as_bytes();
    let mut total: u32 = 0;
    for (i, &c) in bytes[..15].iter().enumerate() {
        // Even index = odd position (1-indexed).
        if i % 2 == 0 {
            total += cf_odd_value(c);
        } else {
            total += cf_even_value(c);
        }
    }

    bytes[15] == CHECKSUM_LETTERS[(total % 26) as usize]
}

/// Validate an Italian Partita IVA (11 digits, Luhn-like checksum, no
/// leading zero).
pub fn validate_vat_number(piva: &str) -> bool {
    if piva.len() != 11 || !piva.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if piva.starts_with('0') {
        return false;
    }

    let digits: Vec<u32> = piva.bytes().map(|b| (b - b'0') as u32).collect();
    let mut total: u32 = 0;
    for (i, &d) in digits[..10].iter().enumerate() {
        if i % 2 == 0 {
            total += d;
        } else {
            let doubled = d * 2;
            total += if doubled > 9 { doubled - 9 } else { doubled };
        }
    }

    let expected = (10 - (total % 10)) % 10;
    digits[10] == expected
}

pub fn validate_email(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email)
}

/// Validate an Italian phone number. Separators (spaces, hyphens,
/// parentheses) are stripped before checking the `+39` / `0039` / bare
/// forms, each followed by 9-10 digits.
pub fn validate_italian_phone(phone: &str) -> bool {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let digits = if let Some(rest) = cleaned.strip_prefix("+39") {
        rest
    } else if let Some(rest) = cleaned.strip_prefix("0039") {
        rest
    } else {
        cleaned.as_str()
    };

    (9..=10).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Validate an IBAN: structure check plus the ISO 7064 mod-97 test.
pub fn validate_iban(iban: &str) -> bool {
    let compact: String = iban.chars().filter(|c| !c.is_whitespace()).collect();
    if !(15..=34).contains(&compact.len()) {
        return false;
    }
    let bytes = compact.as_bytes();
    if !bytes[..2].iter().all(|b| b.is_ascii_uppercase())
        || !bytes[2..4].iter().all(|b| b.is_ascii_digit())
        || !bytes.iter().all(|b| b.is_ascii_alphanumeric())
    {
        return false;
    }

    // Rearranged digits mod 97, computed incrementally to avoid bignums.
    let rearranged = compact[4..].bytes().chain(compact[..4].bytes());
    let mut remainder: u32 = 0;
    for b in rearranged {
        let value = if b.is_ascii_digit() {
            (b - b'0') as u32
        } else {
            (b.to_ascii_uppercase() - b'A') as u32 + 10
        };
        if value < 10 {
            remainder = (remainder * 10 + value) % 97;
        } else {
            remainder = (remainder * 100 + value) % 97;
        }
    }
    remainder == 1
}
