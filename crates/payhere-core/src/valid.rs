//! Input validation rules shared by sign-up, sign-in and the domain types

use crate::{DomainError, Result};

/// Symbols accepted as the "special character" of a password
pub const PASSWORD_SYMBOLS: &str = "!@#$%&*+-_=?:;,.|(){}<> ";

/// Upper bound on password length in bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Validate a mobile phone number
///
/// The canonical format is `01` followed by 8 or 9 digits, without
/// separators (e.g. `01012341234`).
pub fn validate_phone_number(phone_number: &str) -> Result<()> {
    let valid = phone_number.starts_with("01")
        && (10..=11).contains(&phone_number.len())
        && phone_number.bytes().all(|b| b.is_ascii_digit());

    if valid {
        Ok(())
    } else {
        Err(DomainError::InvalidPhoneNumber(phone_number.to_string()))
    }
}

/// Validate password strength
///
/// A password must contain at least one digit, one lower-case letter, one
/// upper-case letter and one symbol from [`PASSWORD_SYMBOLS`], and must not
/// exceed [`MAX_PASSWORD_BYTES`].
pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(DomainError::InvalidPassword("empty password"));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(DomainError::InvalidPassword("longer than 72 bytes"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(DomainError::InvalidPassword("numeric not contained"));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(DomainError::InvalidPassword("lower case not contained"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(DomainError::InvalidPassword("upper case not contained"));
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        return Err(DomainError::InvalidPassword("symbol not contained"));
    }

    Ok(())
}
