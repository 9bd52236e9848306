//! Input validation for store-facing helpers
//! Malformed caller input is rejected here, before any SQL runs

use thiserror::Error;

/// Maximum byte length for record identifiers
pub const MAX_ID_BYTES: usize = 64;

/// Maximum byte length for denormalized display names
pub const MAX_NAME_BYTES: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error("{field} exceeds maximum length of {max} bytes")]
    TooLong { field: &'static str, max: usize },
    #[error("amount is not a canonical decimal string: {0:?}")]
    BadAmount(String),
}

/// Validate a record identifier (non-empty, bounded, no control characters)
pub fn validate_id(field: &'static str, id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if id.len() > MAX_ID_BYTES {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_ID_BYTES,
        });
    }
    Ok(())
}

/// Validate a display name used in denormalized columns
pub fn validate_name(field: &'static str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_NAME_BYTES,
        });
    }
    Ok(())
}

/// Validate a monetary amount string.
///
/// Amounts are stored as canonical decimal strings (e.g. `"50.00"`, `"-3.50"`)
/// so that no binary floating point ever touches financial values. Accepted
/// form: optional leading `-`, one or more digits, optionally a `.` followed
/// by one or two digits.
pub fn validate_amount(amount: &str) -> Result<(), ValidationError> {
    let s = amount.strip_prefix('-').unwrap_or(amount);
    if s.is_empty() {
        return Err(ValidationError::BadAmount(amount.to_string()));
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };

    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::BadAmount(amount.to_string()));
    }
    if let Some(frac) = frac_part {
        if frac.is_empty() || frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::BadAmount(amount.to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_amounts() {
        for ok in ["50.00", "0.5", "1000", "-3.50", "0"] {
            assert!(validate_amount(ok).is_ok(), "expected {:?} to validate", ok);
        }
    }

    #[test]
    fn test_invalid_amounts() {
        for bad in ["", "-", "50.", ".50", "50.000", "12a", "1,50", "1.2.3"] {
            assert!(
                validate_amount(bad).is_err(),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_id_bounds() {
        assert!(validate_id("id", "test-1").is_ok());
        assert_eq!(validate_id("id", ""), Err(ValidationError::Empty("id")));
        let long = "x".repeat(MAX_ID_BYTES + 1);
        assert!(matches!(
            validate_id("id", &long),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_name_rejects_whitespace_only() {
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", "Food").is_ok());
    }
}
