//! Field-level validation helpers.
//!
//! Each helper returns a `DomainError::Validation` whose message starts with
//! the field name, mirroring how record forms report errors per input.

use crate::error::{DomainError, DomainResult};

/// Required text: trimmed, non-empty, at most `max` characters.
pub fn required(field: &str, value: &str, max: usize) -> DomainResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(DomainError::field(field, "cannot be empty"));
    }
    max_len(field, v, max)?;
    Ok(v.to_string())
}

/// Required free text (no length cap).
pub fn required_text(field: &str, value: &str) -> DomainResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(DomainError::field(field, "cannot be empty"));
    }
    Ok(v.to_string())
}

/// Optional text: blank collapses to `None`, otherwise at most `max` characters.
pub fn optional(field: &str, value: Option<&str>, max: usize) -> DomainResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => {
            max_len(field, v, max)?;
            Ok(Some(v.to_string()))
        }
    }
}

/// Optional free text (blank collapses to `None`).
pub fn optional_text(value: Option<&str>) -> Option<String> {
    match value.map(str::trim) {
        None | Some("") => None,
        Some(v) => Some(v.to_string()),
    }
}

/// Optional e-mail address. Only the basic `local@domain.tld` shape is checked.
pub fn optional_email(field: &str, value: Option<&str>) -> DomainResult<Option<String>> {
    let Some(v) = optional(field, value, 254)? else {
        return Ok(None);
    };
    let valid = match v.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !v.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::field(field, "enter a valid email address"));
    }
    Ok(Some(v))
}

pub fn non_negative(field: &str, value: i64) -> DomainResult<i64> {
    if value < 0 {
        return Err(DomainError::field(field, "must be greater than or equal to 0"));
    }
    Ok(value)
}

pub fn at_least(field: &str, value: i64, min: i64) -> DomainResult<i64> {
    if value < min {
        return Err(DomainError::field(
            field,
            format!("must be greater than or equal to {min}"),
        ));
    }
    Ok(value)
}

pub fn at_most(field: &str, value: i64, max: i64) -> DomainResult<i64> {
    if value > max {
        return Err(DomainError::field(
            field,
            format!("must be less than or equal to {max}"),
        ));
    }
    Ok(value)
}

fn max_len(field: &str, value: &str, max: usize) -> DomainResult<()> {
    let len = value.chars().count();
    if len > max {
        return Err(DomainError::field(
            field,
            format!("ensure this value has at most {max} characters (it has {len})"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("name", "  Filtro  ", 10).unwrap(), "Filtro");
        let err = required("name", "   ", 10).unwrap_err();
        assert_eq!(err, DomainError::validation("name: cannot be empty"));
    }

    #[test]
    fn required_counts_characters_not_bytes() {
        assert!(required("name", "ñññññ", 5).is_ok());
        assert!(required("name", "ññññññ", 5).is_err());
    }

    #[test]
    fn optional_collapses_blank_to_none() {
        assert_eq!(optional("phone", Some("  "), 20).unwrap(), None);
        assert_eq!(optional("phone", None, 20).unwrap(), None);
        assert!(optional("phone", Some("123456789012345678901"), 20).is_err());
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(optional_email("email", Some("taller@example.cl")).unwrap().is_some());
        assert!(optional_email("email", Some("taller@example")).is_err());
        assert!(optional_email("email", Some("no-at-sign.cl")).is_err());
        assert!(optional_email("email", Some("a b@example.cl")).is_err());
    }

    #[test]
    fn numeric_bounds_report_field() {
        assert!(non_negative("quantity", 0).is_ok());
        let err = non_negative("quantity", -1).unwrap_err();
        assert!(matches!(err, DomainError::Validation(m) if m.starts_with("quantity")));
        assert!(at_least("machine_year", 1899, 1900).is_err());
        assert_eq!(at_most("quantity", 10, 10).unwrap(), 10);
        assert_eq!(
            at_most("quantity", 11, 10).unwrap_err(),
            DomainError::field("quantity", "must be less than or equal to 10")
        );
    }
}
