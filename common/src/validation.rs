//! Input validation helpers shared by the API crates.
//!
//! Validators collect every problem in a [`Validator`] so that a request is
//! rejected once with the complete list of field errors.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, FieldError, Res};

lazy_static! {
    /// Loose email shape check, mirrors what browsers accept.
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

#[derive(Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError {
                field: field.to_string(),
                message: message.to_string(),
            });
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(is_valid_email(value), field, "Invalid email address")
    }

    /// At least 8 characters with one digit and one uppercase letter.
    pub fn password(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(
            value.chars().count() >= 8,
            field,
            "Password must be at least 8 characters",
        );
        self.check(
            value.chars().any(|c| c.is_ascii_digit()),
            field,
            "Password must contain a digit",
        );
        self.check(
            value.chars().any(|c| c.is_uppercase()),
            field,
            "Password must contain an uppercase letter",
        )
    }

    pub fn required(&mut self, field: &str, value: &str, max_len: usize) -> &mut Self {
        let trimmed = value.trim();
        self.check(!trimmed.is_empty(), field, "This field is required");
        self.check(
            trimmed.chars().count() <= max_len,
            field,
            &format!("Maximum {} characters", max_len),
        )
    }

    pub fn finish(&mut self) -> Res<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("amine@skillup.ma"));
        assert!(!is_valid_email("amine@skillup"));
        assert!(!is_valid_email("amine skillup.ma"));
    }

    #[test]
    fn password_policy_reports_each_rule() {
        let err = Validator::new().password("password", "short").finish().unwrap_err();
        match err {
            AppError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(Validator::new().password("password", "Secret123").finish().is_ok());
    }

    #[test]
    fn required_trims() {
        assert!(Validator::new().required("firstName", "   ", 50).finish().is_err());
        assert!(Validator::new().required("firstName", "Salma", 50).finish().is_ok());
        let long = "x".repeat(51);
        assert!(Validator::new().required("firstName", &long, 50).finish().is_err());
    }
}
