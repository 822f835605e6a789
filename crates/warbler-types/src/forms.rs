//! Request forms and their field validators.
//!
//! Each form deserializes straight from a JSON request body. Missing string
//! fields default to empty so they are reported by the validators rather
//! than rejected by the extractor.

use std::collections::BTreeMap;

use email_address::EmailAddress;
use serde::Deserialize;
use thiserror::Error;

const REQUIRED: &str = "This field is required.";
const INVALID_EMAIL: &str = "Invalid email address.";

pub const MESSAGE_MAX_CHARS: usize = 140;
pub const PASSWORD_MIN_CHARS: usize = 6;
const PROFILE_FIELD_MIN_CHARS: usize = 10;

/// Per-field validation failures, keyed by field name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Error)]
#[error("invalid form data in {} field(s)", .fields.len())]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.fields
    }

    fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), FormErrors>;
}

/// Returns the trimmed value, or `None` if it is absent or blank.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// -- Field validators --

/// Fails on empty or whitespace-only input. Returns whether the value passed,
/// so later validators on the same field can be skipped.
fn data_required(errors: &mut FormErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
        false
    } else {
        true
    }
}

fn length(errors: &mut FormErrors, field: &str, value: &str, min: usize, max: Option<usize>) {
    let chars = value.chars().count();
    let too_short = chars < min;
    let too_long = max.is_some_and(|max| chars > max);
    if !too_short && !too_long {
        return;
    }

    let message = match max {
        Some(max) => format!("Field must be between {min} and {max} characters long."),
        None => format!("Field must be at least {min} characters long."),
    };
    errors.add(field, message);
}

fn email(errors: &mut FormErrors, field: &str, value: &str) {
    if !is_valid_email(value) {
        errors.add(field, INVALID_EMAIL);
    }
}

/// RFC 5322 address check, plus a dotted domain of alphanumeric/hyphen
/// labels so single-label hosts, domain literals and display-name forms
/// are rejected.
pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if !EmailAddress::is_valid(value) {
        return false;
    }

    let Some((_, domain)) = value.rsplit_once('@') else {
        return false;
    };
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

// -- Forms --

/// Adding or editing a message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageForm {
    pub text: String,
}

impl Validate for MessageForm {
    fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        if data_required(&mut errors, "text", &self.text) {
            length(&mut errors, "text", &self.text, 1, Some(MESSAGE_MAX_CHARS));
        }
        errors.into_result()
    }
}

/// Signing up.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserAddForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: Option<String>,
}

impl Validate for UserAddForm {
    fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        data_required(&mut errors, "username", &self.username);
        if data_required(&mut errors, "email", &self.email) {
            email(&mut errors, "email", &self.email);
        }
        length(&mut errors, "password", &self.password, PASSWORD_MIN_CHARS, None);
        errors.into_result()
    }
}

/// Editing the current user's profile. `password` confirms the change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserEditForm {
    pub username: String,
    pub email: String,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub password: String,
}

impl Validate for UserEditForm {
    fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        data_required(&mut errors, "username", &self.username);
        if data_required(&mut errors, "email", &self.email) {
            email(&mut errors, "email", &self.email);
        }

        for (field, value) in [
            ("image_url", &self.image_url),
            ("header_image_url", &self.header_image_url),
            ("bio", &self.bio),
        ] {
            if let Some(value) = non_blank(value) {
                length(&mut errors, field, value, PROFILE_FIELD_MIN_CHARS, None);
            }
        }

        length(&mut errors, "password", &self.password, PASSWORD_MIN_CHARS, None);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl Validate for LoginForm {
    fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        data_required(&mut errors, "username", &self.username);
        length(&mut errors, "password", &self.password, PASSWORD_MIN_CHARS, None);
        errors.into_result()
    }
}
