//! File and folder name checks shared by rename and create-directory.
//!
//! Rules run in order and the first failure wins: empty, forbidden
//! characters, reserved device names, and (optionally) dots-only names.

use crate::error::ValidationError;

const INVALID_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const RESERVED_NAMES: [&str; 4] = ["CON", "PRN", "AUX", "NUL"];

pub const INVALID_CHARS_MESSAGE: &str = "Name contains invalid characters: < > : \" / \\ | ? *";
pub const RESERVED_NAME_MESSAGE: &str = "This name is reserved by the system";

#[derive(Debug, Clone)]
pub struct NameRules {
    /// used in the empty and dots-only messages
    pub label: String,
    pub forbid_dots_only: bool,
}

impl Default for NameRules {
    fn default() -> Self {
        Self {
            label: "Name".to_string(),
            forbid_dots_only: false,
        }
    }
}

impl NameRules {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn forbidding_dots(mut self) -> Self {
        self.forbid_dots_only = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameValidation {
    pub valid: bool,
    /// empty when valid
    pub error: String,
}

impl NameValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            error: String::new(),
        }
    }

    fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: error.into(),
        }
    }
}

pub fn validate_name(name: &str, rules: &NameRules) -> NameValidation {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return NameValidation::rejected(format!("{} cannot be empty", rules.label));
    }

    if trimmed.contains(&INVALID_CHARS[..]) {
        return NameValidation::rejected(INVALID_CHARS_MESSAGE);
    }

    if is_reserved(trimmed) {
        return NameValidation::rejected(RESERVED_NAME_MESSAGE);
    }

    if rules.forbid_dots_only && trimmed.chars().all(|c| c == '.') {
        return NameValidation::rejected(format!("{} cannot be only dots", rules.label));
    }

    NameValidation::ok()
}

pub fn is_valid_name(name: &str, rules: &NameRules) -> bool {
    validate_name(name, rules).valid
}

pub fn name_error(name: &str, rules: &NameRules) -> String {
    validate_name(name, rules).error
}

pub fn ensure_valid_name(name: &str, rules: &NameRules) -> Result<(), ValidationError> {
    let outcome = validate_name(name, rules);
    if outcome.valid {
        Ok(())
    } else {
        Err(ValidationError {
            message: outcome.error,
        })
    }
}

// CON, PRN, AUX, NUL, COM1-COM9, LPT1-LPT9, whole string, any case
fn is_reserved(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    if RESERVED_NAMES.contains(&upper.as_str()) {
        return true;
    }
    match (upper.get(..3), upper.get(3..)) {
        (Some("COM" | "LPT"), Some(digit)) => {
            digit.len() == 1 && matches!(digit.as_bytes()[0], b'1'..=b'9')
        }
        _ => false,
    }
}
