use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_NAME_CHARS: usize = 255;
pub const MAX_EMAIL_CHARS: usize = 255;
pub const MAX_MESSAGE_CHARS: usize = 5000;

/// Field name → messages, in field order.
pub type ValidationErrors = BTreeMap<String, Vec<String>>;

/// Raw contact form input. Every field is optional on the wire so that a
/// missing field becomes a validation message instead of a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A validated submission ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub message: String,
}

/// A stored submission.
#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or("").to_string()
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn check_required(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.is_empty() {
        errors
            .entry(field.to_string())
            .or_default()
            .push(format!("The {} field is required.", label(field)));
    } else if value.chars().count() > max {
        errors.entry(field.to_string()).or_default().push(format!(
            "The {} field must not be greater than {} characters.",
            label(field),
            max
        ));
    }
}

/// Basic address shape check: one `@`, non-empty local part, dotted domain,
/// no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

impl ContactForm {
    /// Validate every field and collect all messages.
    pub fn validate(&self) -> Result<NewContact, ValidationErrors> {
        let first_name = trimmed(&self.first_name);
        let last_name = trimmed(&self.last_name);
        let email = trimmed(&self.email);
        let message = trimmed(&self.message);

        let mut errors = ValidationErrors::new();
        check_required(&mut errors, "first_name", &first_name, MAX_NAME_CHARS);
        check_required(&mut errors, "last_name", &last_name, MAX_NAME_CHARS);
        check_required(&mut errors, "email", &email, MAX_EMAIL_CHARS);
        if !errors.contains_key("email") && !is_valid_email(&email) {
            errors.insert(
                "email".to_string(),
                vec!["The email field must be a valid email address.".to_string()],
            );
        }
        check_required(&mut errors, "message", &message, MAX_MESSAGE_CHARS);

        if errors.is_empty() {
            Ok(NewContact {
                first_name,
                last_name,
                email,
                message,
            })
        } else {
            Err(errors)
        }
    }

    /// Submitted values to re-populate the form after a failed validation.
    pub fn old_input(&self) -> BTreeMap<String, String> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("message", &self.message),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), v.clone())))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(first: &str, last: &str, email: &str, message: &str) -> ContactForm {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        ContactForm {
            first_name: opt(first),
            last_name: opt(last),
            email: opt(email),
            message: opt(message),
        }
    }

    #[test]
    fn valid_form_is_trimmed() {
        let contact = form(" Ada ", "Lovelace", " ada@example.com ", " Hello ")
            .validate()
            .unwrap();
        assert_eq!(contact.first_name, "Ada");
        assert_eq!(contact.email, "ada@example.com");
        assert_eq!(contact.message, "Hello");
    }

    #[test]
    fn missing_fields_are_reported_exactly() {
        let errors = form("Ada", "", "", "Hi").validate().unwrap_err();
        let fields: Vec<&str> = errors.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["email", "last_name"]);
        assert_eq!(errors["last_name"], vec!["The last name field is required."]);
        assert_eq!(errors["email"], vec!["The email field is required."]);
    }

    #[test]
    fn whitespace_only_counts_as_missing() {
        let errors = form("   ", "Lovelace", "ada@example.com", "Hi")
            .validate()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("first_name"));
    }

    #[test]
    fn malformed_email_is_rejected() {
        let errors = form("Ada", "Lovelace", "not-an-email", "Hi")
            .validate()
            .unwrap_err();
        assert_eq!(
            errors["email"],
            vec!["The email field must be a valid email address."]
        );
    }

    #[test]
    fn overlong_message_is_rejected() {
        let long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        let errors = form("Ada", "Lovelace", "ada@example.com", &long)
            .validate()
            .unwrap_err();
        assert_eq!(
            errors["message"],
            vec!["The message field must not be greater than 5000 characters."]
        );
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.com"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a@b..com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a b@c.com"));
    }

    #[test]
    fn old_input_keeps_submitted_values_only() {
        let old = form("Ada", "", "ada@", "").old_input();
        assert_eq!(old.len(), 2);
        assert_eq!(old["first_name"], "Ada");
        assert_eq!(old["email"], "ada@");
    }
}
