//! Form validation.
//!
//! A pure pass from FormState to a field-keyed error map, run at submit
//! time only. Eager per-field error clearing happens in FormSession
//! setters, not here.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{Field, FormState};

use super::limits::IntakeLimits;

/// Field-keyed validation errors. Empty map ⇔ form is submittable.
pub type ValidationErrors = BTreeMap<Field, String>;

/// Which optional rules a form variant enforces.
#[derive(Debug, Clone, Copy)]
pub struct ValidationProfile {
    /// Require a non-empty subject line
    pub require_subject: bool,

    /// Require an enquiry type selection
    pub require_enquiry_type: bool,
}

impl Default for ValidationProfile {
    fn default() -> Self {
        Self {
            require_subject: true,
            require_enquiry_type: true,
        }
    }
}

/// Simple local@domain shape check.
fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid pattern"))
}

/// Validate the full form, producing an error for every failing field.
pub fn validate(
    form: &FormState,
    profile: &ValidationProfile,
    limits: &IntakeLimits,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if form.name.trim().is_empty() {
        errors.insert(Field::Name, "Please enter your name".to_string());
    }

    let email = form.email.trim();
    if email.is_empty() {
        errors.insert(Field::Email, "Please enter your email address".to_string());
    } else if !email_pattern().is_match(email) {
        errors.insert(
            Field::Email,
            "Please enter a valid email address".to_string(),
        );
    }

    if profile.require_enquiry_type && form.enquiry_type.is_none() {
        errors.insert(
            Field::EnquiryType,
            "Please select an enquiry type".to_string(),
        );
    }

    if profile.require_subject && form.subject.trim().is_empty() {
        errors.insert(Field::Subject, "Please enter a subject".to_string());
    }

    let message = form.message.trim();
    if message.is_empty() {
        errors.insert(Field::Message, "Please enter a message".to_string());
    } else if let Err(violation) = limits.check_message(&form.message) {
        errors.insert(Field::Message, violation.to_string());
    }

    // Defense in depth; the session already enforces the cap on add
    if limits.check_attachment_count(form.attachments.len()).is_err() {
        errors.insert(
            Field::Attachments,
            format!("At most {} attachments are allowed", limits.max_attachments),
        );
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EnquiryType;

    fn valid_form() -> FormState {
        FormState {
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            enquiry_type: Some(EnquiryType::Project),
            subject: "New app".to_string(),
            message: "We need a mobile app for logistics tracking.".to_string(),
            attachments: Vec::new(),
            recording: None,
        }
    }

    #[test]
    fn test_valid_form_passes() {
        let errors = validate(
            &valid_form(),
            &ValidationProfile::default(),
            &IntakeLimits::default(),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_empty_name_and_short_message() {
        let mut form = valid_form();
        form.name = "".to_string();
        form.email = "a@b.com".to_string();
        form.message = "short".to_string();

        let errors = validate(
            &form,
            &ValidationProfile::default(),
            &IntakeLimits::default(),
        );

        assert!(errors.contains_key(&Field::Name));
        assert!(errors.contains_key(&Field::Message));
        assert!(!errors.contains_key(&Field::Email));
    }

    #[test]
    fn test_email_shapes() {
        let limits = IntakeLimits::default();
        let profile = ValidationProfile::default();

        for bad in ["", "plain", "missing@domain", "spaces in@mail.com", "@x.com"] {
            let mut form = valid_form();
            form.email = bad.to_string();
            let errors = validate(&form, &profile, &limits);
            assert!(errors.contains_key(&Field::Email), "accepted: {:?}", bad);
        }

        let mut form = valid_form();
        form.email = "first.last+tag@mail.example.org".to_string();
        assert!(!validate(&form, &profile, &limits).contains_key(&Field::Email));
    }

    #[test]
    fn test_message_trim_boundary() {
        let limits = IntakeLimits::default();
        let profile = ValidationProfile::default();

        // 9 chars after trim -> rejected
        let mut form = valid_form();
        form.message = "  123456789  ".to_string();
        assert!(validate(&form, &profile, &limits).contains_key(&Field::Message));

        // 10 chars after trim -> accepted
        form.message = "  1234567890  ".to_string();
        assert!(!validate(&form, &profile, &limits).contains_key(&Field::Message));
    }

    #[test]
    fn test_profile_relaxes_subject_and_type() {
        let mut form = valid_form();
        form.subject = "".to_string();
        form.enquiry_type = None;

        let relaxed = ValidationProfile {
            require_subject: false,
            require_enquiry_type: false,
        };
        let errors = validate(&form, &relaxed, &IntakeLimits::default());
        assert!(errors.is_empty());

        let strict = ValidationProfile::default();
        let errors = validate(&form, &strict, &IntakeLimits::default());
        assert!(errors.contains_key(&Field::Subject));
        assert!(errors.contains_key(&Field::EnquiryType));
    }
}
