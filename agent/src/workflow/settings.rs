//! Detection settings submitted from the admin forms

use std::collections::HashMap;

use chrono::NaiveTime;
use openapi_client::models::Group;
use serde::{Deserialize, Serialize};

use crate::errors::{AgentError, ValidationErrors};

/// Check intervals the service accepts, in hours
pub const ALLOWED_INTERVALS: [f64; 7] = [0.25, 0.5, 1.0, 3.0, 6.0, 12.0, 24.0];

pub fn is_valid_email(address: &str) -> bool {
    address.parse::<lettre::Address>().is_ok()
}

/// Comma or newline separated list of addresses
pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_emails(errors: &mut ValidationErrors, field: &str, emails: &[String]) {
    if let Some(bad) = emails.iter().find(|e| !is_valid_email(e)) {
        errors.add(field, format!("{} is not a valid email address", bad));
    }
}

/// Range checks on a group before it is sent to the service
pub fn validate_group(group: &Group) -> Result<(), AgentError> {
    let mut errors = ValidationErrors::new();

    if group.monitoring && !ALLOWED_INTERVALS.contains(&group.interval_in_h) {
        errors.add("interval_in_h", "must be one of 0.25, 0.5, 1, 3, 6, 12 or 24");
    }
    if group.hour_of_day > 23 {
        errors.add("hour_of_day", "must be between 0 and 23");
    }
    if !(0.0..=100.0).contains(&group.threshold) {
        errors.add("threshold", "must be between 0 and 100");
    }
    validate_emails(&mut errors, "alert_emails", &group.alert_emails);

    errors.into_result()
}

/// Apply the submitted form fields to `group`. Fields not present in the
/// form keep their current value.
pub fn apply_group_form(
    mut group: Group,
    form: &HashMap<String, String>,
) -> Result<Group, AgentError> {
    let mut errors = ValidationErrors::new();

    if let Some(name) = form.get("group_name") {
        group.name = name.trim().to_string();
    }
    if let Some(enabled) = form.get("enabled") {
        group.enabled = matches!(enabled.as_str(), "1" | "true" | "on");
    }
    if let Some(interval) = form.get("interval_in_h") {
        match interval.parse() {
            Ok(value) => group.interval_in_h = value,
            Err(_) => errors.add("interval_in_h", "must be a number"),
        }
    }
    if let Some(hour) = form.get("hour_of_day") {
        match hour.parse() {
            Ok(value) => group.hour_of_day = value,
            Err(_) => errors.add("hour_of_day", "must be between 0 and 23"),
        }
    }
    if let Some(threshold) = form.get("threshold") {
        match threshold.parse() {
            Ok(value) => group.threshold = value,
            Err(_) => errors.add("threshold", "must be a number"),
        }
    }
    if let Some(css) = form.get("css") {
        group.css = Some(css.clone()).filter(|c| !c.trim().is_empty());
    }
    if let Some(emails) = form.get("alert_emails") {
        group.alert_emails = parse_email_list(emails);
    }

    errors.into_result()?;
    validate_group(&group)?;
    Ok(group)
}

/// Days on which automatic updates may run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weekdays {
    #[serde(default)]
    pub monday: bool,
    #[serde(default)]
    pub tuesday: bool,
    #[serde(default)]
    pub wednesday: bool,
    #[serde(default)]
    pub thursday: bool,
    #[serde(default)]
    pub friday: bool,
    #[serde(default)]
    pub saturday: bool,
    #[serde(default)]
    pub sunday: bool,
}

impl Weekdays {
    pub const NAMES: [&'static str; 7] = [
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
        "sunday",
    ];

    fn flag_mut(&mut self, name: &str) -> Option<&mut bool> {
        match name {
            "monday" => Some(&mut self.monday),
            "tuesday" => Some(&mut self.tuesday),
            "wednesday" => Some(&mut self.wednesday),
            "thursday" => Some(&mut self.thursday),
            "friday" => Some(&mut self.friday),
            "saturday" => Some(&mut self.saturday),
            "sunday" => Some(&mut self.sunday),
            _ => None,
        }
    }

    pub fn any(&self) -> bool {
        self.monday
            || self.tuesday
            || self.wednesday
            || self.thursday
            || self.friday
            || self.saturday
            || self.sunday
    }
}

/// Schedule for automatic updates wrapped in pre/post checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoUpdateSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Window start, `HH:MM`
    pub from: String,
    /// Window end, `HH:MM`
    pub to: String,
    #[serde(default)]
    pub weekdays: Weekdays,
    #[serde(default)]
    pub notification_emails: Vec<String>,
}

impl Default for AutoUpdateSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            from: "02:00".to_string(),
            to: "04:00".to_string(),
            weekdays: Weekdays::default(),
            notification_emails: Vec::new(),
        }
    }
}

impl AutoUpdateSettings {
    /// Build from the form fields `auto_update_checks_enabled`,
    /// `auto_update_checks_from`, `auto_update_checks_to`,
    /// `auto_update_checks_<weekday>` and `auto_update_checks_emails`.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, AgentError> {
        let flag = |name: &str| {
            form.get(name)
                .map(|v| matches!(v.as_str(), "1" | "true" | "on"))
                .unwrap_or(false)
        };
        let defaults = Self::default();

        let mut weekdays = Weekdays::default();
        for day in Weekdays::NAMES {
            if let Some(slot) = weekdays.flag_mut(day) {
                *slot = flag(&format!("auto_update_checks_{}", day));
            }
        }

        let settings = Self {
            enabled: flag("auto_update_checks_enabled"),
            from: form
                .get("auto_update_checks_from")
                .cloned()
                .unwrap_or(defaults.from),
            to: form
                .get("auto_update_checks_to")
                .cloned()
                .unwrap_or(defaults.to),
            weekdays,
            notification_emails: form
                .get("auto_update_checks_emails")
                .map(|raw| parse_email_list(raw))
                .unwrap_or_default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        let mut errors = ValidationErrors::new();

        for (field, value) in [
            ("auto_update_checks_from", &self.from),
            ("auto_update_checks_to", &self.to),
        ] {
            if NaiveTime::parse_from_str(value, "%H:%M").is_err() {
                errors.add(field, "must be a time in HH:MM format");
            }
        }
        if self.enabled && !self.weekdays.any() {
            errors.add("auto_update_checks_weekdays", "select at least one weekday");
        }
        validate_emails(
            &mut errors,
            "auto_update_checks_emails",
            &self.notification_emails,
        );

        errors.into_result()
    }
}
