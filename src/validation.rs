//! Injected validation capability, consulted by `save` before any Source call.

use crate::resource::ResourceInstance;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// Attached to a descriptor at declaration time. An invalid report makes
/// `save` return `Ok(false)` without contacting the Source.
pub trait Validator: Send + Sync {
    fn validate(&self, instance: &ResourceInstance) -> bool;
}

/// Per-attribute validation rules, keyed by native attribute name.
#[derive(Clone, Debug, Default)]
pub struct ValidationRule {
    pub required: Option<bool>,
    pub format: Option<String>,
    pub max_length: Option<u32>,
    pub min_length: Option<u32>,
    pub pattern: Option<String>,
    pub allowed: Option<Vec<Value>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// Rule-driven validator. All required fields must be present and non-null;
/// present fields are checked against their rules.
#[derive(Clone, Debug, Default)]
pub struct RuleValidator {
    rules: HashMap<String, ValidationRule>,
}

impl RuleValidator {
    pub fn new(rules: HashMap<String, ValidationRule>) -> Self {
        RuleValidator { rules }
    }

    pub fn rule(mut self, attribute: &str, rule: ValidationRule) -> Self {
        self.rules.insert(attribute.to_string(), rule);
        self
    }
}

impl Validator for RuleValidator {
    fn validate(&self, instance: &ResourceInstance) -> bool {
        for (name, rule) in &self.rules {
            let val = instance.raw_field(name).map(|v| v.to_json());
            let missing = match &val {
                None => true,
                Some(Value::Null) => true,
                Some(_) => false,
            };
            if rule.required == Some(true) && missing {
                tracing::debug!(attribute = %name, "validation: required field missing");
                return false;
            }
            if let Some(v) = val {
                if !field_ok(name, &v, rule) {
                    return false;
                }
            }
        }
        true
    }
}

fn field_ok(name: &str, v: &Value, rule: &ValidationRule) -> bool {
    if v.is_null() {
        return true;
    }
    if let Some(format) = &rule.format {
        if !format_ok(v, format) {
            tracing::debug!(attribute = %name, format = %format, "validation: bad format");
            return false;
        }
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.len() > max as usize {
                return false;
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.len() < min as usize {
                return false;
            }
        }
    }
    if let Some(pattern) = &rule.pattern {
        let Ok(re) = Regex::new(pattern) else {
            tracing::debug!(attribute = %name, "validation: invalid pattern");
            return false;
        };
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return false;
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return false;
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return false;
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return false;
            }
        }
    }
    true
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn format_ok(v: &Value, format: &str) -> bool {
    match format.to_lowercase().as_str() {
        "email" => v
            .as_str()
            .map(|s| s.contains('@') && s.len() >= 3)
            .unwrap_or(true),
        "uuid" => v
            .as_str()
            .map(|s| uuid::Uuid::parse_str(s).is_ok())
            .unwrap_or(true),
        _ => true,
    }
}
