//! Key casing and naming: native attribute names are snake_case, wire keys are
//! camelCase, resource names are pluralized lower-case type names.

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "user_id" -> "userId", "created_at" -> "createdAt"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "userId" -> "user_id", "createdAt" -> "created_at"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Conventional English pluralization, enough for resource naming.
/// e.g. "zoo" -> "zoos", "class" -> "classes", "company" -> "companies"
pub fn pluralize(s: &str) -> String {
    if let Some(stem) = s.strip_suffix('y') {
        if !stem.is_empty() && !ends_with_vowel(stem) {
            return format!("{}ies", stem);
        }
    }
    if s.ends_with('s')
        || s.ends_with('x')
        || s.ends_with('z')
        || s.ends_with("ch")
        || s.ends_with("sh")
    {
        return format!("{}es", s);
    }
    format!("{}s", s)
}

/// Inverse of [`pluralize`] for the same conventional forms.
/// e.g. "animals" -> "animal", "companies" -> "company"
pub fn singularize(s: &str) -> String {
    if let Some(stem) = s.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }
    if let Some(stem) = s.strip_suffix("es") {
        if stem.ends_with('s')
            || stem.ends_with('x')
            || stem.ends_with('z')
            || stem.ends_with("ch")
            || stem.ends_with("sh")
        {
            return stem.to_string();
        }
    }
    s.strip_suffix('s').unwrap_or(s).to_string()
}

fn ends_with_vowel(s: &str) -> bool {
    matches!(s.chars().last(), Some('a' | 'e' | 'i' | 'o' | 'u'))
}

/// Swappable key-casing capability. Attribute wire names are computed through
/// this once, at declaration time.
pub trait KeyConverter: Send + Sync {
    fn key_to_json(&self, name: &str) -> String;
    fn key_from_json(&self, name: &str) -> String;
}

/// Default casing: snake_case native keys, camelCase wire keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultKeyConverter;

impl KeyConverter for DefaultKeyConverter {
    fn key_to_json(&self, name: &str) -> String {
        to_camel_case(name)
    }

    fn key_from_json(&self, name: &str) -> String {
        to_snake_case(name)
    }
}
