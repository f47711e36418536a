use once_cell::sync::Lazy;
use regex::Regex;

static E164: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+[0-9]{1,15}$").expect("valid E.164 pattern"));

/// Trims surrounding whitespace and returns the number if it is E.164
/// (`+` followed by 1 to 15 digits).
pub fn validate_e164(input: &str) -> Option<String> {
    let number = input.trim();
    if is_e164(number) {
        Some(number.to_string())
    } else {
        None
    }
}

pub fn is_e164(number: &str) -> bool {
    E164.is_match(number)
}

/// Provider `From` values sometimes arrive without the leading `+`.
pub fn normalize_caller(input: &str) -> String {
    let number = input.trim();
    if number.is_empty() || number.starts_with('+') {
        number.to_string()
    } else {
        format!("+{}", number)
    }
}

pub fn country_code_matches(number: &str, country_code: &str) -> bool {
    !country_code.is_empty() && number.starts_with(country_code)
}
