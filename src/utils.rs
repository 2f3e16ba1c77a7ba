use crate::consts::{
    MAX_EMAIL_CHARS, MAX_NAME_CHARS, MAX_PHONE_CHARS, MIN_NAME_CHARS, MIN_PHONE_DIGITS,
};

/// Trimmed name, if its length fits between the minimum and the column width.
pub fn parse_name(input: &str) -> Option<String> {
    let name = input.trim();
    let len = name.chars().count();
    (MIN_NAME_CHARS..=MAX_NAME_CHARS)
        .contains(&len)
        .then(|| name.to_string())
}

/// Keep only the digits of `input` and rewrite them into `+<country code><subscriber number>`
/// form.  `prefix` is the country code including its leading `+`.  A `00` international prefix,
/// the country code itself and the trunk `0` are dropped before the prefix is put back.
pub fn parse_phone(input: &str, prefix: &str) -> Option<String> {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < MIN_PHONE_DIGITS {
        return None;
    }
    let country_code = prefix.trim_start_matches('+');
    let rest = digits.strip_prefix("00").unwrap_or(&digits);
    let subscriber = rest.strip_prefix(country_code).unwrap_or(rest);
    let subscriber = subscriber.strip_prefix('0').unwrap_or(subscriber);
    let phone = format!("{prefix}{subscriber}");
    (phone.len() <= MAX_PHONE_CHARS).then_some(phone)
}

pub fn parse_email(input: &str) -> Option<String> {
    let email = input.trim();
    (email.contains('@') && email.contains('.') && email.chars().count() <= MAX_EMAIL_CHARS)
        .then(|| email.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_needs_five_characters_after_trimming() {
        assert_eq!(parse_name("  abcd  "), None);
        assert_eq!(parse_name("abcde"), Some("abcde".to_string()));
        assert_eq!(parse_name("\tAhmad Khaled Omar\n"), Some("Ahmad Khaled Omar".to_string()));
        assert_eq!(parse_name("     "), None);
    }

    #[test]
    fn name_length_counts_characters_not_bytes() {
        // four Arabic letters take eight bytes
        assert_eq!(parse_name("أحمد"), None);
        assert_eq!(parse_name("أحمد خالد"), Some("أحمد خالد".to_string()));
    }

    #[test]
    fn phone_needs_eight_digits() {
        assert_eq!(parse_phone("0512-345", "+966"), None);
        assert_eq!(parse_phone("phone: 1234567", "+966"), None);
        assert!(parse_phone("12345678", "+966").is_some());
    }

    #[test]
    fn phone_always_carries_the_country_code() {
        let prefix = "+966";
        assert_eq!(parse_phone("0512345678", prefix).unwrap(), "+966512345678");
        assert_eq!(parse_phone("512345678", prefix).unwrap(), "+966512345678");
        assert_eq!(parse_phone("+966 51 234 5678", prefix).unwrap(), "+966512345678");
        assert_eq!(parse_phone("(051) 234-5678", prefix).unwrap(), "+966512345678");
        assert_eq!(parse_phone("0612345678", "+33").unwrap(), "+33612345678");
    }

    #[test]
    fn international_forms_are_not_doubled() {
        let prefix = "+966";
        assert_eq!(parse_phone("00966512345678", prefix).unwrap(), "+966512345678");
        assert_eq!(parse_phone("+966 0512345678", prefix).unwrap(), "+966512345678");
        assert_eq!(parse_phone("00966 0512345678", prefix).unwrap(), "+966512345678");
        assert_eq!(parse_phone("0033 612345678", "+33").unwrap(), "+33612345678");
    }

    #[test]
    fn values_must_fit_their_columns() {
        assert!(parse_name(&"a".repeat(200)).is_some());
        assert_eq!(parse_name(&"a".repeat(201)), None);
        assert!(parse_name(&format!("  {}  ", "أ".repeat(200))).is_some());

        // "+966" plus 16 subscriber digits is exactly 20 characters
        assert_eq!(parse_phone("05123456789012345", "+966").unwrap().len(), 20);
        assert_eq!(parse_phone("051234567890123456", "+966"), None);
        assert_eq!(parse_phone("0512345678 ext 1234567890123", "+966"), None);

        let local = "a".repeat(144);
        assert!(parse_email(&format!("{local}@b.com")).is_some());
        assert_eq!(parse_email(&format!("{local}a@b.com")), None);
    }

    #[test]
    fn email_needs_at_and_dot() {
        assert_eq!(parse_email("a@bcom"), None);
        assert_eq!(parse_email("ab.com"), None);
        assert_eq!(parse_email(" a@b.com "), Some("a@b.com".to_string()));
    }
}
