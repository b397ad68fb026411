/// Check an email against the registration allow-list.
///
/// Entries are suffixes such as `@pd15.org`; matching is case-insensitive and
/// the address must have a non-empty local part.
pub fn is_allowed_email_domain(email: &str, allowed_domains: &[String]) -> bool {
    let email = normalize_email(email);
    let Some(at) = email.find('@') else {
        return false;
    };
    if at == 0 || email.matches('@').count() != 1 {
        return false;
    }

    allowed_domains.iter().any(|domain| {
        let domain = domain.trim().to_lowercase();
        !domain.is_empty() && email.ends_with(&domain) && email.len() > domain.len()
    })
}

/// Lowercase and trim an email so it can be used as a store key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate a case number of the form `YYYY-XX-NNNNNN`
pub fn validate_case_number(case_number: &str) -> bool {
    let upper = case_number.trim().to_uppercase();
    let parts: Vec<&str> = upper.split('-').collect();
    if parts.len() != 3 {
        return false;
    }

    parts[0].len() == 4
        && parts[0].chars().all(|c| c.is_ascii_digit())
        && parts[1].len() == 2
        && parts[1].chars().all(|c| c.is_ascii_uppercase())
        && parts[2].len() == 6
        && parts[2].chars().all(|c| c.is_ascii_digit())
}

/// Make a string safe to use as a file name
pub fn sanitize_filename(filename: &str) -> String {
    let replaced: String = filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let mut collapsed = String::with_capacity(replaced.len());
    for c in replaced.chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }

    let truncated: String = collapsed.chars().take(100).collect();
    truncated.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow_list() -> Vec<String> {
        vec!["@pd15.org".to_string(), "@pd15.state.fl.us".to_string()]
    }

    #[test]
    fn allow_list_matches_suffix_case_insensitively() {
        assert!(is_allowed_email_domain("jdoe@pd15.org", &allow_list()));
        assert!(is_allowed_email_domain("JDoe@PD15.State.FL.US", &allow_list()));
        assert!(!is_allowed_email_domain("jdoe@gmail.com", &allow_list()));
        assert!(!is_allowed_email_domain("jdoe@evilpd15.org", &allow_list()));
    }

    #[test]
    fn allow_list_rejects_malformed_addresses() {
        assert!(!is_allowed_email_domain("@pd15.org", &allow_list()));
        assert!(!is_allowed_email_domain("pd15.org", &allow_list()));
        assert!(!is_allowed_email_domain("a@b@pd15.org", &allow_list()));
        assert!(!is_allowed_email_domain("jdoe@pd15.org", &[]));
    }

    #[test]
    fn case_number_format() {
        assert!(validate_case_number("2024-CF-000123"));
        assert!(validate_case_number("2024-mm-123456"));
        assert!(!validate_case_number("23CF000123"));
        assert!(!validate_case_number("2024-C1-000123"));
        assert!(!validate_case_number(""));
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("2024-CF-1/Doe: John"), "2024-CF-1_Doe_ John");
        assert_eq!(sanitize_filename("__a<>b__"), "a_b");
        assert_eq!(sanitize_filename(&"x".repeat(150)).len(), 100);
    }
}
