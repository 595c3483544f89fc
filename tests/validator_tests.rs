use afs_client::validator::{
    ensure_valid_name, is_valid_name, name_error, validate_name, NameRules,
    INVALID_CHARS_MESSAGE, RESERVED_NAME_MESSAGE,
};

#[test]
fn test_plain_names_are_valid() {
    let rules = NameRules::default();
    for name in ["report.pdf", "My Documents", "console", "con.txt", "COM0", "LPT10", "...", ".hidden"] {
        let outcome = validate_name(name, &rules);
        assert!(outcome.valid, "{} should be valid", name);
        assert_eq!(outcome.error, "");
    }
}

#[test]
fn test_empty_and_whitespace() {
    let rules = NameRules::default();
    assert_eq!(name_error("", &rules), "Name cannot be empty");
    assert_eq!(name_error("   \t", &rules), "Name cannot be empty");

    let folder = NameRules::labelled("Folder name");
    assert_eq!(name_error(" ", &folder), "Folder name cannot be empty");
}

#[test]
fn test_invalid_characters() {
    let rules = NameRules::default();
    for name in ["a<b", "a>b", "c:", "say \"hi\"", "a/b", "a\\b", "a|b", "why?", "*.txt"] {
        assert_eq!(name_error(name, &rules), INVALID_CHARS_MESSAGE, "{}", name);
    }
}

#[test]
fn test_reserved_names_any_case() {
    let rules = NameRules::default();
    for name in ["CON", "prn", "Aux", "nul", "COM1", "com9", "LPT1", "lpt5", " CON "] {
        assert_eq!(name_error(name, &rules), RESERVED_NAME_MESSAGE, "{}", name);
    }
}

#[test]
fn test_first_failing_rule_wins() {
    // forbidden character is reported before anything else
    let rules = NameRules::default().forbidding_dots();
    assert_eq!(name_error("CON:", &rules), INVALID_CHARS_MESSAGE);
}

#[test]
fn test_dots_only_when_forbidden() {
    let folder = NameRules::labelled("Folder name").forbidding_dots();
    assert_eq!(name_error(".", &folder), "Folder name cannot be only dots");
    assert_eq!(name_error(" .. ", &folder), "Folder name cannot be only dots");
    assert!(!is_valid_name("...", &NameRules::default().forbidding_dots()));
    assert!(is_valid_name("..a", &folder));

    assert!(is_valid_name("..", &NameRules::default()));
}

#[test]
fn test_ensure_valid_name() {
    let rules = NameRules::default();
    assert!(ensure_valid_name("notes.md", &rules).is_ok());

    let err = ensure_valid_name("aux", &rules).unwrap_err();
    assert_eq!(err.message, RESERVED_NAME_MESSAGE);
    assert_eq!(err.to_string(), RESERVED_NAME_MESSAGE);
}
