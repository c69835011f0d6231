//! Maps server error messages onto [`ErrorKind`].

use crate::error::ErrorKind;
use regex::Regex;
use std::sync::LazyLock;

const AUTHENTICATION_PHRASES: &[&str] = &[
    "problem with authentication",
    "You don't have permission to perform this query type",
];

const NO_DATABASE_PHRASES: &[&str] = &["Specify a namespace", "Specify a database"];

static RECORD_ALREADY_EXISTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Database record `([^:`]+):([^`]+)` already exists").expect("valid regex")
});

static UNIQUE_INDEX_VIOLATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Database index `([^`]+)` already contains .+, with record `([^:`]+):([^`]+)`")
        .expect("valid regex")
});

/// Classifies a server error message.
///
/// Patterns are case-sensitive and tried in a fixed order; anything
/// unrecognized becomes [`ErrorKind::Generic`] with the message unchanged.
pub fn classify(message: &str) -> ErrorKind {
    if AUTHENTICATION_PHRASES.iter().any(|p| message.contains(p)) {
        return ErrorKind::AuthenticationFailed;
    }

    if NO_DATABASE_PHRASES.iter().any(|p| message.contains(p)) {
        return ErrorKind::NoDatabaseSelected;
    }

    if let Some(caps) = RECORD_ALREADY_EXISTS.captures(message) {
        return ErrorKind::RecordAlreadyExists {
            table: caps[1].to_string(),
            id: caps[2].to_string(),
        };
    }

    if let Some(caps) = UNIQUE_INDEX_VIOLATION.captures(message) {
        return ErrorKind::UniqueIndexViolation {
            index: caps[1].to_string(),
            table: caps[2].to_string(),
            id: caps[3].to_string(),
        };
    }

    ErrorKind::Generic(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_authentication_failed() {
        assert_eq!(
            classify("There was a problem with authentication"),
            ErrorKind::AuthenticationFailed
        );
        assert_eq!(
            classify("You don't have permission to perform this query type"),
            ErrorKind::AuthenticationFailed
        );
    }

    #[test]
    fn test_no_database_selected() {
        assert_eq!(
            classify("There was a problem with the database: Specify a namespace to use"),
            ErrorKind::NoDatabaseSelected
        );
        assert_eq!(
            classify("Specify a database to use"),
            ErrorKind::NoDatabaseSelected
        );
    }

    #[test]
    fn test_record_already_exists() {
        assert_eq!(
            classify("Database record `person:1` already exists"),
            ErrorKind::RecordAlreadyExists {
                table: "person".to_string(),
                id: "1".to_string(),
            }
        );
    }

    #[test]
    fn test_record_already_exists_with_server_prefix() {
        assert_eq!(
            classify("There was a problem with the database: Database record `person:tobie` already exists"),
            ErrorKind::RecordAlreadyExists {
                table: "person".to_string(),
                id: "tobie".to_string(),
            }
        );
    }

    #[test]
    fn test_record_id_containing_colon() {
        assert_eq!(
            classify("Database record `event:2024:01` already exists"),
            ErrorKind::RecordAlreadyExists {
                table: "event".to_string(),
                id: "2024:01".to_string(),
            }
        );
    }

    #[test]
    fn test_unique_index_violation() {
        let message = "There was a problem with the database: Database index `email_idx` \
                       already contains ['tobie@surrealdb.com'], with record `user:tobie`";
        assert_eq!(
            classify(message),
            ErrorKind::UniqueIndexViolation {
                table: "user".to_string(),
                index: "email_idx".to_string(),
                id: "tobie".to_string(),
            }
        );
    }

    #[test]
    fn test_patterns_are_case_sensitive() {
        let message = "There was a PROBLEM WITH AUTHENTICATION";
        assert_eq!(classify(message), ErrorKind::Generic(message.to_string()));
    }

    #[test]
    fn test_unrecognized_is_generic() {
        let message = "Parse error on line 1 at character 0 when parsing 'SELEC'";
        assert_eq!(classify(message), ErrorKind::Generic(message.to_string()));
        assert_eq!(classify(""), ErrorKind::Generic(String::new()));
    }

    proptest! {
        #[test]
        fn prop_plain_text_passes_through(message in "[a-zA-Z0-9 .,']{0,64}") {
            prop_assert_eq!(classify(&message), ErrorKind::Generic(message.clone()));
        }

        #[test]
        fn prop_record_capture(table in "[a-z_]{1,12}", id in "[a-z0-9]{1,12}") {
            let message = format!("Database record `{}:{}` already exists", table, id);
            prop_assert_eq!(
                classify(&message),
                ErrorKind::RecordAlreadyExists { table, id }
            );
        }
    }
}
