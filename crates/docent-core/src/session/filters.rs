use serde::{Deserialize, Serialize};

const WELCOME_OPENING: &str = "Welcome to the New England First Amendment Coalition, the region's \
leading defender of First Amendment freedoms and government transparency.";
const WELCOME_CLOSING: &str = "How can I help you?";

/// Facets narrowing backend retrieval. Empty strings mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    pub role_filter: String,
    pub content_type: String,
    pub resource_type: String,
}

impl Filters {
    pub fn for_role(role: impl Into<String>) -> Self {
        Self {
            role_filter: role.into(),
            ..Self::default()
        }
    }
}

/// Greeting that opens every transcript. A role id adds
/// "I see that you are a(n) {role}." using "an" for a lowercase vowel.
pub fn welcome_message(role: &str) -> String {
    match role.chars().next() {
        None => format!("{WELCOME_OPENING} {WELCOME_CLOSING}"),
        Some(first) => {
            let article = if matches!(first, 'a' | 'e' | 'i' | 'o' | 'u') {
                "an"
            } else {
                "a"
            };
            format!("{WELCOME_OPENING} I see that you are {article} {role}. {WELCOME_CLOSING}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_without_role() {
        assert_eq!(
            welcome_message(""),
            "Welcome to the New England First Amendment Coalition, the region's leading defender \
             of First Amendment freedoms and government transparency. How can I help you?"
        );
    }

    #[test]
    fn test_welcome_article_by_vowel() {
        assert!(welcome_message("educator").contains("I see that you are an educator. How can I help you?"));
        assert!(welcome_message("journalist").contains("I see that you are a journalist. How"));
        assert!(welcome_message("citizen").contains("you are a citizen."));
        assert!(welcome_message("lawyer").contains("you are a lawyer."));
    }

    #[test]
    fn test_welcome_is_reproducible() {
        assert_eq!(welcome_message("educator"), welcome_message("educator"));
    }
}
