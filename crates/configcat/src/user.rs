//! # User Object
//!
//! Identifies the caller for targeting rule and percentage evaluation.
//!
//! The only mandatory attribute is the identifier. `Email` and `Country` are
//! well-known attributes, anything else goes into the custom attributes and
//! can be referenced by name from a targeting rule.
//!
//! ```rust
//! use configcat::User;
//!
//! let user = User::builder()
//!     .email("john@example.com")
//!     .country("Hungary")
//!     .custom_attribute("SubscriptionType", "Pro")
//!     .build("#SOME-USER-ID#");
//!
//! assert_eq!(user.attribute("Email"), Some("john@example.com"));
//! ```

use std::collections::BTreeMap;
use std::fmt;

const IDENTIFIER: &str = "Identifier";
const EMAIL: &str = "Email";
const COUNTRY: &str = "Country";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    identifier: String,
    attributes: BTreeMap<String, String>,
}

impl User {
    pub fn builder() -> UserBuilder {
        UserBuilder::default()
    }

    /// Shorthand for a user that only carries an identifier.
    pub fn new(identifier: impl Into<String>) -> Self {
        UserBuilder::default().build(identifier)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let well_known = [IDENTIFIER, EMAIL, COUNTRY];
        let ordered = well_known
            .iter()
            .filter_map(|key| self.attributes.get_key_value(*key))
            .chain(
                self.attributes
                    .iter()
                    .filter(|(key, _)| !well_known.contains(&key.as_str())),
            );

        write!(f, "{{")?;
        for (index, (key, value)) in ordered.enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            let key = serde_json::to_string(key).map_err(|_| fmt::Error)?;
            let value = serde_json::to_string(value).map_err(|_| fmt::Error)?;
            write!(f, "{}:{}", key, value)?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserBuilder {
    email: Option<String>,
    country: Option<String>,
    custom: BTreeMap<String, String>,
}

impl UserBuilder {
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn custom<K, V>(mut self, custom: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.custom
            .extend(custom.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn custom_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    pub fn build(self, identifier: impl Into<String>) -> User {
        let identifier = identifier.into();
        let mut attributes = BTreeMap::new();
        attributes.insert(IDENTIFIER.to_string(), identifier.clone());

        if let Some(country) = self.country.filter(|c| !c.is_empty()) {
            attributes.insert(COUNTRY.to_string(), country);
        }
        if let Some(email) = self.email.filter(|e| !e.is_empty()) {
            attributes.insert(EMAIL.to_string(), email);
        }
        // Custom attributes are applied last and may shadow the well-known ones.
        attributes.extend(self.custom);

        User {
            identifier,
            attributes,
        }
    }
}
