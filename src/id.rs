//! Code for handling IDs
use anyhow::{Result, ensure};
use std::collections::HashSet;

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            Debug,
            serde::Serialize,
        )]
        /// An ID type (e.g. `ResourceID`)
        pub struct $name(pub std::sync::Arc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::sync::Arc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::sync::Arc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::sync::Arc::from(id))
            }
        }
    };
}

define_id_type!(ResourceID);

/// Check that the given IDs are unique and non-empty
pub fn check_ids_unique<'a, I>(ids: I) -> Result<()>
where
    I: IntoIterator<Item = &'a ResourceID>,
{
    let mut seen = HashSet::new();
    for id in ids {
        ensure!(!id.0.trim().is_empty(), "IDs cannot be empty");
        ensure!(seen.insert(id), "Duplicate ID found: {id}");
    }

    Ok(())
}
