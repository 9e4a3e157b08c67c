//! Target descriptors for connectable applications.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Category of target application an adapter can drive.
///
/// The set is closed: resolving an adapter goes through this enum, never
/// through free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Browser-based applications driven through a web automation backend.
    Web,
    /// Native Windows applications driven through a UI automation session.
    Windows,
    /// Game builds driven through an image/input automation backend.
    Game,
    /// Audio plugins loaded into a DAW host.
    Vst,
}

impl Category {
    /// Returns the canonical string tag for this category.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Web => "web",
            Category::Windows => "windows",
            Category::Game => "game",
            Category::Vst => "vst",
        }
    }

    /// All known categories, in registration order.
    pub fn all() -> [Category; 4] {
        [
            Category::Web,
            Category::Windows,
            Category::Game,
            Category::Vst,
        ]
    }
}

impl std::str::FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Category::Web),
            "windows" => Ok(Category::Windows),
            "game" => Ok(Category::Game),
            "vst" => Ok(Category::Vst),
            other => Err(Error::UnknownCategory(other.to_string())),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies one connection target: a path, URL, or session handle plus the
/// category tag that selects the adapter responsible for it.
///
/// Immutable once created; supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Path, URL, or opaque handle of the target application.
    pub location: String,
    /// Category tag used for adapter resolution.
    pub category: Category,
}

impl TargetDescriptor {
    /// Creates a new target descriptor.
    pub fn new(location: impl Into<String>, category: Category) -> Self {
        Self {
            location: location.into(),
            category,
        }
    }
}

impl std::fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.category, self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_category_round_trip() {
        for category in Category::all() {
            assert_eq!(Category::from_str(category.as_str()).unwrap(), category);
        }
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = Category::from_str("daw").unwrap_err();
        assert!(matches!(err, Error::UnknownCategory(name) if name == "daw"));
    }

    #[test]
    fn test_serde_tag_format() {
        let json = serde_json::to_string(&Category::Windows).unwrap();
        assert_eq!(json, "\"windows\"");
    }

    #[test]
    fn test_descriptor_display() {
        let target = TargetDescriptor::new("https://app.example.com", Category::Web);
        assert_eq!(target.to_string(), "web:https://app.example.com");
    }
}
