use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Natural-key title as declared by a file server.
///
/// This is the only place a remote title is normalized before it is compared
/// with stored `original_title` / `show_title` values. Surrounding whitespace
/// is trimmed; everything else is kept byte-for-byte.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct CatalogTitle(String);

impl CatalogTitle {
    pub fn new(title: impl AsRef<str>) -> Result<Self> {
        let trimmed = title.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ModelError::InvalidTitle(
                "catalog title cannot be empty".to_string(),
            ));
        }
        Ok(CatalogTitle(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CatalogTitle {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        CatalogTitle::new(value)
    }
}

impl From<CatalogTitle> for String {
    fn from(title: CatalogTitle) -> String {
        title.0
    }
}

impl AsRef<str> for CatalogTitle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CatalogTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace_only() {
        let title = CatalogTitle::new("  The  Matrix \n").unwrap();
        assert_eq!(title.as_str(), "The  Matrix");
    }

    #[test]
    fn rejects_blank_titles() {
        assert!(CatalogTitle::new("   ").is_err());
    }
}
