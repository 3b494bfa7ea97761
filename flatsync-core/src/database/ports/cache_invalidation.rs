use async_trait::async_trait;

use crate::Result;

/// Drops derived read caches after catalog deletions.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// `patterns` use glob syntax, e.g. `catalog:movie:Alpha*`.
    async fn invalidate(&self, patterns: &[String]) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCacheInvalidator;

#[async_trait]
impl CacheInvalidator for NoopCacheInvalidator {
    async fn invalidate(&self, _patterns: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Cache key helpers for catalog read models.
#[derive(Debug)]
pub struct CacheKeys;

impl CacheKeys {
    /// Escapes the glob metacharacters Redis `KEYS` understands so a title
    /// only ever matches itself.
    pub fn escape(title: &str) -> String {
        let mut escaped = String::with_capacity(title.len());
        for c in title.chars() {
            if matches!(c, '\\' | '*' | '?' | '[' | ']') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    }

    pub fn movie(title: &str) -> String {
        format!("catalog:movie:{}*", Self::escape(title))
    }

    pub fn show(title: &str) -> String {
        format!("catalog:show:{}*", Self::escape(title))
    }

    pub fn season(title: &str, season_number: u32) -> String {
        format!("catalog:show:{}:season:{season_number}*", Self::escape(title))
    }

    pub fn episode(title: &str, season_number: u32, episode_number: u32) -> String {
        format!(
            "catalog:show:{}:season:{season_number}:episode:{episode_number}*",
            Self::escape(title)
        )
    }

    pub fn listings() -> String {
        "catalog:list:*".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_characters_in_titles_are_escaped() {
        assert_eq!(CacheKeys::movie("Alpha"), "catalog:movie:Alpha*");
        assert_eq!(
            CacheKeys::movie("Who? [Director's Cut] *"),
            r"catalog:movie:Who\? \[Director's Cut\] \**"
        );
        assert_eq!(
            CacheKeys::episode(r"Back\slash", 1, 2),
            r"catalog:show:Back\\slash:season:1:episode:2*"
        );
    }
}
