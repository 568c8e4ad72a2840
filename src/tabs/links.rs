//! Derived tablature search links
//!
//! For every recognized song two deterministic search URLs are built
//! against a public tab search endpoint, one for guitar and one for
//! piano. Nothing here touches the network; the links are handed to
//! the caller to open or bookmark.

/// Default tab search endpoint
pub const DEFAULT_SEARCH_URL: &str = "https://www.ultimate-guitar.com/search.php";

/// The pair of derived search links for one match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabLinks {
    /// Guitar tab search URL
    pub guitar: String,
    /// Piano tab search URL (same query, suffixed with "piano")
    pub piano: String,
}

impl TabLinks {
    /// Build the links from a recognized title and artist.
    ///
    /// Both fields are required; a match missing either cannot produce
    /// a meaningful search query.
    pub fn derive(search_url: &str, title: Option<&str>, artist: Option<&str>) -> Option<Self> {
        let (title, artist) = match (title, artist) {
            (Some(t), Some(a)) if !t.is_empty() && !a.is_empty() => (t, a),
            _ => return None,
        };

        let query = urlencoding::encode(&format!("{} {}", title, artist)).into_owned();
        Some(Self {
            guitar: format!("{}?search_type=title&value={}", search_url, query),
            piano: format!("{}?search_type=title&value={}%20piano", search_url, query),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_encodes_query() {
        let links = TabLinks::derive(
            DEFAULT_SEARCH_URL,
            Some("Blackbird"),
            Some("The Beatles"),
        )
        .unwrap();

        assert_eq!(
            links.guitar,
            "https://www.ultimate-guitar.com/search.php?search_type=title&value=Blackbird%20The%20Beatles"
        );
        assert_eq!(
            links.piano,
            "https://www.ultimate-guitar.com/search.php?search_type=title&value=Blackbird%20The%20Beatles%20piano"
        );
    }

    #[test]
    fn test_derive_escapes_reserved_characters() {
        let links =
            TabLinks::derive(DEFAULT_SEARCH_URL, Some("Don't Stop"), Some("AC/DC")).unwrap();
        assert!(links.guitar.contains("Don%27t%20Stop%20AC%2FDC"));
    }

    #[test]
    fn test_derive_requires_title_and_artist() {
        assert!(TabLinks::derive(DEFAULT_SEARCH_URL, None, Some("The Beatles")).is_none());
        assert!(TabLinks::derive(DEFAULT_SEARCH_URL, Some("Blackbird"), None).is_none());
        assert!(TabLinks::derive(DEFAULT_SEARCH_URL, Some(""), Some("The Beatles")).is_none());
    }
}
