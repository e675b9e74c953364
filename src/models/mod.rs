use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Kind of library item the tagger knows how to look up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    /// Map a library section type tag ("movie", "show") to a kind
    pub fn from_section_type(section_type: &str) -> Option<Self> {
        match section_type {
            "movie" => Some(MediaKind::Movie),
            "show" => Some(MediaKind::Series),
            _ => None,
        }
    }

    /// Numeric type used by the library server's edit endpoint
    pub fn library_type_code(&self) -> u8 {
        match self {
            MediaKind::Movie => 1,
            MediaKind::Series => 2,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Series => write!(f, "show"),
        }
    }
}

/// Update policy, fixed for a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// Only add genres to items that have none
    #[default]
    Update,
    /// Overwrite existing genres with the catalog's
    FullSync,
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "update" => Ok(SyncMode::Update),
            "full-sync" => Ok(SyncMode::FullSync),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Update => write!(f, "update"),
            SyncMode::FullSync => write!(f, "full-sync"),
        }
    }
}

/// A set of genre names.
///
/// Keeps the order the names were first seen in, so writes go out in the
/// catalog's order, but compares as a set: order and duplicates never matter.
/// Names are case-sensitive and never normalized.
#[derive(Debug, Clone, Default)]
pub struct GenreSet {
    names: Vec<String>,
}

impl GenreSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    #[cfg(test)]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    fn insert(&mut self, name: String) {
        if !self.contains(&name) {
            self.names.push(name);
        }
    }
}

impl PartialEq for GenreSet {
    fn eq(&self, other: &Self) -> bool {
        let ours: HashSet<&str> = self.iter().collect();
        let theirs: HashSet<&str> = other.iter().collect();
        ours == theirs
    }
}

impl Eq for GenreSet {}

impl<S: Into<String>> FromIterator<S> for GenreSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = GenreSet::new();
        for name in iter {
            set.insert(name.into());
        }
        set
    }
}

impl fmt::Display for GenreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names.join(", "))
    }
}

/// A section on the library server
#[derive(Debug, Clone)]
pub struct LibrarySection {
    pub key: String,
    pub title: String,
    pub section_type: String,
}

/// An item as currently stored on the library server
#[derive(Debug, Clone)]
pub struct MediaItem {
    /// Opaque id assigned by the library server (Plex ratingKey)
    pub id: String,
    /// Key of the section the item lives in
    pub section_key: String,
    pub title: String,
    pub year: Option<i32>,
    pub kind: MediaKind,
    pub genres: GenreSet,
}

impl MediaItem {
    /// "Title (Year)" or "Title (N/A)" for progress lines
    pub fn display_name(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({})", self.title, year),
            None => format!("{} (N/A)", self.title),
        }
    }
}

/// A catalog search hit, only used to fetch genre details
#[derive(Debug, Clone)]
pub struct CandidateMatch {
    pub external_id: i64,
    pub title: String,
    pub year: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genre_set_equality_ignores_order_and_duplicates() {
        let a: GenreSet = ["Drama", "Action"].into_iter().collect();
        let b: GenreSet = ["Action", "Drama", "Action"].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(b.names().len(), 2);
        assert_eq!(b.names(), &["Action".to_string(), "Drama".to_string()]);
    }

    #[test]
    fn test_genre_set_is_case_sensitive() {
        let a: GenreSet = ["Sci-Fi"].into_iter().collect();
        let b: GenreSet = ["sci-fi"].into_iter().collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_sync_mode_parse() {
        assert_eq!("update".parse::<SyncMode>(), Ok(SyncMode::Update));
        assert_eq!("FULL-SYNC".parse::<SyncMode>(), Ok(SyncMode::FullSync));
        assert_eq!(" Full-Sync ".parse::<SyncMode>(), Ok(SyncMode::FullSync));
        assert!("overwrite".parse::<SyncMode>().is_err());
    }

    #[test]
    fn test_media_kind_from_section_type() {
        assert_eq!(MediaKind::from_section_type("movie"), Some(MediaKind::Movie));
        assert_eq!(MediaKind::from_section_type("show"), Some(MediaKind::Series));
        assert_eq!(MediaKind::from_section_type("artist"), None);
        assert_eq!(MediaKind::from_section_type("photo"), None);
    }

    #[test]
    fn test_display_name() {
        let mut item = MediaItem {
            id: "1".to_string(),
            section_key: "1".to_string(),
            title: "Inception".to_string(),
            year: Some(2010),
            kind: MediaKind::Movie,
            genres: GenreSet::new(),
        };
        assert_eq!(item.display_name(), "Inception (2010)");
        item.year = None;
        assert_eq!(item.display_name(), "Inception (N/A)");
    }
}
