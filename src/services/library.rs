// Library access - the server seam and the section walker

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{GenreSet, LibrarySection, MediaItem, MediaKind};

/// A single edit to an item's genre field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenreEdit {
    /// Remove these tags and set the field's lock
    Clear { remove: GenreSet, locked: bool },
    /// Append these tags and set the field's lock
    Add { genres: GenreSet, locked: bool },
}

/// Operations needed from the media library server
#[async_trait]
pub trait LibraryClient: Send + Sync {
    async fn list_sections(&self) -> Result<Vec<LibrarySection>>;

    /// All items of a section, with their current genre tags
    async fn list_items(&self, section: &LibrarySection, kind: MediaKind) -> Result<Vec<MediaItem>>;

    async fn mutate_genres(&self, item: &MediaItem, edit: &GenreEdit) -> Result<()>;

    /// Re-read an item to observe its post-mutation state
    async fn refetch(&self, item: &MediaItem) -> Result<MediaItem>;
}

/// Result of enumerating the server's sections
#[derive(Debug, Default)]
pub struct Sections {
    /// Supported sections with their item kind, in server order
    pub eligible: Vec<(MediaKind, LibrarySection)>,
    pub skipped: Vec<LibrarySection>,
}

/// Enumerates sections and their items, one section at a time.
///
/// Nothing is remembered between runs; every run starts from the server's
/// current section list.
pub struct LibraryWalker {
    library: Arc<dyn LibraryClient>,
}

impl LibraryWalker {
    pub fn new(library: Arc<dyn LibraryClient>) -> Self {
        Self { library }
    }

    /// Split the server's sections into supported ones and the rest.
    /// Unsupported sections are logged, not treated as errors.
    pub async fn sections(&self) -> Result<Sections> {
        tracing::info!("Fetching all libraries from the library server...");
        let mut sections = Sections::default();

        for section in self.library.list_sections().await? {
            match MediaKind::from_section_type(&section.section_type) {
                Some(kind) => sections.eligible.push((kind, section)),
                None => {
                    tracing::info!(
                        "Skipping library '{}' (type: {}).",
                        section.title,
                        section.section_type
                    );
                    sections.skipped.push(section);
                }
            }
        }

        Ok(sections)
    }

    /// Items of one section, fetched when asked for
    pub async fn items(&self, section: &LibrarySection, kind: MediaKind) -> Result<Vec<MediaItem>> {
        self.library.list_items(section, kind).await
    }
}
