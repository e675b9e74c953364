// Catalog resolver - turns a library item into the catalog's genre list
//
// Query strategy:
// - movies: "{title} {year}" only
// - series: "{title} {year}", then "{title}" if the first search is empty
// The catalog's first result is trusted as the best match.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{CandidateMatch, GenreSet, MediaKind};

/// Operations the resolver needs from a metadata catalog
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Search movies, results in the catalog's relevance order
    async fn search_movies(&self, query: &str) -> Result<Vec<CandidateMatch>>;

    /// Search TV series, results in the catalog's relevance order
    async fn search_series(&self, query: &str) -> Result<Vec<CandidateMatch>>;

    /// Genre names for one catalog entry
    async fn fetch_genres(&self, kind: MediaKind, external_id: i64) -> Result<Vec<String>>;
}

/// Result of looking an item up in the catalog
#[derive(Debug)]
pub enum Lookup {
    /// Matched, with the match's genres (may be empty)
    Found {
        candidate: CandidateMatch,
        genres: GenreSet,
    },
    /// Search returned nothing
    NotFound,
    /// Search or detail fetch failed; the error is logged by the resolver
    Failed,
}

impl Lookup {
    /// Candidate genres for reconciliation; anything but a match is empty
    pub fn into_genres(self) -> GenreSet {
        match self {
            Lookup::Found { genres, .. } => genres,
            Lookup::NotFound | Lookup::Failed => GenreSet::new(),
        }
    }
}

/// Build the search text for an item
pub fn search_query(title: &str, year: Option<i32>) -> String {
    match year {
        Some(year) => format!("{} {}", title, year),
        None => title.to_string(),
    }
}

pub struct CatalogResolver {
    catalog: Arc<dyn CatalogClient>,
}

impl CatalogResolver {
    pub fn new(catalog: Arc<dyn CatalogClient>) -> Self {
        Self { catalog }
    }

    /// Look up genres for an item. Errors are logged here and come back as
    /// `Lookup::Failed`, never as a propagated error.
    pub async fn resolve(&self, title: &str, year: Option<i32>, kind: MediaKind) -> Lookup {
        match self.try_resolve(title, year, kind).await {
            Ok(Some((candidate, genres))) => Lookup::Found { candidate, genres },
            Ok(None) => Lookup::NotFound,
            Err(e) => {
                tracing::warn!("  - Could not fetch catalog genres for '{}': {:#}", title, e);
                Lookup::Failed
            }
        }
    }

    async fn try_resolve(
        &self,
        title: &str,
        year: Option<i32>,
        kind: MediaKind,
    ) -> Result<Option<(CandidateMatch, GenreSet)>> {
        let query = search_query(title, year);

        let results = match kind {
            MediaKind::Movie => self.catalog.search_movies(&query).await?,
            MediaKind::Series => {
                let results = self.catalog.search_series(&query).await?;
                // Some catalogs index shows without the year; retry on the bare title.
                // No year proximity check is applied to the fallback results.
                if results.is_empty() && query != title {
                    tracing::debug!("No series results for '{}', retrying without year", query);
                    self.catalog.search_series(title).await?
                } else {
                    results
                }
            }
        };

        let Some(candidate) = results.into_iter().next() else {
            return Ok(None);
        };

        let genres = self
            .catalog
            .fetch_genres(kind, candidate.external_id)
            .await?
            .into_iter()
            .collect();

        Ok(Some((candidate, genres)))
    }
}
