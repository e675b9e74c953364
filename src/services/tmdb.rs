// TMDB metadata catalog client
// API Documentation: https://developer.themoviedb.org/reference/intro/getting-started

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::catalog::CatalogClient;
use crate::models::{CandidateMatch, MediaKind};

const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";

/// TMDB API client
pub struct TmdbClient {
    client: Client,
    api_key: String,
    language: String,
    base_url: String,
}

/// Search result for TV shows
#[derive(Debug, Deserialize)]
pub struct TvSearchResults {
    pub results: Vec<TvSearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct TvSearchResult {
    pub id: i64,
    pub name: String,
    pub first_air_date: Option<String>,
}

/// Search result for movies
#[derive(Debug, Deserialize)]
pub struct MovieSearchResults {
    pub results: Vec<MovieSearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovieSearchResult {
    pub id: i64,
    pub title: String,
    pub release_date: Option<String>,
}

/// Detail response, shared by movies and TV shows as far as genres go
#[derive(Debug, Deserialize)]
pub struct GenreDetails {
    pub genres: Option<Vec<Genre>>,
}

#[derive(Debug, Deserialize)]
pub struct Genre {
    pub name: String,
}

/// Year from a TMDB date ("2010-07-15" -> 2010)
fn year_from_date(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.split('-').next())
        .and_then(|y| y.parse().ok())
}

impl TmdbClient {
    /// Create a new TMDB client
    pub fn new(api_key: String, language: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build TMDB HTTP client")?;

        Ok(Self {
            client,
            api_key,
            language,
            base_url: TMDB_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API root
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        what: &str,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", self.language.as_str())])
            .query(params)
            .send()
            .await
            .with_context(|| format!("Failed to request TMDB {}", what))?;

        if !response.status().is_success() {
            anyhow::bail!("TMDB {} failed with status: {}", what, response.status());
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse TMDB {} response", what))
    }

    /// Search for movies by free-text query
    pub async fn search_movie(&self, query: &str) -> Result<Vec<MovieSearchResult>> {
        tracing::debug!("TMDB movie search: {}", query);
        let response: MovieSearchResults = self
            .get_json(
                "/search/movie",
                &[("query", query), ("include_adult", "false")],
                "movie search",
            )
            .await?;
        Ok(response.results)
    }

    /// Search for TV shows by free-text query
    pub async fn search_tv(&self, query: &str) -> Result<Vec<TvSearchResult>> {
        tracing::debug!("TMDB TV search: {}", query);
        let response: TvSearchResults = self
            .get_json(
                "/search/tv",
                &[("query", query), ("include_adult", "false")],
                "TV search",
            )
            .await?;
        Ok(response.results)
    }

    /// Get genre names for a movie
    pub async fn get_movie_genres(&self, tmdb_id: i64) -> Result<Vec<String>> {
        let details: GenreDetails = self
            .get_json(&format!("/movie/{}", tmdb_id), &[], "movie details")
            .await?;
        Ok(Self::genre_names(details))
    }

    /// Get genre names for a TV show
    pub async fn get_tv_genres(&self, tmdb_id: i64) -> Result<Vec<String>> {
        let details: GenreDetails = self
            .get_json(&format!("/tv/{}", tmdb_id), &[], "TV details")
            .await?;
        Ok(Self::genre_names(details))
    }

    fn genre_names(details: GenreDetails) -> Vec<String> {
        details
            .genres
            .map(|g| g.into_iter().map(|genre| genre.name).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogClient for TmdbClient {
    async fn search_movies(&self, query: &str) -> Result<Vec<CandidateMatch>> {
        let results = self.search_movie(query).await?;
        Ok(results
            .into_iter()
            .map(|r| CandidateMatch {
                external_id: r.id,
                year: year_from_date(r.release_date.as_deref()),
                title: r.title,
            })
            .collect())
    }

    async fn search_series(&self, query: &str) -> Result<Vec<CandidateMatch>> {
        let results = self.search_tv(query).await?;
        Ok(results
            .into_iter()
            .map(|r| CandidateMatch {
                external_id: r.id,
                year: year_from_date(r.first_air_date.as_deref()),
                title: r.name,
            })
            .collect())
    }

    async fn fetch_genres(&self, kind: MediaKind, external_id: i64) -> Result<Vec<String>> {
        match kind {
            MediaKind::Movie => self.get_movie_genres(external_id).await,
            MediaKind::Series => self.get_tv_genres(external_id).await,
        }
    }
}
