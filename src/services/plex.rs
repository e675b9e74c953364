// Plex Media Server client
// Talks to the server's HTTP API with JSON responses (Accept: application/json)

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::library::{GenreEdit, LibraryClient};
use crate::models::{LibrarySection, MediaItem, MediaKind};

/// Plex API client
pub struct PlexClient {
    client: Client,
    base_url: String,
    token: String,
}

/// Every Plex response is wrapped in a MediaContainer
#[derive(Debug, Deserialize)]
struct ContainerResponse<T> {
    #[serde(rename = "MediaContainer")]
    media_container: T,
}

#[derive(Debug, Deserialize)]
pub struct IdentityContainer {
    #[serde(rename = "machineIdentifier")]
    pub machine_identifier: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SectionsContainer {
    #[serde(rename = "Directory", default)]
    directory: Vec<PlexDirectory>,
}

#[derive(Debug, Deserialize)]
struct PlexDirectory {
    key: String,
    title: String,
    #[serde(rename = "type")]
    section_type: String,
}

#[derive(Debug, Deserialize)]
struct MetadataContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<PlexMetadata>,
}

#[derive(Debug, Deserialize)]
struct PlexMetadata {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    title: String,
    year: Option<i32>,
    #[serde(rename = "Genre", default)]
    genres: Vec<PlexTag>,
}

#[derive(Debug, Deserialize)]
struct PlexTag {
    tag: String,
}

impl PlexMetadata {
    fn into_item(self, section_key: &str, kind: MediaKind) -> MediaItem {
        MediaItem {
            id: self.rating_key,
            section_key: section_key.to_string(),
            title: self.title,
            year: self.year,
            kind,
            genres: self.genres.into_iter().map(|g| g.tag).collect(),
        }
    }
}

/// Query parameters for a genre edit on one item
fn edit_params(item: &MediaItem, edit: &GenreEdit) -> Vec<(String, String)> {
    let mut params = vec![
        ("type".to_string(), item.kind.library_type_code().to_string()),
        ("id".to_string(), item.id.clone()),
    ];

    let (locked, tags) = match edit {
        GenreEdit::Clear { remove, locked } => {
            if !remove.is_empty() {
                // Removal takes a comma separated list, each tag encoded on its own
                let joined = remove
                    .iter()
                    .map(|t| urlencoding::encode(t).into_owned())
                    .collect::<Vec<_>>()
                    .join(",");
                params.push(("genre[].tag.tag-".to_string(), joined));
            }
            (*locked, None)
        }
        GenreEdit::Add { genres, locked } => (*locked, Some(genres)),
    };

    if let Some(tags) = tags {
        for (i, tag) in tags.iter().enumerate() {
            params.push((format!("genre[{}].tag.tag", i), tag.to_string()));
        }
    }

    params.push((
        "genre.locked".to_string(),
        if locked { "1" } else { "0" }.to_string(),
    ));
    params
}

impl PlexClient {
    /// Create a client; no request is made until `identity` or a library call
    pub fn new(base_url: &str, token: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Plex HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-Plex-Token", self.token.as_str())
            .header("Accept", "application/json")
    }

    async fn get_container<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .with_context(|| format!("Failed to request Plex {}", path))?;

        if !response.status().is_success() {
            anyhow::bail!("Plex {} failed with status: {}", path, response.status());
        }

        let body: ContainerResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse Plex {} response", path))?;

        Ok(body.media_container)
    }

    /// Probe the server; used at startup to fail fast on a bad URL or token
    pub async fn identity(&self) -> Result<IdentityContainer> {
        self.get_container("/identity").await
    }
}

#[async_trait]
impl LibraryClient for PlexClient {
    async fn list_sections(&self) -> Result<Vec<LibrarySection>> {
        let container: SectionsContainer = self.get_container("/library/sections").await?;

        Ok(container
            .directory
            .into_iter()
            .map(|d| LibrarySection {
                key: d.key,
                title: d.title,
                section_type: d.section_type,
            })
            .collect())
    }

    async fn list_items(
        &self,
        section: &LibrarySection,
        kind: MediaKind,
    ) -> Result<Vec<MediaItem>> {
        let container: MetadataContainer = self
            .get_container(&format!("/library/sections/{}/all", section.key))
            .await?;

        Ok(container
            .metadata
            .into_iter()
            .map(|m| m.into_item(&section.key, kind))
            .collect())
    }

    async fn mutate_genres(&self, item: &MediaItem, edit: &GenreEdit) -> Result<()> {
        let path = format!("/library/sections/{}/all", item.section_key);
        let response = self
            .request(Method::PUT, &path)
            .query(&edit_params(item, edit))
            .send()
            .await
            .with_context(|| format!("Failed to edit genres of '{}'", item.title))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Plex genre edit of '{}' failed with status: {}",
                item.title,
                response.status()
            );
        }
        Ok(())
    }

    async fn refetch(&self, item: &MediaItem) -> Result<MediaItem> {
        let container: MetadataContainer = self
            .get_container(&format!("/library/metadata/{}", item.id))
            .await?;

        container
            .metadata
            .into_iter()
            .next()
            .map(|m| m.into_item(&item.section_key, item.kind))
            .with_context(|| format!("Plex returned no metadata for '{}'", item.title))
    }
}
