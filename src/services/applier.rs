// Mutation applier - carries a reconciliation decision out on the library server
//
// The server has no atomic replace: a Replace is a clear followed by an add,
// each confirmed by re-reading the item. If the add fails after a successful
// clear the item is left without genres; no compensating write is attempted.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::library::{GenreEdit, LibraryClient};
use super::reconcile::Decision;
use crate::models::{GenreSet, MediaItem};

/// Step of a mutation that went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStage {
    Clear,
    Add,
}

impl fmt::Display for MutationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationStage::Clear => write!(f, "clear"),
            MutationStage::Add => write!(f, "add"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("failed to {stage} genres for '{title}': {reason}")]
    Remote {
        title: String,
        stage: MutationStage,
        reason: String,
    },

    #[error("{stage} of genres for '{title}' not reflected by the server (now {observed})")]
    Unconfirmed {
        title: String,
        stage: MutationStage,
        observed: GenreSet,
    },
}

impl MutationError {
    pub fn stage(&self) -> MutationStage {
        match self {
            MutationError::Remote { stage, .. } | MutationError::Unconfirmed { stage, .. } => {
                *stage
            }
        }
    }
}

/// What was done to an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Nothing,
    Added(GenreSet),
    Replaced(GenreSet),
}

pub struct MutationApplier {
    library: Arc<dyn LibraryClient>,
}

impl MutationApplier {
    pub fn new(library: Arc<dyn LibraryClient>) -> Self {
        Self { library }
    }

    pub async fn apply(
        &self,
        item: &MediaItem,
        decision: &Decision,
    ) -> Result<Applied, MutationError> {
        match decision {
            Decision::Skip(_) => Ok(Applied::Nothing),
            Decision::Add(genres) => {
                self.add(item, genres).await?;
                Ok(Applied::Added(genres.clone()))
            }
            Decision::Replace(genres) => {
                self.clear(item).await?;
                self.add(item, genres).await?;
                Ok(Applied::Replaced(genres.clone()))
            }
        }
    }

    /// Remove every current tag and unlock the field, then confirm
    async fn clear(&self, item: &MediaItem) -> Result<(), MutationError> {
        // Section listings can carry a shortened tag list; remove what the
        // server reports for the item itself as well.
        let current = self.reload(item, MutationStage::Clear).await?;
        let edit = GenreEdit::Clear {
            remove: item.genres.iter().chain(current.genres.iter()).collect(),
            locked: false,
        };
        self.mutate(item, &edit, MutationStage::Clear).await?;

        let reloaded = self.reload(item, MutationStage::Clear).await?;
        if !reloaded.genres.is_empty() {
            return Err(MutationError::Unconfirmed {
                title: item.title.clone(),
                stage: MutationStage::Clear,
                observed: reloaded.genres,
            });
        }
        Ok(())
    }

    /// Add tags, leaving the field unlocked, then confirm
    async fn add(&self, item: &MediaItem, genres: &GenreSet) -> Result<(), MutationError> {
        let edit = GenreEdit::Add {
            genres: genres.clone(),
            locked: false,
        };
        self.mutate(item, &edit, MutationStage::Add).await?;

        let reloaded = self.reload(item, MutationStage::Add).await?;
        if let Some(missing) = genres.iter().find(|g| !reloaded.genres.contains(g)) {
            tracing::debug!("'{}' missing genre '{}' after add", item.title, missing);
            return Err(MutationError::Unconfirmed {
                title: item.title.clone(),
                stage: MutationStage::Add,
                observed: reloaded.genres,
            });
        }
        Ok(())
    }

    async fn mutate(
        &self,
        item: &MediaItem,
        edit: &GenreEdit,
        stage: MutationStage,
    ) -> Result<(), MutationError> {
        self.library
            .mutate_genres(item, edit)
            .await
            .map_err(|e| MutationError::Remote {
                title: item.title.clone(),
                stage,
                reason: format!("{:#}", e),
            })
    }

    async fn reload(
        &self,
        item: &MediaItem,
        stage: MutationStage,
    ) -> Result<MediaItem, MutationError> {
        self.library
            .refetch(item)
            .await
            .map_err(|e| MutationError::Remote {
                title: item.title.clone(),
                stage,
                reason: format!("re-read failed: {:#}", e),
            })
    }
}
