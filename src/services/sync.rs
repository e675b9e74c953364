// Run driver - walks the library and reconciles every item's genres
//
// Per item: fetched -> resolved -> decided -> applied. Sections and items are
// handled one at a time. A failure at any stage is logged and the run moves
// on to the next item; nothing inside a run is fatal.

use std::sync::Arc;

use super::applier::{Applied, MutationApplier, MutationStage};
use super::catalog::{CatalogClient, CatalogResolver, Lookup};
use super::library::{LibraryClient, LibraryWalker};
use super::pacing::RateLimiter;
use super::reconcile::{self, Decision, SkipReason};
use crate::models::{GenreSet, MediaItem, SyncMode};

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sections_processed: usize,
    pub sections_skipped: usize,
    pub sections_failed: usize,
    pub items_processed: usize,
    pub added: usize,
    pub replaced: usize,
    pub skipped_no_candidate: usize,
    pub skipped_has_genres: usize,
    pub skipped_up_to_date: usize,
    pub lookup_failures: usize,
    pub mutation_failures: usize,
}

impl RunSummary {
    fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::NoCandidateGenres => self.skipped_no_candidate += 1,
            SkipReason::AlreadyHasGenres => self.skipped_has_genres += 1,
            SkipReason::AlreadyUpToDate => self.skipped_up_to_date += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_no_candidate + self.skipped_has_genres + self.skipped_up_to_date
    }

    pub fn log(&self) {
        tracing::info!(
            "Sections: {} processed, {} skipped, {} failed",
            self.sections_processed,
            self.sections_skipped,
            self.sections_failed
        );
        tracing::info!(
            "Items: {} processed, {} added, {} replaced, {} skipped \
             ({} no candidate genres, {} already had genres, {} already up to date)",
            self.items_processed,
            self.added,
            self.replaced,
            self.skipped(),
            self.skipped_no_candidate,
            self.skipped_has_genres,
            self.skipped_up_to_date
        );
        if self.lookup_failures > 0 || self.mutation_failures > 0 {
            tracing::warn!(
                "Failures: {} catalog lookups, {} mutations",
                self.lookup_failures,
                self.mutation_failures
            );
        }
    }
}

/// Whether an item reached out to the catalog or the library server
struct ItemOutcome {
    external_calls: bool,
}

pub struct GenreSync {
    walker: LibraryWalker,
    resolver: CatalogResolver,
    applier: MutationApplier,
    limiter: Arc<dyn RateLimiter>,
    mode: SyncMode,
}

impl GenreSync {
    pub fn new(
        library: Arc<dyn LibraryClient>,
        catalog: Arc<dyn CatalogClient>,
        limiter: Arc<dyn RateLimiter>,
        mode: SyncMode,
    ) -> Self {
        Self {
            walker: LibraryWalker::new(library.clone()),
            resolver: CatalogResolver::new(catalog),
            applier: MutationApplier::new(library),
            limiter,
            mode,
        }
    }

    /// Process every supported section. Always completes; failures are
    /// counted in the summary.
    pub async fn run(&self) -> RunSummary {
        tracing::info!("Starting genre tagger in '{}' mode.", self.mode);
        let mut summary = RunSummary::default();

        let sections = match self.walker.sections().await {
            Ok(sections) => {
                summary.sections_skipped = sections.skipped.len();
                sections.eligible
            }
            Err(e) => {
                tracing::error!("An error occurred while listing libraries: {:#}", e);
                summary.sections_failed += 1;
                return summary;
            }
        };

        for (kind, section) in sections {
            tracing::info!("Connecting to {} library: '{}'...", kind, section.title);

            let items = match self.walker.items(&section, kind).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::error!("Could not list items of '{}': {:#}", section.title, e);
                    summary.sections_failed += 1;
                    continue;
                }
            };

            tracing::info!("Scanning {} items...", items.len());
            for item in &items {
                let outcome = self.process_item(item, &mut summary).await;
                if outcome.external_calls {
                    self.limiter.wait().await;
                }
            }
            summary.sections_processed += 1;
        }

        summary
    }

    async fn process_item(&self, item: &MediaItem, summary: &mut RunSummary) -> ItemOutcome {
        tracing::info!("Processing: {}", item.display_name());
        summary.items_processed += 1;

        let mut external_calls = false;

        let candidate = if reconcile::needs_candidate(&item.genres, self.mode) {
            external_calls = true;
            self.lookup(item, summary).await
        } else {
            GenreSet::new()
        };

        let decision = reconcile::decide(&item.genres, &candidate, self.mode);
        self.log_decision(item, &decision);

        if !decision.is_skip() {
            external_calls = true;
        }

        match self.applier.apply(item, &decision).await {
            Ok(Applied::Nothing) => {
                if let Decision::Skip(reason) = decision {
                    summary.record_skip(reason);
                }
            }
            Ok(Applied::Added(genres)) => {
                tracing::info!("  - Successfully added genres {} for '{}'.", genres, item.title);
                summary.added += 1;
            }
            Ok(Applied::Replaced(genres)) => {
                tracing::info!(
                    "  - Successfully updated genres to {} for '{}'.",
                    genres,
                    item.title
                );
                summary.replaced += 1;
            }
            Err(e) => {
                tracing::warn!("  - {}", e);
                if matches!(decision, Decision::Replace(_)) && e.stage() == MutationStage::Add {
                    tracing::warn!(
                        "  - '{}' was cleared but not re-populated; it has no genres now.",
                        item.title
                    );
                }
                summary.mutation_failures += 1;
            }
        }

        ItemOutcome { external_calls }
    }

    async fn lookup(&self, item: &MediaItem, summary: &mut RunSummary) -> GenreSet {
        let lookup = self.resolver.resolve(&item.title, item.year, item.kind).await;
        match &lookup {
            Lookup::Found { candidate, .. } => tracing::debug!(
                "  - Matched catalog entry {} ('{}', {})",
                candidate.external_id,
                candidate.title,
                candidate.year.map_or("N/A".to_string(), |y| y.to_string())
            ),
            Lookup::NotFound => {}
            Lookup::Failed => summary.lookup_failures += 1,
        }
        lookup.into_genres()
    }

    fn log_decision(&self, item: &MediaItem, decision: &Decision) {
        match decision {
            Decision::Skip(SkipReason::AlreadyHasGenres) => {
                tracing::info!("  - Item already has genres. Skipping in '{}' mode.", self.mode);
            }
            Decision::Skip(SkipReason::NoCandidateGenres) => {
                tracing::info!("  - No catalog genres found for '{}'. Skipping.", item.title);
            }
            Decision::Skip(SkipReason::AlreadyUpToDate) => {
                tracing::info!("  - Genres are already up-to-date for '{}'.", item.title);
            }
            Decision::Add(genres) => {
                tracing::info!("  - [Update] Adding new genres.");
                tracing::info!("  - Found catalog genres: {}", genres);
            }
            Decision::Replace(genres) => {
                tracing::info!("  - [Full Sync] Overwriting genres.");
                tracing::info!("  - Existing genres: {}", item.genres);
                tracing::info!("  - New catalog genres: {}", genres);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;
    use crate::services::catalog::tests::FakeCatalog;
    use crate::services::library::tests::FakeLibrary;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLimiter {
        waits: AtomicUsize,
    }

    impl CountingLimiter {
        fn waits(&self) -> usize {
            self.waits.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateLimiter for CountingLimiter {
        async fn wait(&self) {
            self.waits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn set(names: &[&str]) -> GenreSet {
        names.iter().copied().collect()
    }

    fn genres(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    struct Harness {
        library: Arc<FakeLibrary>,
        catalog: Arc<FakeCatalog>,
        limiter: Arc<CountingLimiter>,
    }

    impl Harness {
        fn new(library: FakeLibrary, catalog: FakeCatalog) -> Self {
            Self {
                library: Arc::new(library),
                catalog: Arc::new(catalog),
                limiter: Arc::new(CountingLimiter::default()),
            }
        }

        async fn run(&self, mode: SyncMode) -> RunSummary {
            GenreSync::new(
                self.library.clone(),
                self.catalog.clone(),
                self.limiter.clone(),
                mode,
            )
            .run()
            .await
        }
    }

    fn movies_library(items: Vec<MediaItem>) -> FakeLibrary {
        FakeLibrary {
            sections: vec![FakeLibrary::section("1", "Movies", "movie")],
            ..Default::default()
        }
        .with_items("1", items)
    }

    #[tokio::test]
    async fn test_update_adds_genres_to_untagged_movie() {
        let library = movies_library(vec![FakeLibrary::item(
            "10",
            "1",
            "Inception",
            Some(2010),
            MediaKind::Movie,
            &[],
        )]);
        let mut catalog = FakeCatalog::default();
        catalog.movies.insert(
            "Inception 2010".to_string(),
            vec![FakeCatalog::candidate(27205, "Inception")],
        );
        catalog.genres.insert(27205, genres(&["Action", "Sci-Fi"]));
        let harness = Harness::new(library, catalog);

        let summary = harness.run(SyncMode::Update).await;

        assert_eq!(summary.added, 1);
        assert_eq!(summary.items_processed, 1);
        assert_eq!(
            harness.library.mutation_calls(),
            vec!["add:10:[Action, Sci-Fi]:locked=false"]
        );
        assert_eq!(
            harness.library.stored("10").unwrap().genres,
            set(&["Action", "Sci-Fi"])
        );
        assert_eq!(harness.limiter.waits(), 1);
    }

    #[tokio::test]
    async fn test_full_sync_replaces_series_genres_via_title_fallback() {
        let library = FakeLibrary {
            sections: vec![FakeLibrary::section("2", "TV Shows", "show")],
            ..Default::default()
        }
        .with_items(
            "2",
            vec![FakeLibrary::item(
                "20",
                "2",
                "The Office",
                Some(2005),
                MediaKind::Series,
                &["Comedy"],
            )],
        );
        let mut catalog = FakeCatalog::default();
        catalog.series.insert(
            "The Office".to_string(),
            vec![FakeCatalog::candidate(2316, "The Office")],
        );
        catalog.genres.insert(2316, genres(&["Comedy", "Drama"]));
        let harness = Harness::new(library, catalog);

        let summary = harness.run(SyncMode::FullSync).await;

        assert_eq!(summary.replaced, 1);
        assert_eq!(
            harness.catalog.calls(),
            vec!["series:The Office 2005", "series:The Office", "details:2316"]
        );
        assert_eq!(
            harness.library.calls(),
            vec![
                "sections",
                "items:2",
                "refetch:20",
                "clear:20:[Comedy]:locked=false",
                "refetch:20",
                "add:20:[Comedy, Drama]:locked=false",
                "refetch:20"
            ]
        );
        assert_eq!(
            harness.library.stored("20").unwrap().genres,
            set(&["Comedy", "Drama"])
        );
    }

    #[tokio::test]
    async fn test_update_skips_tagged_item_without_lookup() {
        let library = movies_library(vec![FakeLibrary::item(
            "30",
            "1",
            "Hereditary",
            Some(2018),
            MediaKind::Movie,
            &["Horror"],
        )]);
        let harness = Harness::new(library, FakeCatalog::default());

        let summary = harness.run(SyncMode::Update).await;

        assert_eq!(summary.skipped_has_genres, 1);
        assert!(harness.catalog.calls().is_empty());
        assert!(harness.library.mutation_calls().is_empty());
        assert_eq!(harness.limiter.waits(), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_skips_item_and_continues() {
        let library = movies_library(vec![
            FakeLibrary::item("40", "1", "Obscure Film", Some(1999), MediaKind::Movie, &[]),
            FakeLibrary::item("41", "1", "Heat", Some(1995), MediaKind::Movie, &[]),
        ]);
        let mut catalog = FakeCatalog {
            failing_queries: vec!["Obscure Film 1999".to_string()],
            ..Default::default()
        };
        catalog.movies.insert(
            "Heat 1995".to_string(),
            vec![FakeCatalog::candidate(949, "Heat")],
        );
        catalog.genres.insert(949, genres(&["Crime", "Drama"]));
        let harness = Harness::new(library, catalog);

        let summary = harness.run(SyncMode::Update).await;

        assert_eq!(summary.lookup_failures, 1);
        assert_eq!(summary.skipped_no_candidate, 1);
        assert_eq!(summary.added, 1);
        assert!(harness.library.stored("40").unwrap().genres.is_empty());
        assert_eq!(
            harness.library.stored("41").unwrap().genres,
            set(&["Crime", "Drama"])
        );
        // Both items reached the catalog, so both are paced
        assert_eq!(harness.limiter.waits(), 2);
    }

    #[tokio::test]
    async fn test_full_sync_leaves_matching_item_alone() {
        let library = movies_library(vec![FakeLibrary::item(
            "50",
            "1",
            "Heat",
            Some(1995),
            MediaKind::Movie,
            &["Drama", "Crime"],
        )]);
        let mut catalog = FakeCatalog::default();
        catalog.movies.insert(
            "Heat 1995".to_string(),
            vec![FakeCatalog::candidate(949, "Heat")],
        );
        catalog.genres.insert(949, genres(&["Crime", "Drama"]));
        let harness = Harness::new(library, catalog);

        let summary = harness.run(SyncMode::FullSync).await;

        assert_eq!(summary.skipped_up_to_date, 1);
        assert!(harness.library.mutation_calls().is_empty());
    }

    #[tokio::test]
    async fn test_mutation_failure_does_not_stop_the_run() {
        let mut library = movies_library(vec![
            FakeLibrary::item("60", "1", "Alien", Some(1979), MediaKind::Movie, &[]),
            FakeLibrary::item("61", "1", "Aliens", Some(1986), MediaKind::Movie, &[]),
        ]);
        library.failing_items = vec!["60".to_string()];
        let mut catalog = FakeCatalog::default();
        catalog.movies.insert(
            "Alien 1979".to_string(),
            vec![FakeCatalog::candidate(348, "Alien")],
        );
        catalog.movies.insert(
            "Aliens 1986".to_string(),
            vec![FakeCatalog::candidate(679, "Aliens")],
        );
        catalog.genres.insert(348, genres(&["Horror"]));
        catalog.genres.insert(679, genres(&["Action"]));
        let harness = Harness::new(library, catalog);

        let summary = harness.run(SyncMode::Update).await;

        assert_eq!(summary.mutation_failures, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(harness.library.stored("61").unwrap().genres, set(&["Action"]));
    }

    #[tokio::test]
    async fn test_unsupported_sections_are_counted_not_walked() {
        let library = FakeLibrary {
            sections: vec![
                FakeLibrary::section("1", "Movies", "movie"),
                FakeLibrary::section("9", "Music", "artist"),
            ],
            ..Default::default()
        };
        let harness = Harness::new(library, FakeCatalog::default());

        let summary = harness.run(SyncMode::Update).await;

        assert_eq!(summary.sections_processed, 1);
        assert_eq!(summary.sections_skipped, 1);
        assert_eq!(harness.library.calls(), vec!["sections", "items:1"]);
    }

    #[tokio::test]
    async fn test_section_list_failure_still_returns_summary() {
        let library = FakeLibrary {
            sections: vec![FakeLibrary::section("1", "Movies", "movie")],
            failing_sections: true,
            ..Default::default()
        };
        let harness = Harness::new(library, FakeCatalog::default());

        let summary = harness.run(SyncMode::FullSync).await;

        assert_eq!(summary.sections_failed, 1);
        assert_eq!(summary.sections_processed, 0);
        assert_eq!(summary.items_processed, 0);
        assert_eq!(harness.library.calls(), vec!["sections"]);
        assert!(harness.catalog.calls().is_empty());
    }

    #[tokio::test]
    async fn test_item_listing_failure_moves_to_next_section() {
        let library = FakeLibrary {
            sections: vec![
                FakeLibrary::section("1", "Movies", "movie"),
                FakeLibrary::section("2", "TV Shows", "show"),
            ],
            failing_listings: vec!["1".to_string()],
            ..Default::default()
        }
        .with_items(
            "2",
            vec![FakeLibrary::item(
                "70",
                "2",
                "Severance",
                Some(2022),
                MediaKind::Series,
                &[],
            )],
        );
        let mut catalog = FakeCatalog::default();
        catalog.series.insert(
            "Severance 2022".to_string(),
            vec![FakeCatalog::candidate(95396, "Severance")],
        );
        catalog.genres.insert(95396, genres(&["Drama", "Mystery"]));
        let harness = Harness::new(library, catalog);

        let summary = harness.run(SyncMode::Update).await;

        assert_eq!(summary.sections_failed, 1);
        assert_eq!(summary.sections_processed, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(
            harness.library.stored("70").unwrap().genres,
            set(&["Drama", "Mystery"])
        );
        assert_eq!(&harness.library.calls()[..3], &["sections", "items:1", "items:2"]);
    }
}
