// Integration tests for CatalogService: readiness, snapshot swapping,
// failure isolation, single-flight rebuilds and cancellation.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use catalux_core::{CoreError, CoreResult, Product};
use catalux_query::{PageRequest, QueryContext, SortMode};
use catalux_service::{
    CatalogService, CatalogSource, JsonlCatalogSource, MemoryCatalogSource, TomlConfigSource,
};
use tempfile::NamedTempFile;
use tokio::sync::Notify;

const RULES: &str = r#"
[[taxonomy]]
code = "LUM"
name = "Luminaires"

[[taxonomy]]
code = "LUM-CEIL"
parent = "LUM"
level = 1
name = "Ceiling"

[[rules]]
name = "ceiling"
target = "LUM-CEIL"
priority = 30
conditions = [
    { kind = "class_membership", classes = ["X"] },
    { kind = "attribute_bool", attribute = "ceiling_mount", equals = true },
]

[[rules]]
name = "broken"
target = "LUM-CEIL"
priority = 40
conditions = [{ kind = "text_pattern", pattern = "(unclosed" }]

[[filters]]
key = "ip"
label = "IP rating"
kind = "categorical"
source_attribute = "IP_RATING"
"#;

const CATALOG: &str = r#"{"id": "P1", "name": "Panel", "class_code": "X", "attributes": {"ceiling_mount": true}}
{"id": "P2", "name": "Outdoor spot", "attributes": {"IP_RATING": "IP65"}}
"#;

fn write_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn rules_source(file: &NamedTempFile) -> Arc<TomlConfigSource> {
    Arc::new(TomlConfigSource::new(file.path()))
}

/// Catalog source that blocks until released.
struct GatedCatalog {
    gate: Arc<Notify>,
    products: Vec<Product>,
}

#[async_trait]
impl CatalogSource for GatedCatalog {
    async fn load_products(&self) -> CoreResult<Vec<Product>> {
        self.gate.notified().await;
        Ok(self.products.clone())
    }
}

async fn wait_until_rebuilding(service: &CatalogService) {
    for _ in 0..200 {
        if service.is_rebuilding() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("rebuild never started");
}

#[tokio::test]
async fn queries_before_first_rebuild_are_unavailable() {
    let rules = write_file(RULES);
    let service = CatalogService::new(
        Arc::new(MemoryCatalogSource::default()),
        rules_source(&rules),
    );

    assert!(!service.is_ready());
    assert_eq!(service.generation(), 0);
    assert!(matches!(
        service.count(&QueryContext::new()),
        Err(CoreError::IndexUnavailable)
    ));
    assert!(matches!(
        service.search(&QueryContext::new(), SortMode::Relevance, PageRequest::all()),
        Err(CoreError::IndexUnavailable)
    ));
    assert!(matches!(service.statistics(), Err(CoreError::IndexUnavailable)));
}

#[tokio::test]
async fn rebuild_publishes_snapshot_from_files() {
    let rules = write_file(RULES);
    let catalog = write_file(CATALOG);
    let service = CatalogService::new(
        Arc::new(JsonlCatalogSource::new(catalog.path())),
        rules_source(&rules),
    )
    .with_threads(Some(2));

    let report = service.rebuild().await.unwrap();
    assert_eq!(report.generation, 1);
    assert_eq!(report.products_indexed, 2);
    assert_eq!(report.skipped_rules.len(), 1);
    assert_eq!(report.skipped_rules[0].rule, "broken");
    assert_eq!(report.unclassified.len(), 1);

    assert!(service.is_ready());
    let context = QueryContext::new().with_taxonomy("LUM");
    assert_eq!(service.count(&context).unwrap(), 1);

    let detail = service.product("P1").unwrap();
    assert!(detail.assignment.codes.contains("LUM-CEIL"));
    assert!(matches!(service.product("P9"), Err(CoreError::NotFound { .. })));
}

#[tokio::test]
async fn failed_rebuild_keeps_serving_previous_snapshot() {
    let rules = write_file(RULES);
    let catalog = write_file(CATALOG);
    let service = CatalogService::new(
        Arc::new(JsonlCatalogSource::new(catalog.path())),
        rules_source(&rules),
    );
    service.rebuild().await.unwrap();

    // Unknown parent.
    std::fs::write(
        rules.path(),
        "[[taxonomy]]\ncode = \"A\"\nparent = \"MISSING\"\nlevel = 1\nname = \"A\"\n",
    )
    .unwrap();

    let err = service.rebuild().await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));
    assert_eq!(service.generation(), 1);
    assert_eq!(service.count(&QueryContext::new()).unwrap(), 2);
    assert!(!service.is_rebuilding());
}

#[tokio::test]
async fn readers_keep_their_snapshot_across_swaps() {
    let rules = write_file(RULES);
    let mut catalog = write_file(CATALOG);
    let service = CatalogService::new(
        Arc::new(JsonlCatalogSource::new(catalog.path())),
        rules_source(&rules),
    );
    service.rebuild().await.unwrap();
    let held = service.executor().unwrap();

    writeln!(catalog, r#"{{"id": "P3", "name": "Wall light"}}"#).unwrap();
    let report = service.rebuild().await.unwrap();
    assert_eq!(report.generation, 2);

    assert_eq!(held.count(&QueryContext::new()), 2);
    assert_eq!(held.snapshot().generation(), 1);
    assert_eq!(service.count(&QueryContext::new()).unwrap(), 3);
}

#[tokio::test]
async fn concurrent_rebuild_is_rejected() {
    let rules = write_file(RULES);
    let gate = Arc::new(Notify::new());
    let service = Arc::new(CatalogService::new(
        Arc::new(GatedCatalog {
            gate: gate.clone(),
            products: vec![Product::new("P1", "Panel")],
        }),
        rules_source(&rules),
    ));

    let first = tokio::spawn({
        let service = service.clone();
        async move { service.rebuild().await }
    });
    wait_until_rebuilding(&service).await;

    assert!(matches!(
        service.rebuild().await,
        Err(CoreError::RebuildInProgress)
    ));

    gate.notify_one();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.products_indexed, 1);
    assert!(!service.is_rebuilding());
    assert!(service.is_ready());
}

#[tokio::test]
async fn cancelled_rebuild_publishes_nothing() {
    let rules = write_file(RULES);
    let gate = Arc::new(Notify::new());
    let service = Arc::new(CatalogService::new(
        Arc::new(GatedCatalog {
            gate: gate.clone(),
            products: vec![Product::new("P1", "Panel")],
        }),
        rules_source(&rules),
    ));

    assert!(!service.cancel_rebuild());

    let task = tokio::spawn({
        let service = service.clone();
        async move { service.rebuild().await }
    });
    wait_until_rebuilding(&service).await;

    assert!(service.cancel_rebuild());
    gate.notify_one();

    assert!(matches!(task.await.unwrap(), Err(CoreError::Cancelled)));
    assert!(!service.is_ready());
    assert!(!service.is_rebuilding());
}

#[tokio::test]
async fn dropped_rebuild_caller_does_not_lose_the_rebuild() {
    let rules = write_file(RULES);
    let gate = Arc::new(Notify::new());
    let service = CatalogService::new(
        Arc::new(GatedCatalog {
            gate: gate.clone(),
            products: vec![Product::new("P1", "Panel"), Product::new("P2", "Spot")],
        }),
        rules_source(&rules),
    );

    // The caller gives up, as an HTTP timeout or a disconnect would.
    let abandoned = tokio::time::timeout(Duration::from_millis(20), service.rebuild()).await;
    assert!(abandoned.is_err());

    // The rebuild still holds the single-flight slot.
    assert!(service.is_rebuilding());
    assert!(matches!(
        service.rebuild().await,
        Err(CoreError::RebuildInProgress)
    ));

    gate.notify_one();
    for _ in 0..200 {
        if service.is_ready() && !service.is_rebuilding() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(service.is_ready());
    assert!(!service.is_rebuilding());
    assert_eq!(service.generation(), 1);
    assert_eq!(service.count(&QueryContext::new()).unwrap(), 2);
}
