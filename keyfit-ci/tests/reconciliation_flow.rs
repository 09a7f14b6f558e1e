// End-to-end reconciliation tests: fixture adapter -> engine -> store.
//
// Uses an in-memory SQLite pool and a vec-backed adapter so nothing here
// touches the network or the filesystem.

use futures::stream;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use keyfit_ci::config::CiConfig;
use keyfit_ci::sources::{RecordStream, SourceAdapter};
use keyfit_ci::types::RawScrapedRecord;
use keyfit_ci::validator::IssueKind;
use keyfit_ci::workflow::{run_source_sync, validate_store, SyncOptions};
use keyfit_common::db::records::{self, CanonicalRecord};
use keyfit_common::types::ChipField;

/// Vec-backed adapter standing in for an external catalog.
struct FixtureAdapter {
    name: &'static str,
    records: Vec<RawScrapedRecord>,
    /// Item errors injected ahead of the records, as a failing page would
    errors: u32,
}

impl FixtureAdapter {
    fn new(name: &'static str, records: Vec<RawScrapedRecord>) -> Self {
        Self {
            name,
            records,
            errors: 0,
        }
    }
}

impl SourceAdapter for FixtureAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn stream(&self) -> RecordStream<'_> {
        let errors = (0..self.errors).map(|i| {
            Err(keyfit_ci::CiError::Adapter(format!(
                "fixture page {i} failed"
            )))
        });
        let records = self.records.clone().into_iter().map(Ok);
        Box::pin(stream::iter(errors.chain(records).collect::<Vec<_>>()))
    }
}

fn raw(
    source: &str,
    make: &str,
    model: &str,
    years: &str,
    chip: &str,
    transponder_type: Option<&str>,
) -> RawScrapedRecord {
    RawScrapedRecord {
        make: make.to_string(),
        model: model.to_string(),
        years: years.to_string(),
        chip: ChipField::Flat(chip.to_string()),
        transponder_type: transponder_type.map(str::to_string),
        frequency: None,
        parts: None,
        notes: None,
        source: source.to_string(),
    }
}

async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    keyfit_common::db::create_tables(&pool).await.unwrap();
    pool
}

#[tokio::test]
async fn first_run_creates_second_run_is_a_noop() {
    let pool = setup_pool().await;
    let config = CiConfig::default();
    let adapter = FixtureAdapter::new(
        "transpondery",
        vec![raw("transpondery", "toyota", "Camry", "2018-2022", "H", None)],
    );

    let first = run_source_sync(&pool, &adapter, &config, &SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(first.scraped, 1);
    assert_eq!(first.created, 1);

    let stored = records::find_by_key(&pool, "TOYOTA", "CAMRY", 2018)
        .await
        .unwrap()
        .expect("record should have been created");
    assert_eq!(stored.model, "CAMRY");
    assert_eq!(stored.chip_types, vec!["H"]);
    assert_eq!(stored.year_end, Some(2022));

    // Idempotence: the same batch against the now-updated store is a no-op
    let second = run_source_sync(&pool, &adapter, &config, &SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.unchanged, 1);
    assert_eq!(records::list_all(&pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn chip_types_union_across_sources() {
    let pool = setup_pool().await;
    let config = CiConfig::default();

    let seed = CanonicalRecord {
        year_end: Some(2021),
        chip_types: vec!["G".to_string()],
        ..CanonicalRecord::new("HONDA", "CIVIC", 2016)
    };
    records::save_record(&pool, &seed).await.unwrap();

    let adapter = FixtureAdapter::new(
        "uhs",
        vec![raw("uhs", "Honda", "Civic", "2016-2021", "G,H", None)],
    );
    let stats = run_source_sync(&pool, &adapter, &config, &SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(stats.updated, 1);

    let stored = records::find_by_key(&pool, "HONDA", "CIVIC", 2016)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.guid, seed.guid);
    assert_eq!(stored.chip_types, vec!["G", "H"]);
}

#[tokio::test]
async fn higher_priority_source_wins_regardless_of_run_order() {
    let config = CiConfig::default();

    let transpondery = FixtureAdapter::new(
        "transpondery",
        vec![raw(
            "transpondery",
            "Honda",
            "Civic",
            "2016-2021",
            "G",
            Some("Philips 46"),
        )],
    );
    let uhs = FixtureAdapter::new(
        "uhs",
        vec![raw(
            "uhs",
            "Honda",
            "Civic",
            "2016-2021",
            "G",
            Some("Honda Hitag"),
        )],
    );

    for adapters in [
        [&transpondery as &dyn SourceAdapter, &uhs],
        [&uhs as &dyn SourceAdapter, &transpondery],
    ] {
        let pool = setup_pool().await;
        for adapter in adapters {
            run_source_sync(&pool, adapter, &config, &SyncOptions::default())
                .await
                .unwrap();
        }
        let stored = records::find_by_key(&pool, "HONDA", "CIVIC", 2016)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.transponder_type, "Philips 46",
            "transpondery outranks uhs in either run order"
        );
        assert_eq!(stored.source, Some("transpondery".to_string()));
    }
}

#[tokio::test]
async fn dry_run_leaves_the_store_untouched() {
    let pool = setup_pool().await;
    let config = CiConfig::default();
    let adapter = FixtureAdapter::new(
        "transpondery",
        vec![raw("transpondery", "toyota", "Camry", "2018-2022", "H", None)],
    );

    let options = SyncOptions {
        dry_run: true,
        ..SyncOptions::default()
    };
    let stats = run_source_sync(&pool, &adapter, &config, &options)
        .await
        .unwrap();
    assert_eq!(stats.created, 1, "classification still happens");
    assert!(records::list_all(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn adapter_errors_are_counted_not_fatal() {
    let pool = setup_pool().await;
    let config = CiConfig::default();
    let mut adapter = FixtureAdapter::new(
        "uhs",
        vec![
            raw("uhs", "", "", "2018", "H", None), // unreconcilable record
            raw("uhs", "Kia", "Soul", "2014-2019", "ID46", None),
        ],
    );
    adapter.errors = 2;

    let stats = run_source_sync(&pool, &adapter, &config, &SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(stats.errors, 3, "2 page errors + 1 unreconcilable record");
    assert_eq!(stats.created, 1, "the good record still lands");
    assert!(records::find_by_key(&pool, "KIA", "SOUL", 2014)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn ambiguous_records_are_reported_and_never_applied() {
    let pool = setup_pool().await;
    let config = CiConfig::default();

    for year_start in [2006, 2012] {
        let record = CanonicalRecord {
            chip_types: vec!["4D67".to_string()],
            ..CanonicalRecord::new("TOYOTA", "CAMRY", year_start)
        };
        records::save_record(&pool, &record).await.unwrap();
    }

    // Both canonical generations are open-ended, so 2012-2013 ties them
    let adapter = FixtureAdapter::new(
        "uhs",
        vec![raw("uhs", "Toyota", "Camry", "2012-2013", "H", None)],
    );
    let stats = run_source_sync(&pool, &adapter, &config, &SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.ambiguous, 1);
    assert_eq!(stats.ambiguous_records.len(), 1);
    assert_eq!(stats.ambiguous_records[0].candidates.len(), 2);

    // Neither canonical record gained the scraped chip
    for record in records::list_all(&pool).await.unwrap() {
        assert_eq!(record.chip_types, vec!["4D67"]);
    }
}

#[tokio::test]
async fn validate_reports_seeded_defects() {
    let pool = setup_pool().await;

    records::save_record(
        &pool,
        &CanonicalRecord {
            chip_types: vec!["G".to_string()],
            ..CanonicalRecord::new("HONDA", "CIVIC", 2016)
        },
    )
    .await
    .unwrap();

    // Seed defective rows directly, as legacy data would look
    sqlx::query(
        r#"
        INSERT INTO transponder_records (guid, make, model, year_start, chip_types, compatible_parts)
        VALUES
            ('11111111-1111-1111-1111-111111111111', '', 'UNKNOWN', 2000, '[]', '[]'),
            ('22222222-2222-2222-2222-222222222222', 'FORD', 'F-150', 2015, '["ID63", broken', '[]')
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let issues = validate_store(&pool).await.unwrap();
    let kinds: Vec<&IssueKind> = issues.iter().map(|i| &i.kind).collect();
    assert!(kinds.contains(&&IssueKind::EmptyMake));
    assert!(kinds.contains(&&IssueKind::EmptyChipTypes));
    assert!(kinds.contains(&&IssueKind::MalformedChipTypes));
}
