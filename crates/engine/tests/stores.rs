use std::{collections::BTreeMap, sync::Arc};

use chrono::{TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{Amount, Engine, EngineError, JsonFileStore, ManualClock, Period, SqliteStore, Store};
use migration::MigratorTrait;

const GROUP: &str = "-1001";

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 5, 12, 18, 0, 0).unwrap(),
    ))
}

async fn sqlite_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

async fn populate(engine: &mut Engine) {
    engine
        .register_member(GROUP, "u1", "Alice", Some("alice"))
        .await
        .unwrap();
    engine
        .record_expense(GROUP, Amount::new(250.0), "rice", "Alice", "u1")
        .await
        .unwrap();
    engine
        .submit_meal_counts(
            GROUP,
            BTreeMap::from([("u1".to_string(), 5), ("u2".to_string(), 5)]),
            "Alice",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn json_store_starts_empty_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("state.json"));
    assert!(store.load(clock().as_ref()).await.unwrap().is_empty());
}

#[tokio::test]
async fn json_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");

    let mut engine = Engine::builder()
        .store(JsonFileStore::new(&path))
        .clock(clock())
        .build()
        .await
        .unwrap();
    populate(&mut engine).await;
    let expected = engine.group_snapshot(GROUP);
    drop(engine);

    let engine = Engine::builder()
        .store(JsonFileStore::new(&path))
        .clock(clock())
        .build()
        .await
        .unwrap();
    assert_eq!(engine.group_snapshot(GROUP), expected);
    assert!(engine.meal_data_submitted(GROUP));
    assert!(!path.with_file_name("state.json.tmp").exists());
}

#[tokio::test]
async fn json_store_upgrades_legacy_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mess_fund_groups.json");
    std::fs::write(
        &path,
        r#"{
          "-1001": {
            "group_name": "",
            "members": {"u1": {"name": "Alice", "username": "", "joined_date": "2025-05-01"}},
            "expenses": [{"amount": 300, "description": "gas", "added_by": "Alice",
                          "added_by_id": "u1", "date": "2025-05-02 10:00:00", "month": "2025-05"}],
            "current_month": "2025-05",
            "carry_forward": 0
          }
        }"#,
    )
    .unwrap();

    let mut engine = Engine::builder()
        .store(JsonFileStore::new(&path))
        .clock(clock())
        .build()
        .await
        .unwrap();
    assert_eq!(engine.current_period_expenses(GROUP).len(), 1);
    assert!(!engine.meal_data_submitted(GROUP));
    assert!(engine.member(GROUP, "u1").unwrap().handle.is_none());

    // The next write moves the file to the versioned layout.
    engine
        .record_expense(GROUP, Amount::new(10.0), "salt", "Alice", "u1")
        .await
        .unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"schema_version\": 1"));
}

#[tokio::test]
async fn legacy_file_written_after_month_reset_opens_calendar_month() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mess_fund_groups.json");
    std::fs::write(
        &path,
        r#"{
          "-1001": {
            "members": {"u1": {"name": "Alice", "username": "alice"}},
            "expenses": [],
            "meal_counts": {"2025-07": {"data": {"u1": 10}, "submitted_by": "Alice",
                                        "submitted_date": "2025-07-28 20:00:00"}},
            "current_month": "2025-07",
            "carry_forward": 5,
            "meal_data_submitted": false
          }
        }"#,
    )
    .unwrap();

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 8, 5, 12, 0, 0).unwrap(),
    ));
    let mut engine = Engine::builder()
        .store(JsonFileStore::new(&path))
        .clock(clock)
        .build()
        .await
        .unwrap();
    assert_eq!(engine.current_period(GROUP), Period::new(2025, 8).unwrap());
    assert!(!engine.meal_data_submitted(GROUP));
    assert!(engine.current_period_meals(GROUP).is_empty());

    let expense = engine
        .record_expense(GROUP, Amount::new(100.0), "rice", "Alice", "u1")
        .await
        .unwrap();
    assert_eq!(expense.period, Period::new(2025, 8).unwrap());
    assert_eq!(
        engine.compute_settlement(GROUP),
        Err(EngineError::InsufficientData)
    );
}

#[tokio::test]
async fn sqlite_store_survives_restart() {
    let db = sqlite_db().await;

    let mut engine = Engine::builder()
        .store(SqliteStore::new(db.clone()))
        .clock(clock())
        .build()
        .await
        .unwrap();
    populate(&mut engine).await;
    engine
        .register_member("-2002", "u9", "Zed", None)
        .await
        .unwrap();
    let expected = engine.group_snapshot(GROUP);
    drop(engine);

    let engine = Engine::builder()
        .store(SqliteStore::new(db))
        .clock(clock())
        .build()
        .await
        .unwrap();
    assert_eq!(engine.list_groups(), vec!["-1001".to_string(), "-2002".to_string()]);
    assert_eq!(engine.group_snapshot(GROUP), expected);
}

#[tokio::test]
async fn sqlite_store_drops_rows_of_removed_groups() {
    let db = sqlite_db().await;
    let store = SqliteStore::new(db.clone());

    let mut engine = Engine::builder()
        .store(store.clone())
        .clock(clock())
        .build()
        .await
        .unwrap();
    populate(&mut engine).await;
    assert_eq!(store.load(clock().as_ref()).await.unwrap().len(), 1);

    store.save(&Default::default()).await.unwrap();
    assert!(store.load(clock().as_ref()).await.unwrap().is_empty());
}
