//! Tests for the process-wide handle. The global is shared by every test in
//! this binary, so the whole lifecycle runs in one test.

use relmap::{Config, MigrationState, Migration, OrmError, SqlMigration, global};
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
struct Note {
    id: i64,
    body: String,
}

relmap::model!(Note => "notes" {
    id: "id,primary,auto_increment",
    body: "body,not_null",
});

fn migrations() -> Vec<Arc<dyn Migration>> {
    vec![
        Arc::new(SqlMigration::new(
            "001_labels",
            ["CREATE TABLE labels (name TEXT PRIMARY KEY)"],
            ["DROP TABLE labels"],
        )),
        Arc::new(SqlMigration::new(
            "002_label_seed",
            ["INSERT INTO labels (name) VALUES ('inbox')"],
            ["DELETE FROM labels WHERE name = 'inbox'"],
        )),
    ]
}

#[tokio::test]
async fn test_global_lifecycle() {
    let err = global::database().unwrap_err();
    assert!(matches!(err, OrmError::Connection { .. }));
    assert!(global::table("notes").is_err());

    global::init(Config::sqlite_memory()).await.unwrap();
    // second init is a no-op, even with a bad configuration
    global::init(Config::default()).await.unwrap();

    let report = global::auto_migrate()
        .unwrap()
        .model::<Note>()
        .run()
        .await
        .unwrap();
    assert_eq!(report.created, vec!["notes".to_string()]);
    assert!(global::has_table::<Note>().await.unwrap());

    global::model::<Note>()
        .unwrap()
        .insert(&Note {
            body: "hello".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let committed = global::with_transaction(|tx| {
        Box::pin(async move {
            tx.table("notes").where_("body = ?", ["hello"]).count().await
        })
    })
    .await
    .unwrap();
    assert_eq!(committed, 1);

    let applied = global::migrate(migrations()).await.unwrap();
    assert_eq!(applied, vec!["001_labels", "002_label_seed"]);
    // re-registering the same versions is not a duplicate
    assert!(global::migrate(migrations()).await.unwrap().is_empty());

    let rolled_back = global::rollback_migration(1).await.unwrap();
    assert_eq!(rolled_back, vec!["002_label_seed"]);

    let status = global::migration_status().await.unwrap();
    assert!(matches!(status[0].state, MigrationState::Applied { .. }));
    assert_eq!(status[1].state, MigrationState::Pending);

    global::drop_table::<Note>().await.unwrap();
    assert!(!global::has_table::<Note>().await.unwrap());

    global::create_table::<Note>().await.unwrap();
    assert_eq!(global::table("notes").unwrap().count().await.unwrap(), 0);
}
