use roomdb_shard_store::{
    DatasetApi, DatasetRouter, DocumentRecord, Key, LogicalDataset, Projection, RouterConfig, Row,
    ShardResult, Value,
};
use serde_json::json;
use tempfile::tempdir;
use time::macros::datetime;

async fn open_pair(base: &std::path::Path) -> ShardResult<DatasetRouter> {
    let config = RouterConfig::sqlite_pair("og1.sqlite", "og2.sqlite");
    DatasetRouter::connect(&config, base).await
}

fn sorted(mut rows: Vec<Row>) -> Vec<Row> {
    rows.sort_by_key(|row| row.get("room_id").map(Value::to_string));
    rows
}

#[tokio::test]
async fn export_then_import_reproduces_the_dataset() -> ShardResult<()> {
    let source_dir = tempdir().expect("tempdir");
    let source = open_pair(source_dir.path()).await?;
    for (index, room_id) in ["r1", "r2", "r3", "r4"].into_iter().enumerate() {
        source
            .insert_record(
                DocumentRecord {
                    room_id: room_id.to_string(),
                    room_name: Some(format!("Room {index}")),
                    create_time: Some(datetime!(2024-01-15 08:00:00)),
                    overall_permission: Some(index as i64),
                    owner_user_id: None,
                }
                .into(),
            )
            .await?;
    }
    let exported = source.export("user_room_table").await?;
    assert_eq!(exported.len(), 4);
    let payload = exported.iter().map(Row::to_json).collect::<Vec<_>>();

    let target_dir = tempdir().expect("tempdir");
    let target = open_pair(target_dir.path()).await?;
    let report = target.import("document", payload).await?;
    assert_eq!(report.inserted, 4);
    assert_eq!(report.skipped, 0);

    assert_eq!(sorted(target.export("document").await?), sorted(exported));
    Ok(())
}

#[tokio::test]
async fn import_replaces_existing_rows_and_skips_bad_records() -> ShardResult<()> {
    let dir = tempdir().expect("tempdir");
    let router = open_pair(dir.path()).await?;
    router
        .insert(
            "content",
            Row::new(LogicalDataset::Content)
                .with("room_id", "stale")?
                .with("content", "old")?,
        )
        .await?;

    let report = router
        .import(
            "content",
            vec![
                json!({"room_id": "r1", "content": "# one"}),
                json!({"room_id": "r2", "content": null}),
                json!(42),
                json!({"content": "no key"}),
                json!({"room_id": "r3", "colour": "blue"}),
                json!({"room_id": ["r4"]}),
            ],
        )
        .await?;
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 4);

    let stale = router
        .read_by_key("content", &Key::single("stale"), &Projection::All)
        .await?;
    assert!(stale.is_empty());

    let rows = sorted(router.export("content").await?);
    assert_eq!(
        rows.iter().map(Row::to_json).collect::<Vec<_>>(),
        vec![
            json!({"room_id": "r1", "content": "# one"}),
            json!({"room_id": "r2"}),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn permission_import_needs_both_key_columns() -> ShardResult<()> {
    let dir = tempdir().expect("tempdir");
    let router = open_pair(dir.path()).await?;
    let report = router
        .import(
            "room_permission_table",
            vec![
                json!({"room_id": "r1", "user_id": "alice", "permission": 2}),
                json!({"room_id": "r1", "permission": 1}),
                json!({"room_id": "r2", "user_id": "bob", "permission": "3"}),
                json!({"room_id": "r2", "user_id": "carol", "permission": "admin"}),
            ],
        )
        .await?;
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 2);

    let bob = router
        .read_by_key(
            "permission",
            &Key::composite(["r2", "bob"]),
            &Projection::column("permission"),
        )
        .await?;
    assert_eq!(bob.value(), Some(&Value::Int(3)));
    Ok(())
}

#[tokio::test]
async fn import_skips_records_keyed_by_the_wildcard() -> ShardResult<()> {
    let dir = tempdir().expect("tempdir");
    let router = open_pair(dir.path()).await?;
    let report = router
        .import(
            "permission",
            vec![
                json!({"room_id": "*", "user_id": "alice", "permission": 1}),
                json!({"room_id": "r1", "user_id": "*", "permission": 1}),
                json!({"room_id": "r1", "user_id": "alice", "permission": 2}),
            ],
        )
        .await?;
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 2);

    let alice = router
        .read_by_key(
            "permission",
            &Key::composite(["r1", "alice"]),
            &Projection::column("permission"),
        )
        .await?;
    assert_eq!(alice.value(), Some(&Value::Int(2)));
    assert_eq!(router.export("permission").await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn importing_nothing_empties_every_shard() -> ShardResult<()> {
    let dir = tempdir().expect("tempdir");
    let router = open_pair(dir.path()).await?;
    for id in ["u5", "u6"] {
        router
            .insert("user", Row::new(LogicalDataset::User).with("id", id)?)
            .await?;
    }
    let report = router.import_rows("user", Vec::new()).await?;
    assert_eq!(report.inserted, 0);
    assert!(router.export("user").await?.is_empty());
    Ok(())
}
