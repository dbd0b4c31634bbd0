use roomdb_shard_store::{
    DatabaseConfig, DatasetApi, DatasetRouter, Key, PoolConfig, Projection, RouterConfig,
    ShardConfig, ShardResult, UserRecord,
};
use tempfile::tempdir;

#[tokio::test]
async fn pool_settings_apply_to_every_shard() -> ShardResult<()> {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    let mut config = RouterConfig::sqlite_pair("pooled_a.sqlite", "pooled_b.sqlite");
    config.pool = Some(PoolConfig {
        max_connections: Some(4),
        min_connections: Some(1),
        connect_timeout_ms: Some(5_000),
        acquire_timeout_ms: Some(5_000),
        idle_timeout_ms: Some(60_000),
    });
    let router = DatasetRouter::connect(&config, base).await?;
    router
        .insert_record(
            UserRecord {
                id: "u5".to_string(),
                ..UserRecord::default()
            }
            .into(),
        )
        .await?;
    let read = router
        .read_by_key("user", &Key::single("u5"), &Projection::All)
        .await?;
    assert_eq!(read.rows().len(), 1);
    assert!(base.join("pooled_a.sqlite").exists());
    assert!(base.join("pooled_b.sqlite").exists());
    Ok(())
}

#[tokio::test]
async fn three_shards_spread_by_modulo_three() -> ShardResult<()> {
    let dir = tempdir().expect("tempdir");
    let mut config = RouterConfig::sqlite_pair("s0.sqlite", "s1.sqlite");
    config.shards.push(ShardConfig {
        name: "s2".to_string(),
        database: DatabaseConfig::Sqlite { path: None },
    });
    let router = DatasetRouter::connect(&config, dir.path()).await?;
    assert_eq!(router.locator().shard_count(), 3);
    assert!(dir.path().join("s2.sqlite").exists());

    for id in ["a", "b", "c"] {
        router
            .insert_record(
                UserRecord {
                    id: id.to_string(),
                    ..UserRecord::default()
                }
                .into(),
            )
            .await?;
    }
    // 'a' = 97 -> 1, 'b' = 98 -> 2, 'c' = 99 -> 0
    let all = router
        .read_by_key("user", &Key::Wildcard, &Projection::column("id"))
        .await?;
    let ids = all
        .rows()
        .iter()
        .filter_map(|row| row.get("id").map(ToString::to_string))
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["c", "a", "b"]);
    Ok(())
}
