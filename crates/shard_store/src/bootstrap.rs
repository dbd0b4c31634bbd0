//! Creates every physical table a shard owns. Safe to re-run.

use sea_orm_migration::prelude::*;

use crate::shard::ShardHandle;
use roomdb_shard_core::{
    ColumnSpec, LogicalDataset, PhysicalTable, ShardError, ShardLocator, ShardResult, ValueType,
};

pub async fn bootstrap_tables(shard: &ShardHandle, locator: &ShardLocator) -> ShardResult<()> {
    let manager = SchemaManager::new(shard.connection());
    for (dataset, table) in locator.tables_on(shard.id()) {
        manager
            .create_table(table_statement(dataset, &table))
            .await
            .map_err(|err| {
                ShardError::unavailable(dataset.as_str(), shard.id(), "bootstrap", err.to_string())
            })?;
        log::debug!("ensured table {table}");
    }
    Ok(())
}

fn table_statement(dataset: LogicalDataset, table: &PhysicalTable) -> TableCreateStatement {
    let schema = dataset.schema();
    let mut create = Table::create();
    create.table(Alias::new(table.table.as_str())).if_not_exists();
    for spec in schema.columns {
        create.col(column_def(spec, schema.is_primary_key(spec.name)));
    }
    let mut primary = Index::create();
    primary.name(format!("pk_{}", table.table));
    for name in schema.primary_key {
        primary.col(Alias::new(*name));
    }
    create.primary_key(&mut primary);
    create.to_owned()
}

fn column_def(spec: &ColumnSpec, key: bool) -> ColumnDef {
    let mut def = ColumnDef::new(Alias::new(spec.name));
    match (spec.value_type, spec.max_len) {
        (ValueType::Str, Some(len)) => def.string_len(len),
        (ValueType::Str, None) => def.text(),
        (ValueType::Int, _) => def.big_integer(),
        (ValueType::Timestamp, _) => def.timestamp(),
    };
    if key {
        def.not_null();
    }
    def
}

#[cfg(test)]
mod tests {
    use sea_orm_migration::sea_query::{SchemaStatementBuilder, SqliteQueryBuilder};

    use super::table_statement;
    use roomdb_shard_core::{LogicalDataset, ShardId, ShardLocator};

    #[test]
    fn permission_table_has_composite_primary_key() {
        let locator = ShardLocator::new(2).unwrap();
        let table = locator
            .physical_table(LogicalDataset::Permission, ShardId(1))
            .unwrap();
        let sql = table_statement(LogicalDataset::Permission, &table).to_string(SqliteQueryBuilder);
        assert!(sql.contains("IF NOT EXISTS \"permission_1\""));
        assert!(sql.contains("\"pk_permission_1\""));
        assert!(sql.contains("\"room_id\", \"user_id\""));
    }

    #[test]
    fn unsharded_table_keeps_dataset_name() {
        let locator = ShardLocator::new(2)
            .unwrap()
            .with_unsharded(LogicalDataset::User);
        let table = locator.physical_table(LogicalDataset::User, ShardId(0)).unwrap();
        let sql = table_statement(LogicalDataset::User, &table).to_string(SqliteQueryBuilder);
        assert!(sql.contains("\"user\""));
        assert!(sql.contains("\"password\""));
        assert!(!sql.contains("user_0"));
    }
}
