//! Statements against one resolved `(shard, table)` pair.
//!
//! Identifiers only ever come from the static dataset schema; caller
//! values are always bound as parameters.

use sea_orm::sea_query::{
    Alias, Expr, MysqlQueryBuilder, Order, PostgresQueryBuilder, Query,
    QueryStatementWriter, SelectStatement, SqliteQueryBuilder, Values,
};
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DbErr, QueryResult, SqlErr, Statement, TransactionTrait,
};

use crate::codec::{assign_expr, decode_row, decode_value, encode_row, value_to_sea};
use crate::shard::ShardHandle;
use roomdb_shard_core::{
    ColumnSpec, LogicalDataset, PhysicalTable, ResolvedCondition, Row, ShardError, ShardId,
    ShardResult, Value,
};

pub struct ShardExecutor<'a> {
    shard: &'a ShardHandle,
    dataset: LogicalDataset,
    table: PhysicalTable,
}

impl<'a> ShardExecutor<'a> {
    pub fn new(shard: &'a ShardHandle, dataset: LogicalDataset, table: PhysicalTable) -> Self {
        Self {
            shard,
            dataset,
            table,
        }
    }

    pub fn shard_id(&self) -> ShardId {
        self.shard.id()
    }

    pub fn dataset(&self) -> LogicalDataset {
        self.dataset
    }

    pub fn table(&self) -> &PhysicalTable {
        &self.table
    }

    /// Rows matching the condition (every row when `None`), either whole or
    /// reduced to one column.
    pub async fn select_rows(
        &self,
        condition: Option<&ResolvedCondition>,
        column: Option<&'static ColumnSpec>,
    ) -> ShardResult<Vec<Row>> {
        let columns = self.selected_columns(column);
        let select = self.select_statement(condition, &columns);
        let results = query_all(self.shard.connection(), &select)
            .await
            .map_err(|err| self.map_db_err("select", err))?;
        results
            .iter()
            .map(|result| decode_row(self.dataset, result, &columns))
            .collect()
    }

    /// The projected value of the first matching row. The outer `Option`
    /// tells whether any row matched, the inner one whether it was null.
    pub async fn select_first(
        &self,
        condition: &ResolvedCondition,
        column: &'static ColumnSpec,
    ) -> ShardResult<Option<Option<Value>>> {
        let mut select = self.select_statement(Some(condition), &[column]);
        select.limit(1);
        let result = query_one(self.shard.connection(), &select)
            .await
            .map_err(|err| self.map_db_err("select", err))?;
        match result {
            Some(result) => Ok(Some(decode_value(&result, column)?)),
            None => Ok(None),
        }
    }

    pub async fn insert_row(&self, row: &Row) -> ShardResult<()> {
        let conn = self.shard.connection();
        let insert = self.insert_statement(std::slice::from_ref(row))?;
        exec(conn, &insert)
            .await
            .map_err(|err| self.map_db_err("insert", err))?;
        Ok(())
    }

    /// Sets one column on every matching row. Zero matches is not an error.
    pub async fn update_column(
        &self,
        condition: &ResolvedCondition,
        target: &'static ColumnSpec,
        value: Option<&Value>,
    ) -> ShardResult<u64> {
        let mut update = Query::update();
        update
            .table(self.table_alias())
            .value(Alias::new(target.name), assign_expr(target, value));
        for (spec, value) in condition.terms() {
            update.and_where(Expr::col(Alias::new(spec.name)).eq(value_to_sea(value)));
        }
        exec(self.shard.connection(), &update)
            .await
            .map_err(|err| self.map_db_err("update", err))
    }

    pub async fn delete_rows(&self, condition: &ResolvedCondition) -> ShardResult<u64> {
        let mut delete = Query::delete();
        delete.from_table(self.table_alias());
        for (spec, value) in condition.terms() {
            delete.and_where(Expr::col(Alias::new(spec.name)).eq(value_to_sea(value)));
        }
        exec(self.shard.connection(), &delete)
            .await
            .map_err(|err| self.map_db_err("delete", err))
    }

    /// Empties the table and loads `rows` into it, inside one transaction
    /// on this shard.
    pub async fn truncate_and_bulk_insert(&self, rows: &[Row]) -> ShardResult<u64> {
        let txn = self
            .shard
            .connection()
            .begin()
            .await
            .map_err(|err| self.map_db_err("import", err))?;
        let delete = Query::delete().from_table(self.table_alias()).to_owned();
        exec(&txn, &delete)
            .await
            .map_err(|err| self.map_db_err("truncate", err))?;
        let mut inserted = 0;
        for row in rows {
            let insert = self.insert_statement(std::slice::from_ref(row))?;
            inserted += exec(&txn, &insert)
                .await
                .map_err(|err| self.map_db_err("import", err))?;
        }
        txn.commit()
            .await
            .map_err(|err| self.map_db_err("import", err))?;
        Ok(inserted)
    }

    fn table_alias(&self) -> Alias {
        Alias::new(self.table.table.as_str())
    }

    fn selected_columns(&self, column: Option<&'static ColumnSpec>) -> Vec<&'static ColumnSpec> {
        match column {
            Some(column) => vec![column],
            None => self.dataset.schema().columns.iter().collect(),
        }
    }

    fn select_statement(
        &self,
        condition: Option<&ResolvedCondition>,
        columns: &[&'static ColumnSpec],
    ) -> SelectStatement {
        let mut select = Query::select();
        select
            .from(self.table_alias())
            .columns(columns.iter().map(|spec| Alias::new(spec.name)));
        if let Some(condition) = condition {
            for (spec, value) in condition.terms() {
                select.and_where(Expr::col(Alias::new(spec.name)).eq(value_to_sea(value)));
            }
        }
        for name in self.dataset.schema().primary_key {
            select.order_by(Alias::new(*name), Order::Asc);
        }
        select
    }

    fn insert_statement(&self, rows: &[Row]) -> ShardResult<sea_orm::sea_query::InsertStatement> {
        let schema = self.dataset.schema();
        let mut insert = Query::insert();
        insert
            .into_table(self.table_alias())
            .columns(schema.columns.iter().map(|spec| Alias::new(spec.name)));
        for row in rows {
            insert
                .values(encode_row(row))
                .map_err(|err| ShardError::codec(format!("{}: {err}", self.dataset)))?;
        }
        Ok(insert)
    }

    fn map_db_err(&self, operation: &'static str, err: DbErr) -> ShardError {
        log::warn!("{operation} on {} failed: {err}", self.table);
        let message = err.to_string();
        if is_unique_violation(&err) {
            ShardError::constraint(self.dataset.as_str(), self.shard.id(), operation, message)
        } else {
            ShardError::unavailable(self.dataset.as_str(), self.shard.id(), operation, message)
        }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    // Primary-key violations are not classified on every driver.
    let message = err.to_string();
    message.contains("UNIQUE constraint failed")
        || message.contains("duplicate key value")
        || message.contains("Duplicate entry")
}

fn build_stmt<S: QueryStatementWriter>(backend: DatabaseBackend, stmt: &S) -> (String, Values) {
    match backend {
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        DatabaseBackend::MySql => stmt.build(MysqlQueryBuilder),
    }
}

async fn exec<C, S>(conn: &C, stmt: &S) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let result = conn
        .execute(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(result.rows_affected())
}

async fn query_all<C, S>(conn: &C, stmt: &S) -> Result<Vec<QueryResult>, DbErr>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    conn.query_all(Statement::from_sql_and_values(backend, sql, values))
        .await
}

async fn query_one<C, S>(conn: &C, stmt: &S) -> Result<Option<QueryResult>, DbErr>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    conn.query_one(Statement::from_sql_and_values(backend, sql, values))
        .await
}
