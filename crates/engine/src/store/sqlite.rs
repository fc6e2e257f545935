//! SQLite store built on sea-orm.
//!
//! One row per group holding the JSON-encoded group and the schema version it
//! was written with. The table is created by the `migration` crate.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseConnection, QueryFilter, QuerySelect, TransactionTrait, prelude::*,
    sea_query::OnConflict,
};

use super::{Groups, Store, StoreError, StoreResult, schema};
use crate::Clock;

#[derive(Clone, Debug)]
pub struct SqliteStore {
    database: DatabaseConnection,
}

impl SqliteStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn load(&self, clock: &dyn Clock) -> StoreResult<Groups> {
        let rows = ledger_groups::Entity::find().all(&self.database).await?;
        rows.into_iter()
            .map(|row| {
                let version = u32::try_from(row.schema_version).map_err(|_| {
                    StoreError::Malformed(format!("negative schema version for {}", row.id))
                })?;
                let value = serde_json::from_str(&row.state)?;
                let group = schema::upgrade_group(version, &row.id, value, clock)?;
                Ok((row.id, group))
            })
            .collect()
    }

    async fn save(&self, groups: &Groups) -> StoreResult<()> {
        let now = Utc::now();
        let rows = groups
            .iter()
            .map(|(id, group)| {
                Ok(ledger_groups::ActiveModel {
                    id: ActiveValue::Set(id.clone()),
                    schema_version: ActiveValue::Set(schema::CURRENT_VERSION as i32),
                    state: ActiveValue::Set(schema::encode_group(group)?),
                    updated_at: ActiveValue::Set(now),
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let db_tx = self.database.begin().await?;
        for row in rows {
            ledger_groups::Entity::insert(row)
                .on_conflict(
                    OnConflict::column(ledger_groups::Column::Id)
                        .update_columns([
                            ledger_groups::Column::SchemaVersion,
                            ledger_groups::Column::State,
                            ledger_groups::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&db_tx)
                .await?;
        }

        let stale: Vec<String> = ledger_groups::Entity::find()
            .select_only()
            .column(ledger_groups::Column::Id)
            .into_tuple::<String>()
            .all(&db_tx)
            .await?
            .into_iter()
            .filter(|id| !groups.contains_key(id))
            .collect();
        if !stale.is_empty() {
            ledger_groups::Entity::delete_many()
                .filter(ledger_groups::Column::Id.is_in(stale))
                .exec(&db_tx)
                .await?;
        }

        db_tx.commit().await?;
        Ok(())
    }
}

mod ledger_groups {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "ledger_groups")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub schema_version: i32,
        #[sea_orm(column_type = "Text")]
        pub state: String,
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
