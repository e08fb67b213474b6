use std::collections::HashMap;

use async_trait::async_trait;
use daq_core::{DaqError, Machine, Tag};
use sqlx::PgPool;
use tracing::warn;

/// Read-only access to Machines and Tags. Implementation contract: two
/// queries (machines, then tags for those ids) joined in memory, never a
/// single join query, so the machine and tag shapes stay independently
/// cacheable and the NodeId lookup can use its own index-backed query.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    async fn list_active_machines(&self) -> Result<Vec<Machine>, DaqError>;
    async fn get_machine(&self, id: i32) -> Result<Option<Machine>, DaqError>;
    async fn get_tag_by_node_id(&self, node_id: &str) -> Result<Option<Tag>, DaqError>;
    async fn list_active_tags_by_machine(&self, id: i32) -> Result<Vec<Tag>, DaqError>;

    /// Signals consumers (the [`crate::TagCache`]) that the next read should
    /// observe fresh data. The repository itself has no state to reset —
    /// every read already goes straight to the store — so this exists purely
    /// as the seam the cache's `invalidate()` is wired to.
    async fn reload(&self) -> Result<(), DaqError> {
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct MachineRow {
    id: i32,
    name: String,
    opc_endpoint: String,
    automate_type: String,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct TagRow {
    id: i32,
    machine_id: i32,
    name: String,
    node_id: String,
    data_type: String,
    unit: Option<String>,
    min_value: Option<f64>,
    max_value: Option<f64>,
    allowed_values: Option<String>,
    is_active: bool,
}

impl From<TagRow> for Tag {
    fn from(r: TagRow) -> Self {
        Tag {
            id: r.id,
            machine_id: r.machine_id,
            name: r.name,
            node_id: r.node_id,
            data_type: r.data_type.parse().unwrap(),
            unit: r.unit,
            min_value: r.min_value,
            max_value: r.max_value,
            allowed_values: r.allowed_values,
            is_active: r.is_active,
        }
    }
}

/// Postgres-backed repository. Queries are parameterized throughout; the
/// `NodeId` lookup relies on an index over `Tags."NodeId"` rather than a
/// table scan.
pub struct PgMetadataRepository {
    pool: PgPool,
}

impl PgMetadataRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn tags_for_machines(&self, machine_ids: &[i32]) -> Result<Vec<Tag>, DaqError> {
        if machine_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<TagRow> = sqlx::query_as(
            r#"
            SELECT "Id" as id, "MachineId" as machine_id, "Name" as name,
                   "NodeId" as node_id, "DataType" as data_type, "Unit" as unit,
                   "MinValue" as min_value, "MaxValue" as max_value,
                   "AllowedValues" as allowed_values, "IsActive" as is_active
            FROM "Tags"
            WHERE "MachineId" = ANY($1) AND "IsActive" = true
            "#,
        )
        .bind(machine_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("tags_for_machines", e))?;

        Ok(rows.into_iter().map(Tag::from).collect())
    }
}

#[async_trait]
impl MetadataRepository for PgMetadataRepository {
    async fn list_active_machines(&self) -> Result<Vec<Machine>, DaqError> {
        let machine_rows: Vec<MachineRow> = sqlx::query_as(
            r#"
            SELECT "Id" as id, "Name" as name, "OpcEndpoint" as opc_endpoint,
                   "AutomateType" as automate_type, "IsActive" as is_active
            FROM "Machines"
            WHERE "IsActive" = true
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("list_active_machines", e))?;

        let ids: Vec<i32> = machine_rows.iter().map(|m| m.id).collect();
        let mut tags_by_machine: HashMap<i32, Vec<Tag>> = HashMap::new();
        for tag in self.tags_for_machines(&ids).await? {
            tags_by_machine.entry(tag.machine_id).or_default().push(tag);
        }

        Ok(machine_rows
            .into_iter()
            .map(|m| Machine {
                id: m.id,
                name: m.name,
                opc_endpoint: m.opc_endpoint,
                automate_type: m.automate_type,
                is_active: m.is_active,
                tags: tags_by_machine.remove(&m.id).unwrap_or_default(),
            })
            .collect())
    }

    async fn get_machine(&self, id: i32) -> Result<Option<Machine>, DaqError> {
        let row: Option<MachineRow> = sqlx::query_as(
            r#"
            SELECT "Id" as id, "Name" as name, "OpcEndpoint" as opc_endpoint,
                   "AutomateType" as automate_type, "IsActive" as is_active
            FROM "Machines"
            WHERE "Id" = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("get_machine", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tags = self.tags_for_machines(&[row.id]).await?;
        Ok(Some(Machine {
            id: row.id,
            name: row.name,
            opc_endpoint: row.opc_endpoint,
            automate_type: row.automate_type,
            is_active: row.is_active,
            tags,
        }))
    }

    async fn get_tag_by_node_id(&self, node_id: &str) -> Result<Option<Tag>, DaqError> {
        let row: Option<TagRow> = sqlx::query_as(
            r#"
            SELECT "Id" as id, "MachineId" as machine_id, "Name" as name,
                   "NodeId" as node_id, "DataType" as data_type, "Unit" as unit,
                   "MinValue" as min_value, "MaxValue" as max_value,
                   "AllowedValues" as allowed_values, "IsActive" as is_active
            FROM "Tags"
            WHERE "NodeId" = $1
            "#,
        )
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("get_tag_by_node_id", e))?;

        Ok(row.map(Tag::from))
    }

    async fn list_active_tags_by_machine(&self, id: i32) -> Result<Vec<Tag>, DaqError> {
        self.tags_for_machines(&[id]).await
    }
}

fn storage_error(query: &str, e: sqlx::Error) -> DaqError {
    warn!(query, error = %e, "metadata query failed");
    DaqError::StorageUnavailable(e.to_string())
}
