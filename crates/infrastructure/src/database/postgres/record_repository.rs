use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use tracing::debug;

use swarm_core::{
    models::{AnalysisRecord, ComponentEntry, ComponentType, RecordCounts, RecordData},
    traits::{CandidateOrder, CandidateQuery, RecordRepository},
    SwarmError, SwarmResult,
};

const RECORD_COLUMNS: &str = "id, alternate_id, name, data, priority_rank, components, \
     component_count, fully_analyzed, analysis_completed_at, last_updated";

/// PostgreSQL分析记录仓储
pub struct PostgresRecordRepository {
    pool: PgPool,
}

impl PostgresRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &PgRow) -> SwarmResult<AnalysisRecord> {
        let data: Json<RecordData> = row.try_get("data")?;
        let components: Json<BTreeMap<ComponentType, ComponentEntry>> = row.try_get("components")?;
        let component_count: i32 = row.try_get("component_count")?;

        Ok(AnalysisRecord {
            id: row.try_get("id")?,
            alternate_id: row.try_get("alternate_id")?,
            name: row.try_get("name")?,
            data: data.0,
            priority_rank: row.try_get("priority_rank")?,
            components: components.0,
            component_count: component_count.max(0) as u32,
            fully_analyzed: row.try_get("fully_analyzed")?,
            analysis_completed_at: row.try_get("analysis_completed_at")?,
            last_updated: row.try_get("last_updated")?,
        })
    }

    async fn find_one(&self, column: &str, value: &str) -> SwarmResult<Option<AnalysisRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM analysis_records WHERE {column} = $1 LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        row.as_ref().map(Self::row_to_record).transpose()
    }
}

#[async_trait]
impl RecordRepository for PostgresRecordRepository {
    async fn upsert(&self, record: &AnalysisRecord) -> SwarmResult<()> {
        sqlx::query(
            r#"
            INSERT INTO analysis_records (id, alternate_id, name, data, priority_rank, components,
                component_count, fully_analyzed, analysis_completed_at, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                alternate_id = EXCLUDED.alternate_id,
                name = EXCLUDED.name,
                data = EXCLUDED.data,
                priority_rank = EXCLUDED.priority_rank,
                components = EXCLUDED.components,
                component_count = EXCLUDED.component_count,
                fully_analyzed = EXCLUDED.fully_analyzed,
                analysis_completed_at = EXCLUDED.analysis_completed_at,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(&record.id)
        .bind(&record.alternate_id)
        .bind(&record.name)
        .bind(Json(&record.data))
        .bind(record.priority_rank)
        .bind(Json(&record.components))
        .bind(record.component_count as i32)
        .bind(record.fully_analyzed)
        .bind(record.analysis_completed_at)
        .bind(record.last_updated)
        .execute(&self.pool)
        .await
        .map_err(SwarmError::Database)?;

        debug!("写入分析记录: {}", record.id);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> SwarmResult<Option<AnalysisRecord>> {
        self.find_one("id", id).await
    }

    async fn get_by_alternate_id(&self, alternate_id: &str) -> SwarmResult<Option<AnalysisRecord>> {
        self.find_one("alternate_id", alternate_id).await
    }

    async fn get_by_name(&self, name: &str) -> SwarmResult<Option<AnalysisRecord>> {
        self.find_one("name", name).await
    }

    async fn get_many(&self, ids: &[String]) -> SwarmResult<Vec<AnalysisRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {RECORD_COLUMNS} FROM analysis_records WHERE id = ANY($1)");
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        let mut by_id = BTreeMap::new();
        for row in &rows {
            let record = Self::row_to_record(row)?;
            by_id.insert(record.id.clone(), record);
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn find_candidates(&self, query: &CandidateQuery<'_>) -> SwarmResult<Vec<AnalysisRecord>> {
        let order = match query.order {
            CandidateOrder::RankAscending => "priority_rank ASC, id ASC",
            CandidateOrder::Random => "random()",
        };
        // `?&` 判断是否已包含全部给定键；空数组时条件恒为真，不做组件过滤
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM analysis_records \
             WHERE priority_rank IS NOT NULL AND component_count < $1 \
             AND (cardinality($3::text[]) = 0 OR NOT (components ?& $3::text[])) \
             ORDER BY {order} LIMIT $2"
        );
        let wanted: Vec<&str> = query.missing_any_of.iter().map(|c| c.as_str()).collect();

        let rows = sqlx::query(&sql)
            .bind(query.below_component_count as i32)
            .bind(query.limit as i64)
            .bind(&wanted)
            .fetch_all(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn merge_components(
        &self,
        record_id: &str,
        components: &BTreeMap<ComponentType, ComponentEntry>,
        completion_threshold: u32,
    ) -> SwarmResult<Option<AnalysisRecord>> {
        // 单条UPDATE完成合并与计数，SET表达式基于加锁后的最新行计算，并发提交按顺序生效
        let sql = format!(
            r#"
            UPDATE analysis_records SET
                components = components || $2,
                component_count = (SELECT COUNT(*) FROM jsonb_object_keys(components || $2))::INTEGER,
                fully_analyzed = (SELECT COUNT(*) FROM jsonb_object_keys(components || $2)) >= $3,
                analysis_completed_at = CASE
                    WHEN analysis_completed_at IS NULL
                         AND (SELECT COUNT(*) FROM jsonb_object_keys(components || $2)) >= $3
                    THEN NOW()
                    ELSE analysis_completed_at
                END,
                last_updated = NOW()
            WHERE id = $1
            RETURNING {RECORD_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(record_id)
            .bind(Json(components))
            .bind(completion_threshold as i32)
            .fetch_optional(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn recompute_completion(&self, completion_threshold: u32) -> SwarmResult<u64> {
        let result = sqlx::query(
            r#"
            WITH counted AS (
                SELECT id, (SELECT COUNT(*) FROM jsonb_object_keys(components))::INTEGER AS cnt
                FROM analysis_records
            )
            UPDATE analysis_records AS r SET
                component_count = counted.cnt,
                fully_analyzed = counted.cnt >= $1,
                last_updated = NOW()
            FROM counted
            WHERE r.id = counted.id
              AND (r.component_count <> counted.cnt OR r.fully_analyzed <> (counted.cnt >= $1))
            "#,
        )
        .bind(completion_threshold as i32)
        .execute(&self.pool)
        .await
        .map_err(SwarmError::Database)?;

        Ok(result.rows_affected())
    }

    async fn counts(&self) -> SwarmResult<RecordCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE component_count > 0) AS analyzed,
                COUNT(*) FILTER (WHERE fully_analyzed) AS fully
            FROM analysis_records
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(SwarmError::Database)?;

        let total: i64 = row.try_get("total")?;
        let analyzed: i64 = row.try_get("analyzed")?;
        let fully: i64 = row.try_get("fully")?;
        Ok(RecordCounts::new(total as u64, analyzed as u64, fully as u64))
    }
}
