use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{QueryBuilder, Row};

use payflow_core::audit::{AuditDecision, AuditEntry, AuditTrail};
use payflow_core::domain::actor::{ActorId, TenantId};
use payflow_core::domain::approval::{
    ApprovalRequest, ApprovalRequestId, CheckpointDecision, Decision, ProjectId, ReferenceId,
    ReferenceType, RequestState, SupplierId,
};
use payflow_core::flows::Checkpoint;
use payflow_core::listing::{ListFilter, ListQuery, Page, PageRequest};
use payflow_core::store::{RequestStore, StoreError};

use super::RepositoryError;
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, tenant_id, project_id, reference_type, reference_id, \
     supplier_id, name, amount, purpose, state, requested_by, \
     level1_approver_id, level1_decision, level1_note, level1_decided_at, \
     level2_approver_id, level2_decision, level2_note, level2_decided_at, \
     version, created_at, updated_at";

/// SQLite-backed request store, audit trail and list query.
pub struct SqlApprovalRequestRepository {
    pool: DbPool,
}

impl SqlApprovalRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn exists(
        &self,
        tenant_id: &TenantId,
        id: &ApprovalRequestId,
    ) -> Result<bool, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM approval_request WHERE id = ? AND tenant_id = ?",
        )
        .bind(&id.0)
        .bind(&tenant_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Tells a lost race apart from a missing row after a guarded write touched nothing.
    async fn miss_reason(
        &self,
        tenant_id: &TenantId,
        id: &ApprovalRequestId,
        expected_version: u32,
    ) -> StoreError {
        match self.exists(tenant_id, id).await {
            Ok(true) => StoreError::Conflict { id: id.clone(), expected_version },
            Ok(false) => StoreError::NotFound(id.clone()),
            Err(error) => error.into(),
        }
    }
}

/// Lowercased name and purpose. SQLite `LOWER` only folds ASCII, so keyword
/// matching runs against this column instead.
fn search_text(request: &ApprovalRequest) -> String {
    match request.purpose.as_deref() {
        Some(purpose) => format!("{}\n{}", request.name.to_lowercase(), purpose.to_lowercase()),
        None => request.name.to_lowercase(),
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn decode_error(column: &str, value: &str) -> RepositoryError {
    RepositoryError::Decode(format!("unexpected {column} value `{value}`"))
}

fn decision_from_row(
    row: &SqliteRow,
    prefix: &str,
) -> Result<Option<CheckpointDecision>, RepositoryError> {
    let approver: Option<String> = row.try_get(format!("{prefix}_approver_id").as_str())?;
    let Some(approver) = approver else {
        return Ok(None);
    };
    let decision: String = row.try_get(format!("{prefix}_decision").as_str())?;
    let note: Option<String> = row.try_get(format!("{prefix}_note").as_str())?;
    let decided_at: String = row.try_get(format!("{prefix}_decided_at").as_str())?;

    Ok(Some(CheckpointDecision {
        approver_id: ActorId(approver),
        decision: Decision::parse(&decision)
            .ok_or_else(|| decode_error("decision", &decision))?,
        note: note.unwrap_or_default(),
        decided_at: parse_timestamp("decided_at", &decided_at)?,
    }))
}

fn row_to_request(row: &SqliteRow) -> Result<ApprovalRequest, RepositoryError> {
    let reference_type: String = row.try_get("reference_type")?;
    let state: String = row.try_get("state")?;
    let amount: String = row.try_get("amount")?;
    let version: i64 = row.try_get("version")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ApprovalRequest {
        id: ApprovalRequestId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        project_id: ProjectId(row.try_get("project_id")?),
        reference_type: ReferenceType::parse(&reference_type)
            .ok_or_else(|| decode_error("reference_type", &reference_type))?,
        reference_id: ReferenceId(row.try_get("reference_id")?),
        supplier_id: row.try_get::<Option<i64>, _>("supplier_id")?.map(SupplierId),
        name: row.try_get("name")?,
        amount: Decimal::from_str(&amount).map_err(|_| decode_error("amount", &amount))?,
        purpose: row.try_get("purpose")?,
        state: RequestState::parse(&state).ok_or_else(|| decode_error("state", &state))?,
        requested_by: ActorId(row.try_get("requested_by")?),
        level1_decision: decision_from_row(row, "level1")?,
        level2_decision: decision_from_row(row, "level2")?,
        version: u32::try_from(version)
            .map_err(|_| decode_error("version", &version.to_string()))?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<AuditEntry, RepositoryError> {
    let level: String = row.try_get("level")?;
    let decision: String = row.try_get("decision")?;
    let at: String = row.try_get("timestamp")?;

    Ok(AuditEntry {
        request_id: ApprovalRequestId(row.try_get("request_id")?),
        level: Checkpoint::parse(&level).ok_or_else(|| decode_error("level", &level))?,
        actor_id: ActorId(row.try_get("actor_id")?),
        decision: AuditDecision::parse(&decision)
            .ok_or_else(|| decode_error("decision", &decision))?,
        note: row.try_get("note")?,
        timestamp: parse_timestamp("timestamp", &at)?,
    })
}

struct DecisionColumns {
    approver_id: Option<String>,
    decision: Option<&'static str>,
    note: Option<String>,
    decided_at: Option<String>,
}

impl DecisionColumns {
    fn from(decision: Option<&CheckpointDecision>) -> Self {
        match decision {
            Some(decision) => Self {
                approver_id: Some(decision.approver_id.0.clone()),
                decision: Some(decision.decision.as_str()),
                note: Some(decision.note.clone()),
                decided_at: Some(timestamp(&decision.decided_at)),
            },
            None => Self { approver_id: None, decision: None, note: None, decided_at: None },
        }
    }
}

async fn insert_entry<'c, E>(executor: E, entry: &AuditEntry) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO approval_audit_entry (request_id, level, actor_id, decision, note, timestamp)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.request_id.0)
    .bind(entry.level.as_str())
    .bind(&entry.actor_id.0)
    .bind(entry.decision.as_str())
    .bind(&entry.note)
    .bind(timestamp(&entry.timestamp))
    .execute(executor)
    .await?;
    Ok(())
}

fn push_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    tenant_id: &TenantId,
    filter: &ListFilter,
) {
    builder.push(" WHERE tenant_id = ").push_bind(tenant_id.0.clone());

    if let Some(project_id) = &filter.project_id {
        builder.push(" AND project_id = ").push_bind(project_id.0.clone());
    }

    if !filter.states.is_empty() {
        builder.push(" AND state IN (");
        let mut separated = builder.separated(", ");
        for state in &filter.states {
            separated.push_bind(state.as_str());
        }
        separated.push_unseparated(")");
    }

    if let Some(reference_type) = filter.reference_type {
        builder.push(" AND reference_type = ").push_bind(reference_type.as_str());
    }

    if !filter.supplier_ids.is_empty() {
        builder.push(" AND supplier_id IN (");
        let mut separated = builder.separated(", ");
        for supplier_id in &filter.supplier_ids {
            separated.push_bind(supplier_id.0);
        }
        separated.push_unseparated(")");
    }

    if let Some(keyword) = filter.keyword() {
        let pattern = format!("%{}%", escape_like(&keyword.to_lowercase()));
        builder
            .push(" AND search_text LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\'");
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl RequestStore for SqlApprovalRequestRepository {
    async fn insert(&self, request: ApprovalRequest) -> Result<(), StoreError> {
        let level1 = DecisionColumns::from(request.level1_decision.as_ref());
        let level2 = DecisionColumns::from(request.level2_decision.as_ref());

        sqlx::query(&format!(
            "INSERT INTO approval_request ({REQUEST_COLUMNS}, search_text)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&request.id.0)
        .bind(&request.tenant_id.0)
        .bind(&request.project_id.0)
        .bind(request.reference_type.as_str())
        .bind(request.reference_id.0)
        .bind(request.supplier_id.map(|supplier| supplier.0))
        .bind(&request.name)
        .bind(request.amount.to_string())
        .bind(&request.purpose)
        .bind(request.state.as_str())
        .bind(&request.requested_by.0)
        .bind(level1.approver_id)
        .bind(level1.decision)
        .bind(level1.note)
        .bind(level1.decided_at)
        .bind(level2.approver_id)
        .bind(level2.decision)
        .bind(level2.note)
        .bind(level2.decided_at)
        .bind(i64::from(request.version))
        .bind(timestamp(&request.created_at))
        .bind(timestamp(&request.updated_at))
        .bind(search_text(&request))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn find(
        &self,
        tenant_id: &TenantId,
        id: &ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM approval_request WHERE id = ? AND tenant_id = ?"
        ))
        .bind(&id.0)
        .bind(&tenant_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn compare_and_swap(
        &self,
        updated: ApprovalRequest,
        expected_version: u32,
        entry: Option<AuditEntry>,
    ) -> Result<(), StoreError> {
        let level1 = DecisionColumns::from(updated.level1_decision.as_ref());
        let level2 = DecisionColumns::from(updated.level2_decision.as_ref());

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let result = sqlx::query(
            "UPDATE approval_request
             SET name = ?, amount = ?, purpose = ?, search_text = ?, reference_id = ?, state = ?,
                 level1_approver_id = ?, level1_decision = ?, level1_note = ?,
                 level1_decided_at = ?,
                 level2_approver_id = ?, level2_decision = ?, level2_note = ?,
                 level2_decided_at = ?,
                 version = ?, updated_at = ?
             WHERE id = ? AND tenant_id = ? AND version = ?",
        )
        .bind(&updated.name)
        .bind(updated.amount.to_string())
        .bind(&updated.purpose)
        .bind(search_text(&updated))
        .bind(updated.reference_id.0)
        .bind(updated.state.as_str())
        .bind(level1.approver_id)
        .bind(level1.decision)
        .bind(level1.note)
        .bind(level1.decided_at)
        .bind(level2.approver_id)
        .bind(level2.decision)
        .bind(level2.note)
        .bind(level2.decided_at)
        .bind(i64::from(updated.version))
        .bind(timestamp(&updated.updated_at))
        .bind(&updated.id.0)
        .bind(&updated.tenant_id.0)
        .bind(i64::from(expected_version))
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() != 1 {
            tx.rollback().await.map_err(RepositoryError::from)?;
            return Err(self.miss_reason(&updated.tenant_id, &updated.id, expected_version).await);
        }

        if let Some(entry) = &entry {
            insert_entry(&mut *tx, entry).await?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn delete_draft(
        &self,
        tenant_id: &TenantId,
        id: &ApprovalRequestId,
        expected_version: u32,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "DELETE FROM approval_request
             WHERE id = ? AND tenant_id = ? AND version = ? AND state = 'draft'",
        )
        .bind(&id.0)
        .bind(&tenant_id.0)
        .bind(i64::from(expected_version))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(self.miss_reason(tenant_id, id, expected_version).await);
        }
        Ok(())
    }
}

#[async_trait]
impl AuditTrail for SqlApprovalRequestRepository {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError> {
        insert_entry(&self.pool, &entry).await?;
        Ok(())
    }

    async fn entries_for(
        &self,
        request_id: &ApprovalRequestId,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT request_id, level, actor_id, decision, note, timestamp
             FROM approval_audit_entry
             WHERE request_id = ?
             ORDER BY timestamp ASC, seq ASC",
        )
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_entry).collect::<Result<Vec<_>, _>>()?)
    }
}

#[async_trait]
impl ListQuery for SqlApprovalRequestRepository {
    async fn find_page(
        &self,
        tenant_id: &TenantId,
        filter: &ListFilter,
        window: PageRequest,
    ) -> Result<Page<ApprovalRequest>, StoreError> {
        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM approval_request");
        push_filters(&mut count_query, tenant_id, filter);
        let total_count: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let mut rows_query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {REQUEST_COLUMNS} FROM approval_request"));
        push_filters(&mut rows_query, tenant_id, filter);
        rows_query
            .push(" ORDER BY created_at DESC, id ASC LIMIT ")
            .push_bind(i64::from(window.page_size))
            .push(" OFFSET ")
            .push_bind(i64::try_from(window.offset()).unwrap_or(i64::MAX));
        let rows = rows_query.build().fetch_all(&self.pool).await.map_err(RepositoryError::from)?;

        let items = rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total_count: u64::try_from(total_count).unwrap_or_default(),
            page: window.page,
            page_size: window.page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use payflow_core::audit::{AuditDecision, AuditEntry, AuditTrail};
    use payflow_core::domain::actor::{ActorContext, ActorId, TenantId};
    use payflow_core::domain::approval::{
        ApprovalRequest, ApprovalRequestId, CheckpointDecision, Decision, NewApprovalRequest,
        ProjectId, ReferenceId, ReferenceType, RequestState, SupplierId,
    };
    use payflow_core::flows::Checkpoint;
    use payflow_core::listing::{ListFilter, ListQuery, PageRequest};
    use payflow_core::store::{RequestStore, StoreError};

    use super::SqlApprovalRequestRepository;
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlApprovalRequestRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlApprovalRequestRepository::new(pool)
    }

    fn draft(id: &str, tenant: &str, minutes: i64, name: &str) -> ApprovalRequest {
        let created = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).single().expect("valid timestamp")
            + Duration::minutes(minutes);
        ApprovalRequest::new_draft(
            ApprovalRequestId(id.to_string()),
            &ActorContext::new("u-author", tenant),
            ProjectId("P-1".to_string()),
            NewApprovalRequest {
                name: name.to_string(),
                amount: Decimal::new(5_000_000_25, 2),
                purpose: Some("Main hall 100% coverage".to_string()),
                reference_type: ReferenceType::Quote,
                reference_id: ReferenceId(42),
                supplier_id: Some(SupplierId(7)),
            },
            created,
        )
        .expect("valid draft")
    }

    fn entry(request: &ApprovalRequest, level: Checkpoint, decision: AuditDecision) -> AuditEntry {
        AuditEntry {
            request_id: request.id.clone(),
            level,
            actor_id: ActorId("u-pm".to_string()),
            decision,
            note: Some("OK".to_string()),
            timestamp: request.updated_at,
        }
    }

    #[tokio::test]
    async fn insert_and_find_round_trip_every_field() {
        let repo = repository().await;
        let mut request = draft("REQ-1", "t-1", 0, "Stage lighting");
        request.state = RequestState::ApprovedLv1;
        request.level1_decision = Some(CheckpointDecision {
            approver_id: ActorId("u-pm".to_string()),
            decision: Decision::Approve,
            note: "OK".to_string(),
            decided_at: request.created_at + Duration::seconds(5),
        });

        repo.insert(request.clone()).await.expect("insert");
        let found = repo.find(&request.tenant_id, &request.id).await.expect("find");

        assert_eq!(found, Some(request.clone()));
        let foreign = repo.find(&TenantId("t-2".to_string()), &request.id).await.expect("find");
        assert_eq!(foreign, None);
    }

    #[tokio::test]
    async fn stale_swap_is_a_conflict_and_leaves_no_audit_entry() {
        let repo = repository().await;
        let original = draft("REQ-1", "t-1", 0, "Stage lighting");
        repo.insert(original.clone()).await.expect("insert");

        let mut winner = original.clone();
        winner.state = RequestState::Pending;
        winner.version = 2;
        repo.compare_and_swap(
            winner.clone(),
            1,
            Some(entry(&winner, Checkpoint::Submit, AuditDecision::Submitted)),
        )
        .await
        .expect("first swap");

        let mut loser = original.clone();
        loser.name = "lost".to_string();
        loser.version = 2;
        let error = repo
            .compare_and_swap(
                loser.clone(),
                1,
                Some(entry(&loser, Checkpoint::Submit, AuditDecision::Submitted)),
            )
            .await
            .expect_err("stale version");

        assert_eq!(error, StoreError::Conflict { id: original.id.clone(), expected_version: 1 });
        assert_eq!(repo.find(&original.tenant_id, &original.id).await.expect("find"), Some(winner));
        assert_eq!(repo.entries_for(&original.id).await.expect("entries").len(), 1);
    }

    #[tokio::test]
    async fn swap_on_missing_request_is_not_found() {
        let repo = repository().await;
        let ghost = draft("REQ-404", "t-1", 0, "Ghost");

        let error = repo.compare_and_swap(ghost.clone(), 1, None).await.expect_err("missing");
        assert_eq!(error, StoreError::NotFound(ghost.id));
    }

    #[tokio::test]
    async fn delete_only_removes_matching_drafts() {
        let repo = repository().await;
        let request = draft("REQ-1", "t-1", 0, "Stage lighting");
        repo.insert(request.clone()).await.expect("insert");

        let stale = repo.delete_draft(&request.tenant_id, &request.id, 3).await;
        assert!(matches!(stale, Err(StoreError::Conflict { .. })));

        repo.delete_draft(&request.tenant_id, &request.id, 1).await.expect("delete");
        assert_eq!(repo.find(&request.tenant_id, &request.id).await.expect("find"), None);
    }

    #[tokio::test]
    async fn audit_entries_keep_insertion_order_on_equal_timestamps() {
        let repo = repository().await;
        let request = draft("REQ-1", "t-1", 0, "Stage lighting");
        repo.insert(request.clone()).await.expect("insert");

        let mut second = entry(&request, Checkpoint::Level1, AuditDecision::Approved);
        second.actor_id = ActorId("u-second".to_string());
        repo.append(entry(&request, Checkpoint::Submit, AuditDecision::Submitted))
            .await
            .expect("append");
        repo.append(second).await.expect("append");

        let levels: Vec<_> = repo
            .entries_for(&request.id)
            .await
            .expect("entries")
            .into_iter()
            .map(|entry| entry.level)
            .collect();
        assert_eq!(levels, vec![Checkpoint::Submit, Checkpoint::Level1]);
    }

    #[tokio::test]
    async fn listing_filters_orders_and_counts() {
        let repo = repository().await;
        repo.insert(draft("REQ-A", "t-1", 0, "Stage lighting")).await.expect("insert");
        repo.insert(draft("REQ-B", "t-1", 10, "Sound desk")).await.expect("insert");
        repo.insert(draft("REQ-C", "t-1", 10, "Lighting truss")).await.expect("insert");
        repo.insert(draft("REQ-X", "t-2", 20, "Lighting elsewhere")).await.expect("insert");

        let tenant = TenantId("t-1".to_string());
        let everything = repo
            .find_page(&tenant, &ListFilter::default(), PageRequest { page: 1, page_size: 2 })
            .await
            .expect("list");
        let ids: Vec<_> = everything.items.iter().map(|r| r.id.0.as_str()).collect();
        assert_eq!(ids, vec!["REQ-B", "REQ-C"]);
        assert_eq!(everything.total_count, 3);

        let lighting = repo
            .find_page(
                &tenant,
                &ListFilter {
                    keyword: Some("LIGHT".to_string()),
                    states: vec![RequestState::Draft],
                    supplier_ids: vec![SupplierId(7)],
                    ..Default::default()
                },
                PageRequest { page: 1, page_size: 10 },
            )
            .await
            .expect("list");
        let ids: Vec<_> = lighting.items.iter().map(|r| r.id.0.as_str()).collect();
        assert_eq!(ids, vec!["REQ-C", "REQ-A"]);

        let percent = repo
            .find_page(
                &tenant,
                &ListFilter { keyword: Some("100%".to_string()), ..Default::default() },
                PageRequest { page: 1, page_size: 10 },
            )
            .await
            .expect("list");
        assert_eq!(percent.total_count, 3, "literal percent matches the purpose text");

        let pending = repo
            .find_page(
                &tenant,
                &ListFilter { states: vec![RequestState::Pending], ..Default::default() },
                PageRequest { page: 1, page_size: 10 },
            )
            .await
            .expect("list");
        assert_eq!(pending.total_count, 0);
        assert!(pending.items.is_empty());

        let mut stage = draft("REQ-V", "t-1", 30, "Đèn sân khấu");
        stage.purpose = Some("ÁNH SÁNG hội trường".to_string());
        repo.insert(stage.clone()).await.expect("insert");
        for keyword in ["đèn", "ĐÈN", "ánh sáng"] {
            let found = repo
                .find_page(
                    &tenant,
                    &ListFilter { keyword: Some(keyword.to_string()), ..Default::default() },
                    PageRequest { page: 1, page_size: 10 },
                )
                .await
                .expect("list");
            let ids: Vec<_> = found.items.iter().map(|r| r.id.0.as_str()).collect();
            assert_eq!(ids, vec!["REQ-V"], "keyword `{keyword}` folds non-ASCII case");
        }

        let mut renamed = stage.clone();
        renamed.name = "Màn CHIẾU".to_string();
        renamed.version = 2;
        repo.compare_and_swap(renamed, 1, None).await.expect("rename");
        let by_new_name = repo
            .find_page(
                &tenant,
                &ListFilter { keyword: Some("chiếu".to_string()), ..Default::default() },
                PageRequest { page: 1, page_size: 10 },
            )
            .await
            .expect("list");
        assert_eq!(by_new_name.total_count, 1);
        let by_old_name = repo
            .find_page(
                &tenant,
                &ListFilter { keyword: Some("đèn".to_string()), ..Default::default() },
                PageRequest { page: 1, page_size: 10 },
            )
            .await
            .expect("list");
        assert_eq!(by_old_name.total_count, 0);
    }
}
