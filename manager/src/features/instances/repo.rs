use sqlx::PgPool;
use uuid::Uuid;
use vapiorc_types::VmInstanceStatus;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct VmInstanceRow {
    pub id: Uuid,
    pub container_id: Option<String>,
    pub vm_type: String,
    pub status: String,
    pub port: Option<i32>,
    pub is_hot_spare: bool,
    pub assigned_to: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(not(test))]
pub async fn insert(db: &PgPool, id: Uuid, vm_type: &str, is_hot_spare: bool) -> sqlx::Result<()> {
    sqlx::query(
        r#"INSERT INTO vm_instances (id, vm_type, status, is_hot_spare)
           VALUES ($1, $2, $3, $4)"#,
    )
    .bind(id)
    .bind(vm_type)
    .bind(VmInstanceStatus::Starting.as_str())
    .bind(is_hot_spare)
    .execute(db)
    .await?;
    Ok(())
}

#[cfg(test)]
pub async fn insert(_: &PgPool, id: Uuid, vm_type: &str, is_hot_spare: bool) -> sqlx::Result<()> {
    let now = chrono::Utc::now();
    store().lock().unwrap().insert(
        id,
        VmInstanceRow {
            id,
            container_id: None,
            vm_type: vm_type.to_string(),
            status: VmInstanceStatus::Starting.as_str().to_string(),
            port: None,
            is_hot_spare,
            assigned_to: None,
            created_at: now,
            updated_at: now,
        },
    );
    Ok(())
}

#[cfg(not(test))]
pub async fn get(db: &PgPool, id: Uuid) -> sqlx::Result<VmInstanceRow> {
    sqlx::query_as::<_, VmInstanceRow>(r#"SELECT * FROM vm_instances WHERE id = $1"#)
        .bind(id)
        .fetch_one(db)
        .await
}

#[cfg(test)]
pub async fn get(_: &PgPool, id: Uuid) -> sqlx::Result<VmInstanceRow> {
    store()
        .lock()
        .unwrap()
        .get(&id)
        .cloned()
        .ok_or(sqlx::Error::RowNotFound)
}

#[cfg(not(test))]
pub async fn list(db: &PgPool) -> sqlx::Result<Vec<VmInstanceRow>> {
    sqlx::query_as::<_, VmInstanceRow>(r#"SELECT * FROM vm_instances ORDER BY created_at DESC"#)
        .fetch_all(db)
        .await
}

#[cfg(test)]
pub async fn list(_: &PgPool) -> sqlx::Result<Vec<VmInstanceRow>> {
    let mut rows: Vec<VmInstanceRow> = store().lock().unwrap().values().cloned().collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(rows)
}

#[cfg(not(test))]
pub async fn set_status(db: &PgPool, id: Uuid, status: VmInstanceStatus) -> sqlx::Result<()> {
    sqlx::query(r#"UPDATE vm_instances SET status = $2, updated_at = now() WHERE id = $1"#)
        .bind(id)
        .bind(status.as_str())
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
pub async fn set_status(_: &PgPool, id: Uuid, status: VmInstanceStatus) -> sqlx::Result<()> {
    let mut guard = store().lock().unwrap();
    let row = guard.get_mut(&id).ok_or(sqlx::Error::RowNotFound)?;
    row.status = status.as_str().to_string();
    row.updated_at = chrono::Utc::now();
    Ok(())
}

/// Transition `starting -> ready` only; any other current state is a no-op
/// that reports it did nothing, so the webhook handler can answer
/// `ignored` on replay (spec §4.J / P6).
#[cfg(not(test))]
pub async fn mark_ready_if_starting(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"UPDATE vm_instances SET status = $2, updated_at = now()
           WHERE id = $1 AND status = $3"#,
    )
    .bind(id)
    .bind(VmInstanceStatus::Ready.as_str())
    .bind(VmInstanceStatus::Starting.as_str())
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
pub async fn mark_ready_if_starting(_: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let mut guard = store().lock().unwrap();
    let Some(row) = guard.get_mut(&id) else {
        return Ok(false);
    };
    if row.status != VmInstanceStatus::Starting.as_str() {
        return Ok(false);
    }
    row.status = VmInstanceStatus::Ready.as_str().to_string();
    row.updated_at = chrono::Utc::now();
    Ok(true)
}

#[cfg(not(test))]
pub async fn set_container(db: &PgPool, id: Uuid, container_id: &str, port: i32) -> sqlx::Result<()> {
    sqlx::query(
        r#"UPDATE vm_instances SET container_id = $2, port = $3, updated_at = now() WHERE id = $1"#,
    )
    .bind(id)
    .bind(container_id)
    .bind(port)
    .execute(db)
    .await?;
    Ok(())
}

#[cfg(test)]
pub async fn set_container(_: &PgPool, id: Uuid, container_id: &str, port: i32) -> sqlx::Result<()> {
    let mut guard = store().lock().unwrap();
    let row = guard.get_mut(&id).ok_or(sqlx::Error::RowNotFound)?;
    row.container_id = Some(container_id.to_string());
    row.port = Some(port);
    row.updated_at = chrono::Utc::now();
    Ok(())
}

#[cfg(not(test))]
pub async fn count_ready_unassigned_hot_spares(db: &PgPool, vm_type: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*) FROM vm_instances
           WHERE vm_type = $1 AND is_hot_spare = true AND status = $2 AND assigned_to IS NULL"#,
    )
    .bind(vm_type)
    .bind(VmInstanceStatus::Ready.as_str())
    .fetch_one(db)
    .await
}

#[cfg(test)]
pub async fn count_ready_unassigned_hot_spares(_: &PgPool, vm_type: &str) -> sqlx::Result<i64> {
    Ok(store()
        .lock()
        .unwrap()
        .values()
        .filter(|r| {
            r.vm_type == vm_type
                && r.is_hot_spare
                && r.status == VmInstanceStatus::Ready.as_str()
                && r.assigned_to.is_none()
        })
        .count() as i64)
}

/// Atomically claim a ready, unassigned hot spare. In production this runs
/// inside a `SELECT ... FOR UPDATE` transaction (spec §4.I); the test
/// double serialises through the same mutex every other repo call uses, so
/// a concurrent pair of calls still observes at-most-one winner (P1).
#[cfg(not(test))]
pub async fn claim_hot_spare(db: &PgPool, vm_type: &str, assigned_to: &str) -> sqlx::Result<Option<VmInstanceRow>> {
    let mut tx = db.begin().await?;
    let candidate = sqlx::query_as::<_, VmInstanceRow>(
        r#"SELECT * FROM vm_instances
           WHERE vm_type = $1 AND is_hot_spare = true AND status = $2 AND assigned_to IS NULL
           ORDER BY created_at ASC
           LIMIT 1
           FOR UPDATE SKIP LOCKED"#,
    )
    .bind(vm_type)
    .bind(VmInstanceStatus::Ready.as_str())
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = candidate else {
        tx.commit().await?;
        return Ok(None);
    };

    sqlx::query(
        r#"UPDATE vm_instances
           SET assigned_to = $2, is_hot_spare = false, status = $3, updated_at = now()
           WHERE id = $1"#,
    )
    .bind(row.id)
    .bind(assigned_to)
    .bind(VmInstanceStatus::Busy.as_str())
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Some(VmInstanceRow {
        assigned_to: Some(assigned_to.to_string()),
        is_hot_spare: false,
        status: VmInstanceStatus::Busy.as_str().to_string(),
        ..row
    }))
}

#[cfg(test)]
pub async fn claim_hot_spare(_: &PgPool, vm_type: &str, assigned_to: &str) -> sqlx::Result<Option<VmInstanceRow>> {
    let mut guard = store().lock().unwrap();
    let winner_id = guard
        .values()
        .filter(|r| {
            r.vm_type == vm_type
                && r.is_hot_spare
                && r.status == VmInstanceStatus::Ready.as_str()
                && r.assigned_to.is_none()
        })
        .min_by_key(|r| r.created_at)
        .map(|r| r.id);

    let Some(id) = winner_id else {
        return Ok(None);
    };
    let row = guard.get_mut(&id).unwrap();
    row.assigned_to = Some(assigned_to.to_string());
    row.is_hot_spare = false;
    row.status = VmInstanceStatus::Busy.as_str().to_string();
    row.updated_at = chrono::Utc::now();
    Ok(Some(row.clone()))
}

#[cfg(not(test))]
pub async fn assign_directly(db: &PgPool, id: Uuid, assigned_to: &str) -> sqlx::Result<()> {
    sqlx::query(
        r#"UPDATE vm_instances SET assigned_to = $2, is_hot_spare = false, status = $3, updated_at = now()
           WHERE id = $1"#,
    )
    .bind(id)
    .bind(assigned_to)
    .bind(VmInstanceStatus::Busy.as_str())
    .execute(db)
    .await?;
    Ok(())
}

#[cfg(test)]
pub async fn assign_directly(_: &PgPool, id: Uuid, assigned_to: &str) -> sqlx::Result<()> {
    let mut guard = store().lock().unwrap();
    let row = guard.get_mut(&id).ok_or(sqlx::Error::RowNotFound)?;
    row.assigned_to = Some(assigned_to.to_string());
    row.is_hot_spare = false;
    row.status = VmInstanceStatus::Busy.as_str().to_string();
    row.updated_at = chrono::Utc::now();
    Ok(())
}

#[cfg(not(test))]
pub async fn delete_row(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
    sqlx::query(r#"DELETE FROM vm_instances WHERE id = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
pub async fn delete_row(_: &PgPool, id: Uuid) -> sqlx::Result<()> {
    store().lock().unwrap().remove(&id);
    Ok(())
}

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(test)]
fn store() -> &'static Mutex<HashMap<Uuid, VmInstanceRow>> {
    static STORE: OnceLock<Mutex<HashMap<Uuid, VmInstanceRow>>> = OnceLock::new();
    STORE.get_or_init(|| Mutex::new(HashMap::new()))
}

#[cfg(test)]
pub fn reset_store() {
    store().lock().unwrap().clear();
}
