use sqlx::PgPool;
use uuid::Uuid;
use vapiorc_types::GoldenImageStatus;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct GoldenImageRow {
    pub id: Uuid,
    pub vm_type: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(not(test))]
pub async fn insert(db: &PgPool, id: Uuid, vm_type: &str) -> sqlx::Result<()> {
    sqlx::query(r#"INSERT INTO golden_images (id, vm_type, status) VALUES ($1, $2, $3)"#)
        .bind(id)
        .bind(vm_type)
        .bind(GoldenImageStatus::Creating.as_str())
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
pub async fn insert(_: &PgPool, id: Uuid, vm_type: &str) -> sqlx::Result<()> {
    let now = chrono::Utc::now();
    store().lock().unwrap().insert(
        id,
        GoldenImageRow {
            id,
            vm_type: vm_type.to_string(),
            status: GoldenImageStatus::Creating.as_str().to_string(),
            created_at: now,
            updated_at: now,
        },
    );
    Ok(())
}

#[cfg(not(test))]
pub async fn get(db: &PgPool, id: Uuid) -> sqlx::Result<GoldenImageRow> {
    sqlx::query_as::<_, GoldenImageRow>(r#"SELECT * FROM golden_images WHERE id = $1"#)
        .bind(id)
        .fetch_one(db)
        .await
}

#[cfg(test)]
pub async fn get(_: &PgPool, id: Uuid) -> sqlx::Result<GoldenImageRow> {
    store()
        .lock()
        .unwrap()
        .get(&id)
        .cloned()
        .ok_or(sqlx::Error::RowNotFound)
}

#[cfg(not(test))]
pub async fn set_status(db: &PgPool, id: Uuid, status: GoldenImageStatus) -> sqlx::Result<()> {
    sqlx::query(r#"UPDATE golden_images SET status = $2, updated_at = now() WHERE id = $1"#)
        .bind(id)
        .bind(status.as_str())
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
pub async fn set_status(_: &PgPool, id: Uuid, status: GoldenImageStatus) -> sqlx::Result<()> {
    let mut guard = store().lock().unwrap();
    let row = guard.get_mut(&id).ok_or(sqlx::Error::RowNotFound)?;
    row.status = status.as_str().to_string();
    row.updated_at = chrono::Utc::now();
    Ok(())
}

/// The one query predicate the replenisher needs: is there a golden image
/// in `status` for `vm_type`, and if so which one (spec §4.D).
#[cfg(not(test))]
pub async fn find_by_status(
    db: &PgPool,
    vm_type: &str,
    status: GoldenImageStatus,
) -> sqlx::Result<Option<GoldenImageRow>> {
    sqlx::query_as::<_, GoldenImageRow>(
        r#"SELECT * FROM golden_images WHERE vm_type = $1 AND status = $2
           ORDER BY created_at DESC LIMIT 1"#,
    )
    .bind(vm_type)
    .bind(status.as_str())
    .fetch_optional(db)
    .await
}

#[cfg(test)]
pub async fn find_by_status(
    _: &PgPool,
    vm_type: &str,
    status: GoldenImageStatus,
) -> sqlx::Result<Option<GoldenImageRow>> {
    Ok(store()
        .lock()
        .unwrap()
        .values()
        .filter(|r| r.vm_type == vm_type && r.status == status.as_str())
        .max_by_key(|r| r.created_at)
        .cloned())
}

#[cfg(not(test))]
pub async fn delete_row(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
    sqlx::query(r#"DELETE FROM golden_images WHERE id = $1"#)
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
fn store() -> &'static Mutex<HashMap<Uuid, GoldenImageRow>> {
    static STORE: OnceLock<Mutex<HashMap<Uuid, GoldenImageRow>>> = OnceLock::new();
    STORE.get_or_init(|| Mutex::new(HashMap::new()))
}

#[cfg(test)]
pub fn reset_store() {
    store().lock().unwrap().clear();
}
