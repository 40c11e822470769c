//! Single-slot dataset cache
//!
//! Holds the dataset of the last successful refresh. A save replaces the
//! whole slot inside one transaction, so a reader sees either the previous
//! snapshot or the new one.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::debug;

use crate::models::{DayState, LabeledDataset, LabeledRecord, Snapshot};
use huerto_common::time::{format_timestamp, parse_timestamp};
use huerto_common::{Error, Result};

/// Replace the cached dataset
pub async fn save_snapshot(
    db: &Pool<Sqlite>,
    dataset: &LabeledDataset,
    refreshed_at: DateTime<Utc>,
) -> Result<()> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM dataset_records")
        .execute(&mut *tx)
        .await?;

    for record in dataset.records() {
        sqlx::query(
            "INSERT INTO dataset_records (fecha, temperatura, humedad, conductibilidad, estado) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(format_timestamp(record.fecha))
        .bind(record.temperatura)
        .bind(record.humedad)
        .bind(record.conductibilidad)
        .bind(i64::from(record.estado.as_u8()))
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO dataset_snapshot (id, refreshed_at, record_count) VALUES (1, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            refreshed_at = excluded.refreshed_at,
            record_count = excluded.record_count
        "#,
    )
    .bind(refreshed_at.to_rfc3339())
    .bind(dataset.len() as i64)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    debug!(records = dataset.len(), "Saved dataset snapshot");
    Ok(())
}

/// Load the cached dataset
///
/// **Returns:** `None` if no refresh was ever stored
pub async fn load_snapshot(db: &Pool<Sqlite>) -> Result<Option<Snapshot>> {
    let header: Option<(String, i64)> =
        sqlx::query_as("SELECT refreshed_at, record_count FROM dataset_snapshot WHERE id = 1")
            .fetch_optional(db)
            .await?;

    let Some((refreshed_at, record_count)) = header else {
        return Ok(None);
    };

    let refreshed_at = DateTime::parse_from_rfc3339(&refreshed_at)
        .map_err(|e| Error::Internal(format!("Invalid snapshot timestamp {:?}: {}", refreshed_at, e)))?
        .with_timezone(&Utc);

    let rows: Vec<(String, f64, f64, f64, i64)> = sqlx::query_as(
        "SELECT fecha, temperatura, humedad, conductibilidad, estado FROM dataset_records ORDER BY fecha",
    )
    .fetch_all(db)
    .await?;

    if rows.len() as i64 != record_count {
        return Err(Error::Internal(format!(
            "Snapshot lists {} records but {} are stored",
            record_count,
            rows.len()
        )));
    }

    let records = rows
        .into_iter()
        .map(|(fecha, temperatura, humedad, conductibilidad, estado)| {
            let fecha = parse_timestamp(&fecha)
                .ok_or_else(|| Error::Internal(format!("Invalid cached timestamp {:?}", fecha)))?;
            let estado = u8::try_from(estado)
                .map_err(|_| Error::Internal(format!("Invalid cached Estado {}", estado)))
                .and_then(|v| DayState::try_from(v).map_err(Error::Internal))?;
            Ok(LabeledRecord {
                fecha,
                temperatura,
                humedad,
                conductibilidad,
                estado,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(Snapshot {
        dataset: LabeledDataset::new(records),
        refreshed_at: Some(refreshed_at),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    fn record(hh: u32, t: f64, estado: DayState) -> LabeledRecord {
        LabeledRecord {
            fecha: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(hh, 0, 0)
                .unwrap(),
            temperatura: t,
            humedad: 50.0,
            conductibilidad: 210.5,
            estado,
        }
    }

    #[tokio::test]
    async fn test_empty_cache_loads_none() {
        let pool = memory_pool().await;
        assert!(load_snapshot(&pool).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let pool = memory_pool().await;
        let dataset = LabeledDataset::new(vec![
            record(13, 24.5, DayState::Day),
            record(2, 12.0, DayState::Night),
        ]);
        let at = Utc.with_ymd_and_hms(2024, 6, 2, 8, 30, 0).unwrap();

        save_snapshot(&pool, &dataset, at).await.unwrap();
        let snapshot = load_snapshot(&pool).await.unwrap().unwrap();

        assert_eq!(snapshot.dataset, dataset);
        assert_eq!(snapshot.refreshed_at, Some(at));
    }

    #[tokio::test]
    async fn test_save_replaces_previous_slot() {
        let pool = memory_pool().await;
        let first = LabeledDataset::new(vec![record(1, 10.0, DayState::Night), record(2, 11.0, DayState::Night)]);
        let second = LabeledDataset::new(vec![record(12, 20.0, DayState::Day)]);

        save_snapshot(&pool, &first, Utc::now()).await.unwrap();
        save_snapshot(&pool, &second, Utc::now()).await.unwrap();

        let snapshot = load_snapshot(&pool).await.unwrap().unwrap();
        assert_eq!(snapshot.dataset, second);
    }

    #[tokio::test]
    async fn test_empty_dataset_is_a_valid_snapshot() {
        let pool = memory_pool().await;
        save_snapshot(&pool, &LabeledDataset::default(), Utc::now()).await.unwrap();

        let snapshot = load_snapshot(&pool).await.unwrap().unwrap();
        assert!(snapshot.dataset.is_empty());
        assert!(snapshot.refreshed_at.is_some());
    }
}
