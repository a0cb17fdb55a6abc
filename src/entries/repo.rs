use std::sync::Arc;

use anyhow::Context;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tracing::debug;

use super::repo_types::{DailyStats, FoodEntry, NewEntry};
use crate::clock::Clock;

const ENTRY_COLUMNS: &str = r#"id, dish_name, calories, proteins, fats, carbs, description, ai_tip,
       timestamp, image_path"#;

/// Durable log of food entries.
///
/// Every write bumps a revision counter so subscribers can re-derive their
/// views; readers never observe a half-applied write because each query sees
/// a committed snapshot.
#[derive(Clone)]
pub struct EntryStore {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    revision: Arc<watch::Sender<u64>>,
}

impl EntryStore {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            db,
            clock,
            revision: Arc::new(revision),
        }
    }

    /// Change notifications; the value is a revision number, not data.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Insert an entry stamped with the current time and return its new id.
    pub async fn insert(&self, entry: NewEntry) -> anyhow::Result<i64> {
        let timestamp = self.clock.now_millis();
        let id = sqlx::query(
            r#"
            INSERT INTO food_entries
                (dish_name, calories, proteins, fats, carbs, description, ai_tip, timestamp, image_path)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.dish_name)
        .bind(entry.calories)
        .bind(entry.proteins)
        .bind(entry.fats)
        .bind(entry.carbs)
        .bind(&entry.description)
        .bind(&entry.ai_tip)
        .bind(timestamp)
        .bind(&entry.image_path)
        .execute(&self.db)
        .await
        .context("insert food entry")?
        .last_insert_rowid();

        debug!(id, calories = entry.calories, timestamp, "entry inserted");
        self.bump();
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> anyhow::Result<Option<FoodEntry>> {
        let entry = sqlx::query_as::<_, FoodEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM food_entries WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get food entry")?;
        Ok(entry)
    }

    /// Rewrite the annotated fields of an existing entry. `id` and `timestamp` are kept.
    pub async fn update(&self, entry: &FoodEntry) -> anyhow::Result<bool> {
        let affected = sqlx::query(
            r#"
            UPDATE food_entries
               SET dish_name = ?, calories = ?, proteins = ?, fats = ?, carbs = ?,
                   description = ?, ai_tip = ?, image_path = ?
             WHERE id = ?
            "#,
        )
        .bind(&entry.dish_name)
        .bind(entry.calories)
        .bind(entry.proteins)
        .bind(entry.fats)
        .bind(entry.carbs)
        .bind(&entry.description)
        .bind(&entry.ai_tip)
        .bind(&entry.image_path)
        .bind(entry.id)
        .execute(&self.db)
        .await
        .context("update food entry")?
        .rows_affected();

        if affected > 0 {
            self.bump();
        }
        Ok(affected > 0)
    }

    /// Delete by id. A missing id is not an error; returns whether a row went away.
    pub async fn delete_by_id(&self, id: i64) -> anyhow::Result<bool> {
        let affected = sqlx::query("DELETE FROM food_entries WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete food entry")?
            .rows_affected();

        debug!(id, removed = affected > 0, "entry delete");
        if affected > 0 {
            self.bump();
        }
        Ok(affected > 0)
    }

    pub async fn delete(&self, entry: &FoodEntry) -> anyhow::Result<bool> {
        self.delete_by_id(entry.id).await
    }

    /// All entries, newest first.
    pub async fn list_all(&self) -> anyhow::Result<Vec<FoodEntry>> {
        let rows = sqlx::query_as::<_, FoodEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM food_entries ORDER BY timestamp DESC, id DESC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list food entries")?;
        Ok(rows)
    }

    /// Entries with `timestamp >= start`, newest first.
    pub async fn list_since(&self, start: i64) -> anyhow::Result<Vec<FoodEntry>> {
        let rows = sqlx::query_as::<_, FoodEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM food_entries WHERE timestamp >= ? \
             ORDER BY timestamp DESC, id DESC"
        ))
        .bind(start)
        .fetch_all(&self.db)
        .await
        .context("list food entries since")?;
        Ok(rows)
    }

    /// Totals over every entry with `timestamp >= start_of_day`, summed from scratch.
    pub async fn daily_stats(&self, start_of_day: i64) -> anyhow::Result<DailyStats> {
        let stats = sqlx::query_as::<_, DailyStats>(
            r#"
            SELECT COALESCE(SUM(calories), 0) AS calories,
                   TOTAL(proteins)            AS proteins,
                   TOTAL(fats)                AS fats,
                   TOTAL(carbs)               AS carbs
              FROM food_entries
             WHERE timestamp >= ?
            "#,
        )
        .bind(start_of_day)
        .fetch_one(&self.db)
        .await
        .context("sum daily stats")?;
        Ok(stats)
    }
}
