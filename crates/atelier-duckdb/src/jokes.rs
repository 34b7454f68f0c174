use anyhow::Result;
use rand::Rng;

use atelier_core::joke::{Joke, NewJoke};

use crate::DuckDbBackend;

impl DuckDbBackend {
    pub async fn count_jokes(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM jokes")?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(count)
    }

    /// Insert jokes in a single transaction. Returns the number inserted.
    pub async fn insert_jokes(&self, jokes: &[NewJoke]) -> Result<usize> {
        if jokes.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for joke in jokes {
            tx.execute(
                "INSERT INTO jokes (setup, punchline) VALUES (?1, ?2)",
                duckdb::params![joke.setup.trim(), joke.punchline.trim()],
            )?;
        }
        tx.commit()?;
        Ok(jokes.len())
    }

    /// Seed the table from `jokes` only when it is still empty, so restarts
    /// do not duplicate rows.
    pub async fn seed_jokes_if_empty(&self, jokes: &[NewJoke]) -> Result<usize> {
        if self.count_jokes().await? > 0 {
            return Ok(0);
        }
        self.insert_jokes(jokes).await
    }

    /// Pick a joke uniformly at random. `None` when the table is empty.
    pub async fn random_joke(&self) -> Result<Option<Joke>> {
        let conn = self.conn.lock().await;
        let total: i64 = conn
            .prepare("SELECT COUNT(*) FROM jokes")?
            .query_row([], |row| row.get(0))?;
        if total == 0 {
            return Ok(None);
        }
        let offset = rand::thread_rng().gen_range(0..total);
        let mut stmt =
            conn.prepare("SELECT id, setup, punchline FROM jokes ORDER BY id LIMIT 1 OFFSET ?1")?;
        let joke = stmt.query_row(duckdb::params![offset], |row| {
            Ok(Joke {
                id: row.get(0)?,
                setup: row.get(1)?,
                punchline: row.get(2)?,
            })
        })?;
        Ok(Some(joke))
    }
}
