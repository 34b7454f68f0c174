use anyhow::Result;
use chrono::{NaiveDateTime, Utc};

use atelier_core::contact::{Contact, NewContact};

use crate::DuckDbBackend;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

impl DuckDbBackend {
    /// Store a validated contact submission and return the stored row.
    pub async fn insert_contact(&self, contact: &NewContact) -> Result<Contact> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO contacts (id, first_name, last_name, email, message, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, CAST(?6 AS TIMESTAMP))",
            duckdb::params![
                id,
                contact.first_name,
                contact.last_name,
                contact.email,
                contact.message,
                created_at.naive_utc().format(TIMESTAMP_FORMAT).to_string(),
            ],
        )?;
        tracing::info!(contact_id = %id, "Contact submission stored");
        Ok(Contact {
            id,
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            email: contact.email.clone(),
            message: contact.message.clone(),
            created_at,
        })
    }

    pub async fn count_contacts(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM contacts")?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(count)
    }

    /// Most recent submissions first.
    pub async fn list_contacts(&self, limit: i64) -> Result<Vec<Contact>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, first_name, last_name, email, message, CAST(created_at AS VARCHAR) \
             FROM contacts ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(duckdb::params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut contacts = Vec::new();
        for row in rows {
            let (id, first_name, last_name, email, message, created_at) = row?;
            let created_at = NaiveDateTime::parse_from_str(&created_at, TIMESTAMP_FORMAT)?.and_utc();
            contacts.push(Contact {
                id,
                first_name,
                last_name,
                email,
                message,
                created_at,
            });
        }
        Ok(contacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(first: &str) -> NewContact {
        NewContact {
            first_name: first.to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            message: "Can you build us a site?".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_then_list_round_trips_fields() {
        let db = DuckDbBackend::open_in_memory().expect("db");
        let stored = db.insert_contact(&sample("Ada")).await.expect("insert");
        assert_eq!(stored.id.len(), 36);

        let listed = db.list_contacts(10).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, stored.id);
        assert_eq!(listed[0].first_name, "Ada");
        assert_eq!(listed[0].message, "Can you build us a site?");
        assert_eq!(
            listed[0].created_at.timestamp(),
            stored.created_at.timestamp()
        );
    }

    #[tokio::test]
    async fn count_tracks_inserts() {
        let db = DuckDbBackend::open_in_memory().expect("db");
        assert_eq!(db.count_contacts().await.expect("count"), 0);
        db.insert_contact(&sample("A")).await.expect("insert");
        db.insert_contact(&sample("B")).await.expect("insert");
        assert_eq!(db.count_contacts().await.expect("count"), 2);
    }
}
