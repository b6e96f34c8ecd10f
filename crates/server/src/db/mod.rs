use shared::RequestStatus;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;

mod models;

pub use models::*;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> anyhow::Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        Ok(Self { pool })
    }

    /// In-memory database for tests.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                display_name TEXT,
                password_hash TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS requests (
                id TEXT PRIMARY KEY,
                from_user_id TEXT NOT NULL REFERENCES users(id),
                from_name TEXT,
                from_email TEXT,
                to_name TEXT,
                to_email TEXT NOT NULL,
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL,
                place TEXT NOT NULL,
                note TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contacts (
                owner_user_id TEXT NOT NULL,
                contact_email TEXT NOT NULL,
                contact_name TEXT,
                times_used INTEGER NOT NULL DEFAULT 1,
                last_used_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (owner_user_id, contact_email)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    // User operations
    pub async fn create_user(&self, user: &User) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO users (id, email, display_name, password_hash) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, display_name, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, display_name, password_hash, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    // Request operations
    pub async fn create_request(&self, req: &RequestRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO requests
                (id, from_user_id, from_name, from_email, to_name, to_email,
                 date, start_time, duration_minutes, place, note, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending')
            "#,
        )
        .bind(&req.id)
        .bind(&req.from_user_id)
        .bind(&req.from_name)
        .bind(&req.from_email)
        .bind(&req.to_name)
        .bind(&req.to_email)
        .bind(&req.date)
        .bind(&req.start_time)
        .bind(req.duration_minutes)
        .bind(&req.place)
        .bind(&req.note)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_request(&self, id: &str) -> Result<Option<RequestRow>, sqlx::Error> {
        sqlx::query_as::<_, RequestRow>("SELECT * FROM requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn requests_for_recipient(
        &self,
        email: &str,
    ) -> Result<Vec<RequestRow>, sqlx::Error> {
        // rowid breaks created_at ties in insertion order; the timestamp
        // alone only has second resolution.
        sqlx::query_as::<_, RequestRow>(
            "SELECT * FROM requests WHERE to_email = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn requests_for_sender(
        &self,
        user_id: &str,
    ) -> Result<Vec<RequestRow>, sqlx::Error> {
        sqlx::query_as::<_, RequestRow>(
            "SELECT * FROM requests WHERE from_user_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Recipient-only, one-way status change. The WHERE clause carries the
    /// whole policy: the row must be addressed to the caller and still
    /// pending. Returns whether a row actually changed.
    pub async fn update_request_status(
        &self,
        id: &str,
        recipient_email: &str,
        status: RequestStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE requests SET status = ? WHERE id = ? AND to_email = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(id)
        .bind(recipient_email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // Contact operations
    pub async fn upsert_contact(
        &self,
        owner_user_id: &str,
        contact_email: &str,
        contact_name: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO contacts (owner_user_id, contact_email, contact_name)
            VALUES (?, ?, ?)
            ON CONFLICT(owner_user_id, contact_email) DO UPDATE SET
                contact_name = excluded.contact_name,
                times_used = times_used + 1,
                last_used_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(owner_user_id)
        .bind(contact_email)
        .bind(contact_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn top_contacts(
        &self,
        owner_user_id: &str,
        limit: i64,
    ) -> Result<Vec<Contact>, sqlx::Error> {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT owner_user_id, contact_email, contact_name, times_used, last_used_at
            FROM contacts
            WHERE owner_user_id = ?
            ORDER BY last_used_at DESC
            LIMIT ?
            "#,
        )
        .bind(owner_user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn seed_user(db: &Database, email: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&User {
            id: id.clone(),
            email: email.to_string(),
            display_name: None,
            password_hash: "hash".to_string(),
            created_at: None,
        })
        .await
        .unwrap();
        id
    }

    fn row(from_user_id: &str, to_email: &str) -> RequestRow {
        RequestRow {
            id: Uuid::new_v4().to_string(),
            from_user_id: from_user_id.to_string(),
            from_name: Some("Ada".to_string()),
            from_email: Some("ada@x.com".to_string()),
            to_name: Some("Ben".to_string()),
            to_email: to_email.to_string(),
            date: "2024-01-01".to_string(),
            start_time: "10:00".to_string(),
            duration_minutes: 30,
            place: "Cafe".to_string(),
            note: None,
            status: "pending".to_string(),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn insert_starts_pending() {
        let db = Database::in_memory().await.unwrap();
        let sender = seed_user(&db, "ada@x.com").await;

        let r = row(&sender, "b@x.com");
        db.create_request(&r).await.unwrap();

        let rows = db.requests_for_recipient("b@x.com").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "pending");
        assert!(rows[0].created_at.is_some());
    }

    #[tokio::test]
    async fn reads_are_newest_first_even_within_one_second() {
        let db = Database::in_memory().await.unwrap();
        let sender = seed_user(&db, "ada@x.com").await;

        // All inserts land within the same CURRENT_TIMESTAMP second, so the
        // ordering has to come from the tie-break.
        let mut ids = Vec::new();
        for _ in 0..10 {
            let r = row(&sender, "b@x.com");
            db.create_request(&r).await.unwrap();
            ids.push(r.id);
        }
        ids.reverse();

        let inbox: Vec<String> = db
            .requests_for_recipient("b@x.com")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(inbox, ids);

        let sent: Vec<String> = db
            .requests_for_sender(&sender)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(sent, ids);
    }

    #[tokio::test]
    async fn recipient_filter_only_matches_to_email() {
        let db = Database::in_memory().await.unwrap();
        let sender = seed_user(&db, "ada@x.com").await;

        db.create_request(&row(&sender, "b@x.com")).await.unwrap();
        db.create_request(&row(&sender, "c@x.com")).await.unwrap();

        let rows = db.requests_for_recipient("b@x.com").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].to_email, "b@x.com");
    }

    #[tokio::test]
    async fn sender_view_keys_on_user_id() {
        let db = Database::in_memory().await.unwrap();
        let ada = seed_user(&db, "ada@x.com").await;
        let eve = seed_user(&db, "eve@x.com").await;

        db.create_request(&row(&ada, "b@x.com")).await.unwrap();
        db.create_request(&row(&eve, "b@x.com")).await.unwrap();

        let rows = db.requests_for_sender(&ada).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].from_user_id, ada);
    }

    #[tokio::test]
    async fn status_moves_once_and_only_for_recipient() {
        let db = Database::in_memory().await.unwrap();
        let sender = seed_user(&db, "ada@x.com").await;
        let r = row(&sender, "b@x.com");
        db.create_request(&r).await.unwrap();

        // Wrong recipient: no-op
        let changed = db
            .update_request_status(&r.id, "mallory@x.com", RequestStatus::Accepted)
            .await
            .unwrap();
        assert!(!changed);

        // Recipient accepts
        let changed = db
            .update_request_status(&r.id, "b@x.com", RequestStatus::Accepted)
            .await
            .unwrap();
        assert!(changed);

        // Terminal state: further updates are no-ops
        let changed = db
            .update_request_status(&r.id, "b@x.com", RequestStatus::Rejected)
            .await
            .unwrap();
        assert!(!changed);

        let stored = db.get_request(&r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "accepted");
    }

    #[tokio::test]
    async fn contact_upsert_bumps_usage() {
        let db = Database::in_memory().await.unwrap();
        let owner = seed_user(&db, "ada@x.com").await;

        db.upsert_contact(&owner, "b@x.com", Some("Ben")).await.unwrap();
        db.upsert_contact(&owner, "b@x.com", Some("Benjamin"))
            .await
            .unwrap();
        db.upsert_contact(&owner, "c@x.com", None).await.unwrap();

        let contacts = db.top_contacts(&owner, 10).await.unwrap();
        assert_eq!(contacts.len(), 2);

        let ben = contacts
            .iter()
            .find(|c| c.contact_email == "b@x.com")
            .unwrap();
        assert_eq!(ben.times_used, 2);
        assert_eq!(ben.contact_name.as_deref(), Some("Benjamin"));
    }
}
