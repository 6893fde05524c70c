//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::contacts::{Contact, PhoneNumber};
use crate::error::DatabaseError;
use crate::snapshot::Snapshot;
use crate::store::migrations;
use crate::store::traits::{Database, User};

/// Key of the single snapshot row.
const CURRENT_SNAPSHOT_KEY: &str = "latest";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
/// Unparseable input is an error; there is no fallback value.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    // RFC 3339 is our canonical write format
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // SQLite datetime() output, with and without fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(ndt.and_utc());
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(ndt.and_utc());
    }
    Err(DatabaseError::Serialization(format!(
        "invalid timestamp '{s}'"
    )))
}

/// Canonical timestamp format: RFC 3339 with microseconds, always UTC, so
/// stored values also sort lexically.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn query_err(op: &str) -> impl Fn(libsql::Error) -> DatabaseError + '_ {
    move |e| DatabaseError::Query(format!("{op}: {e}"))
}

/// Map a libsql Row to a User.
///
/// Column order matches USER_COLUMNS: 0:id, 1:channel, 2:joined_at
fn row_to_user(row: &libsql::Row) -> Result<User, DatabaseError> {
    let joined_str: String = row.get(2).map_err(query_err("row_to_user"))?;
    Ok(User {
        id: row.get(0).map_err(query_err("row_to_user"))?,
        channel: row.get(1).map_err(query_err("row_to_user"))?,
        joined_at: parse_datetime(&joined_str)?,
    })
}

/// Map a libsql Row to a Contact.
///
/// Column order matches CONTACT_COLUMNS:
/// 0:id, 1:name, 2:phone, 3:submitted_by, 4:created_at
fn row_to_contact(row: &libsql::Row) -> Result<Contact, DatabaseError> {
    let id_str: String = row.get(0).map_err(query_err("row_to_contact"))?;
    let phone_str: String = row.get(2).map_err(query_err("row_to_contact"))?;
    let created_str: String = row.get(4).map_err(query_err("row_to_contact"))?;

    Ok(Contact {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("contact id '{id_str}': {e}")))?,
        name: row.get(1).map_err(query_err("row_to_contact"))?,
        phone: PhoneNumber::parse(&phone_str)
            .map_err(|e| DatabaseError::Serialization(format!("contact {id_str}: {e}")))?,
        submitted_by: row.get(3).map_err(query_err("row_to_contact"))?,
        created_at: parse_datetime(&created_str)?,
    })
}

/// Map a libsql Row to a Snapshot.
///
/// Column order matches SNAPSHOT_COLUMNS:
/// 0:generated_at, 1:artifact_location, 2:contact_count
fn row_to_snapshot(row: &libsql::Row) -> Result<Snapshot, DatabaseError> {
    let generated_str: String = row.get(0).map_err(query_err("row_to_snapshot"))?;
    let count: i64 = row.get(2).map_err(query_err("row_to_snapshot"))?;
    Ok(Snapshot {
        generated_at: parse_datetime(&generated_str)?,
        artifact_location: row.get(1).map_err(query_err("row_to_snapshot"))?,
        contact_count: u64::try_from(count).unwrap_or(0),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const USER_COLUMNS: &str = "id, channel, joined_at";

const CONTACT_COLUMNS: &str = "id, name, phone, submitted_by, created_at";

const SNAPSHOT_COLUMNS: &str = "generated_at, artifact_location, contact_count";

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn register_user(
        &self,
        user_id: &str,
        channel: &str,
        now: DateTime<Utc>,
    ) -> Result<User, DatabaseError> {
        let conn = self.conn();
        let inserted = conn
            .execute(
                "INSERT INTO users (id, channel, joined_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (id) DO NOTHING",
                params![user_id, channel, format_datetime(&now)],
            )
            .await
            .map_err(query_err("register_user"))?;

        if inserted > 0 {
            info!(user_id, channel, "Registered new user");
        }

        self.get_user(user_id).await?.ok_or_else(|| {
            DatabaseError::Query(format!("register_user: user {user_id} missing after insert"))
        })
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![user_id],
            )
            .await
            .map_err(query_err("get_user"))?;

        match rows.next().await.map_err(query_err("get_user"))? {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    // ── Contacts ────────────────────────────────────────────────────

    async fn insert_contact(&self, contact: &Contact) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            &format!("INSERT INTO contacts ({CONTACT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
            params![
                contact.id.to_string(),
                contact.name.as_str(),
                contact.phone.as_str(),
                contact.submitted_by.as_str(),
                format_datetime(&contact.created_at)
            ],
        )
        .await
        .map_err(query_err("insert_contact"))?;

        debug!(contact_id = %contact.id, user_id = %contact.submitted_by, "Contact inserted");
        Ok(())
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY rowid"),
                (),
            )
            .await
            .map_err(query_err("list_contacts"))?;

        let mut contacts = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err("list_contacts"))? {
            contacts.push(row_to_contact(&row)?);
        }
        Ok(contacts)
    }

    async fn count_contacts_by(&self, user_id: &str) -> Result<u64, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM contacts WHERE submitted_by = ?1",
                params![user_id],
            )
            .await
            .map_err(query_err("count_contacts_by"))?;

        match rows.next().await.map_err(query_err("count_contacts_by"))? {
            Some(row) => {
                let count: i64 = row.get(0).map_err(query_err("count_contacts_by"))?;
                Ok(u64::try_from(count).unwrap_or(0))
            }
            None => Ok(0),
        }
    }

    // ── Snapshot ────────────────────────────────────────────────────

    async fn get_snapshot(&self) -> Result<Option<Snapshot>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE key = ?1"),
                params![CURRENT_SNAPSHOT_KEY],
            )
            .await
            .map_err(query_err("get_snapshot"))?;

        match rows.next().await.map_err(query_err("get_snapshot"))? {
            Some(row) => Ok(Some(row_to_snapshot(&row)?)),
            None => Ok(None),
        }
    }

    async fn set_snapshot(&self, snapshot: &Snapshot) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let count = i64::try_from(snapshot.contact_count).unwrap_or(i64::MAX);
        conn.execute(
            "INSERT INTO snapshots (key, generated_at, artifact_location, contact_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (key) DO UPDATE SET
                generated_at = ?2, artifact_location = ?3, contact_count = ?4",
            params![
                CURRENT_SNAPSHOT_KEY,
                format_datetime(&snapshot.generated_at),
                snapshot.artifact_location.as_str(),
                count
            ],
        )
        .await
        .map_err(query_err("set_snapshot"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::contacts::NewContact;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn make_contact(name: &str, phone: &str, user: &str, created_at: DateTime<Utc>) -> Contact {
        Contact::from_new(
            NewContact {
                name: name.into(),
                phone: PhoneNumber::parse(phone).unwrap(),
                submitted_by: user.into(),
            },
            created_at,
        )
    }

    // ── Users ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn register_user_creates_once() {
        let db = test_db().await;

        let first = db.register_user("U1", "telegram", at(1, 9)).await.unwrap();
        assert_eq!(first.id, "U1");
        assert_eq!(first.channel, "telegram");
        assert_eq!(first.joined_at, at(1, 9));

        // A later registration must not move joined_at.
        let again = db.register_user("U1", "cli", at(20, 9)).await.unwrap();
        assert_eq!(again, first);
    }

    #[tokio::test]
    async fn get_user_not_found() {
        let db = test_db().await;
        assert!(db.get_user("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn joined_at_keeps_sub_second_precision() {
        let db = test_db().await;
        let t = at(1, 9) + Duration::microseconds(123_456);
        let user = db.register_user("U1", "cli", t).await.unwrap();
        assert_eq!(user.joined_at, t);
    }

    // ── Contacts ────────────────────────────────────────────────────

    #[tokio::test]
    async fn insert_and_list_contacts_in_order() {
        let db = test_db().await;
        let a = make_contact("Alice", "+8801712345678", "U1", at(2, 0));
        let b = make_contact("Bob", "+4915112345678", "U3", at(1, 0));
        db.insert_contact(&a).await.unwrap();
        db.insert_contact(&b).await.unwrap();

        let contacts = db.list_contacts().await.unwrap();
        // Insertion order, not created_at order.
        assert_eq!(contacts, vec![a, b]);
    }

    #[tokio::test]
    async fn list_contacts_empty() {
        let db = test_db().await;
        assert!(db.list_contacts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn count_contacts_by_user() {
        let db = test_db().await;
        db.insert_contact(&make_contact("A", "+1111111", "U1", at(1, 0)))
            .await
            .unwrap();
        db.insert_contact(&make_contact("B", "+2222222", "U1", at(1, 1)))
            .await
            .unwrap();
        db.insert_contact(&make_contact("C", "+3333333", "U2", at(1, 2)))
            .await
            .unwrap();

        assert_eq!(db.count_contacts_by("U1").await.unwrap(), 2);
        assert_eq!(db.count_contacts_by("U2").await.unwrap(), 1);
        assert_eq!(db.count_contacts_by("U3").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_phone_numbers_are_kept() {
        let db = test_db().await;
        db.insert_contact(&make_contact("A", "+1111111", "U1", at(1, 0)))
            .await
            .unwrap();
        db.insert_contact(&make_contact("A again", "+1111111", "U2", at(1, 1)))
            .await
            .unwrap();
        assert_eq!(db.list_contacts().await.unwrap().len(), 2);
    }

    // ── Snapshot ────────────────────────────────────────────────────

    #[tokio::test]
    async fn snapshot_absent_initially() {
        let db = test_db().await;
        assert!(db.get_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_snapshot_overwrites() {
        let db = test_db().await;
        let first = Snapshot {
            generated_at: at(1, 0),
            artifact_location: "https://example.com/vcf/master_contacts.vcf".into(),
            contact_count: 3,
        };
        db.set_snapshot(&first).await.unwrap();
        assert_eq!(db.get_snapshot().await.unwrap(), Some(first));

        let second = Snapshot {
            generated_at: at(31, 0),
            artifact_location: "https://example.com/vcf/master_contacts.vcf".into(),
            contact_count: 5,
        };
        db.set_snapshot(&second).await.unwrap();
        assert_eq!(db.get_snapshot().await.unwrap(), Some(second));
    }

    // ── Timestamp parsing ───────────────────────────────────────────

    #[test]
    fn parse_datetime_formats() {
        assert_eq!(
            parse_datetime("2025-03-01T09:00:00Z").unwrap(),
            at(1, 9)
        );
        assert_eq!(
            parse_datetime("2025-03-01T10:00:00+01:00").unwrap(),
            at(1, 9)
        );
        assert_eq!(parse_datetime("2025-03-01 09:00:00").unwrap(), at(1, 9));
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn format_roundtrips_through_parse() {
        let t = at(1, 9) + Duration::microseconds(42);
        assert_eq!(parse_datetime(&format_datetime(&t)).unwrap(), t);
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("vcf-bot.db");

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.register_user("U1", "telegram", at(1, 9)).await.unwrap();
        }

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let user = db.get_user("U1").await.unwrap().unwrap();
        assert_eq!(user.joined_at, at(1, 9));
    }
}
