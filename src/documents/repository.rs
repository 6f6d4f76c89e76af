//! documents table queries.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::model::{
    Document, DocumentListing, DocumentStatus, NewDocument, StorageDescriptor,
};
use crate::store::StoreResult;

/// Listing cap
pub const MAX_LISTING: usize = 200;

const DOCUMENT_COLUMNS: &str = "d.id, d.title, d.course_code, d.year, d.term, d.kind, d.notes,
     d.file_name, d.storage, d.storage_key, d.content_type, d.status, d.uploader_id, d.created_at";

fn parse_column<T: std::str::FromStr<Err = String>>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        course_code: row.get(2)?,
        year: row.get(3)?,
        term: row.get(4)?,
        kind: parse_column(row, 5)?,
        notes: row.get(6)?,
        file_name: row.get(7)?,
        storage: StorageDescriptor {
            kind: parse_column(row, 8)?,
            key: row.get(9)?,
        },
        content_type: row.get(10)?,
        status: parse_column(row, 11)?,
        uploader_id: row.get(12)?,
        created_at: row.get(13)?,
    })
}

/// Insert a new document in the `pending` state.
pub fn insert_document(conn: &Connection, doc: &NewDocument) -> StoreResult<Document> {
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO documents
         (title, course_code, year, term, kind, notes, file_name, storage, storage_key,
          content_type, status, uploader_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'pending', ?11, ?12)",
        params![
            doc.title,
            doc.course_code,
            doc.year,
            doc.term,
            doc.kind.as_str(),
            doc.notes,
            doc.file_name,
            doc.storage.kind.as_str(),
            doc.storage.key,
            doc.content_type,
            doc.uploader_id,
            created_at,
        ],
    )?;

    Ok(Document {
        id: conn.last_insert_rowid(),
        title: doc.title.clone(),
        course_code: doc.course_code.clone(),
        year: doc.year.clone(),
        term: doc.term.clone(),
        kind: doc.kind,
        notes: doc.notes.clone(),
        file_name: doc.file_name.clone(),
        storage: doc.storage.clone(),
        content_type: doc.content_type.clone(),
        status: DocumentStatus::Pending,
        uploader_id: doc.uploader_id,
        created_at,
    })
}

/// Get a document by id.
pub fn get_document(conn: &Connection, id: i64) -> StoreResult<Option<Document>> {
    let sql = format!("SELECT {} FROM documents d WHERE d.id = ?1", DOCUMENT_COLUMNS);
    Ok(conn.query_row(&sql, params![id], document_from_row).optional()?)
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentListing> {
    Ok(DocumentListing {
        document: document_from_row(row)?,
        uploader_email: row.get(14)?,
    })
}

/// Get a document together with its uploader's email.
pub fn get_listing(conn: &Connection, id: i64) -> StoreResult<Option<DocumentListing>> {
    let sql = format!(
        "SELECT {}, u.email FROM documents d JOIN users u ON u.id = d.uploader_id WHERE d.id = ?1",
        DOCUMENT_COLUMNS
    );
    Ok(conn.query_row(&sql, params![id], listing_from_row).optional()?)
}

/// Newest-first listing, optionally restricted to one status.
pub fn list_documents(
    conn: &Connection,
    status: Option<DocumentStatus>,
    limit: usize,
) -> StoreResult<Vec<DocumentListing>> {
    let sql = format!(
        "SELECT {}, u.email
         FROM documents d JOIN users u ON u.id = d.uploader_id
         WHERE (?1 IS NULL OR d.status = ?1)
         ORDER BY d.created_at DESC, d.id DESC
         LIMIT ?2",
        DOCUMENT_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;

    let rows = stmt.query_map(
        params![status.map(|s| s.as_str()), limit.min(MAX_LISTING) as i64],
        listing_from_row,
    )?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

/// Overwrite the moderation status. Returns `false` if the document does not exist.
pub fn update_status(conn: &Connection, id: i64, status: DocumentStatus) -> StoreResult<bool> {
    let changed = conn.execute(
        "UPDATE documents SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(changed == 1)
}

/// Delete a document; ledger and audit rows cascade. Returns `false` if absent.
pub fn delete_document(conn: &Connection, id: i64) -> StoreResult<bool> {
    let changed = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
    Ok(changed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::model::{DocumentKind, StorageKind};
    use crate::store::Database;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Database, i64) {
        let temp = TempDir::new().unwrap();
        let db = Database::open(temp.path().join("docs.db")).unwrap();
        let uploader = db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO users (email, password_hash, created_at) VALUES ('up@x.io', 'h', ?1)",
                    params![Utc::now()],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .unwrap();
        (temp, db, uploader)
    }

    fn new_doc(uploader_id: i64, title: &str) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            course_code: "MATH200".to_string(),
            year: Some("2022".to_string()),
            term: Some("Fall".to_string()),
            kind: DocumentKind::Solution,
            notes: None,
            file_name: format!("{}.pdf", title),
            storage: StorageDescriptor {
                kind: StorageKind::Local,
                key: format!("{}.pdf", title),
            },
            content_type: "application/pdf".to_string(),
            uploader_id,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let (_temp, db, uploader) = setup();

        let inserted = db
            .with_conn(|conn| insert_document(conn, &new_doc(uploader, "calc")))
            .unwrap();
        assert_eq!(inserted.status, DocumentStatus::Pending);

        let loaded = db.with_conn(|conn| get_document(conn, inserted.id)).unwrap().unwrap();
        assert_eq!(loaded.title, "calc");
        assert_eq!(loaded.kind, DocumentKind::Solution);
        assert_eq!(loaded.storage.kind, StorageKind::Local);
        assert_eq!(loaded.term.as_deref(), Some("Fall"));

        assert!(db.with_conn(|conn| get_document(conn, 999)).unwrap().is_none());
    }

    #[test]
    fn test_list_filters_by_status_newest_first() {
        let (_temp, db, uploader) = setup();

        let first = db.with_conn(|conn| insert_document(conn, &new_doc(uploader, "one"))).unwrap();
        let second = db.with_conn(|conn| insert_document(conn, &new_doc(uploader, "two"))).unwrap();
        db.with_conn(|conn| update_status(conn, first.id, DocumentStatus::Approved))
            .unwrap();

        let approved = db
            .with_conn(|conn| list_documents(conn, Some(DocumentStatus::Approved), MAX_LISTING))
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].document.id, first.id);
        assert_eq!(approved[0].uploader_email, "up@x.io");

        let all = db.with_conn(|conn| list_documents(conn, None, MAX_LISTING)).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].document.id, second.id);
    }

    #[test]
    fn test_update_and_delete_unknown() {
        let (_temp, db, _) = setup();
        assert!(!db
            .with_conn(|conn| update_status(conn, 42, DocumentStatus::Approved))
            .unwrap());
        assert!(!db.with_conn(|conn| delete_document(conn, 42)).unwrap());
    }
}
