//! Route CRUD operations against the doc_routes table
//!
//! Lookups treat the identifier as untrusted input: every query binds
//! parameters, nothing is interpolated into SQL text.

use crate::storage::ConnectionManager;
use crate::{DocumentRoute, Error, Result};
use rusqlite::{params, Connection, OptionalExtension};

const ROUTE_COLUMNS: &str = "name, revision, client_guid, client_projno, client_docno, \
                             contractor_guid, contractor_projno, contractor_docno";

/// CRUD access to the routing table over a borrowed connection manager.
///
/// Single-threaded by contract: the manager's shared handle serves the
/// administrative and read paths only.
pub struct RouteStore<'a> {
    manager: &'a mut ConnectionManager,
}

impl<'a> RouteStore<'a> {
    pub fn new(manager: &'a mut ConnectionManager) -> Self {
        Self { manager }
    }

    fn live(&mut self) -> Result<&Connection> {
        self.manager.ensure_live(super::TIMEOUT_ATTEMPTS)?;
        self.manager.connection()
    }

    /// Count all routes
    pub fn count_rows(&mut self) -> Result<u64> {
        let conn = self.live()?;
        let count: i64 = conn.query_row("SELECT count(*) FROM doc_routes", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Look up the route known under `uuid` on either side.
    ///
    /// Returns [`Error::NotFound`] when no row matches.
    pub fn find_by_uuid(&mut self, uuid: &str) -> Result<DocumentRoute> {
        let conn = self.live()?;
        let sql = format!(
            "SELECT {ROUTE_COLUMNS} FROM doc_routes \
             WHERE client_guid = ?1 OR contractor_guid = ?1"
        );
        conn.query_row(&sql, params![uuid], row_to_route)
            .optional()?
            .ok_or_else(|| Error::NotFound(uuid.to_string()))
    }

    /// Delete every route, returning the number of rows removed
    pub fn delete_all(&mut self) -> Result<u64> {
        let conn = self.live()?;
        let deleted = conn.execute("DELETE FROM doc_routes", [])?;
        Ok(deleted as u64)
    }

    /// Insert a single route.
    ///
    /// A duplicate `(name, revision)` pair fails with a constraint
    /// violation; existing rows are never overwritten.
    pub fn insert(&mut self, route: &DocumentRoute) -> Result<()> {
        let conn = self.live()?;
        insert_route(conn, route)?;
        Ok(())
    }
}

/// Parameterized insert, shared with the loader workers
pub(crate) fn insert_route(conn: &Connection, route: &DocumentRoute) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO doc_routes (name, revision, client_guid, client_projno, client_docno, \
         contractor_guid, contractor_projno, contractor_docno) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            route.name,
            route.revision,
            route.client_uuid,
            route.client_projno,
            route.client_docno,
            route.contractor_uuid,
            route.contractor_projno,
            route.contractor_docno,
        ],
    )
}

/// Helper to convert a row to a DocumentRoute
fn row_to_route(row: &rusqlite::Row) -> rusqlite::Result<DocumentRoute> {
    Ok(DocumentRoute {
        name: row.get(0)?,
        revision: row.get(1)?,
        client_uuid: row.get(2)?,
        client_projno: row.get(3)?,
        client_docno: row.get(4)?,
        contractor_uuid: row.get(5)?,
        contractor_projno: row.get(6)?,
        contractor_docno: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SchemaAdmin;
    use rusqlite::ErrorCode;

    fn open_store(dir: &tempfile::TempDir) -> ConnectionManager {
        let mut manager = ConnectionManager::new(dir.path().join("routes.db"));
        SchemaAdmin::new(&mut manager).init_schema().unwrap();
        manager
    }

    #[test]
    fn test_bidirectional_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open_store(&dir);
        let mut store = RouteStore::new(&mut manager);

        let route = DocumentRoute::new(
            "spec-sheet",
            "B02",
            "c-1111",
            12345,
            7,
            "k-2222",
            543321,
            7,
        );
        store.insert(&route).unwrap();

        let by_client = store.find_by_uuid("c-1111").unwrap();
        let by_contractor = store.find_by_uuid("k-2222").unwrap();
        assert_eq!(by_client, route);
        assert_eq!(by_contractor, route);
    }

    #[test]
    fn test_find_missing_uuid_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open_store(&dir);
        let mut store = RouteStore::new(&mut manager);

        match store.find_by_uuid("nope") {
            Err(Error::NotFound(uuid)) => assert_eq!(uuid, "nope"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_name_revision_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open_store(&dir);
        let mut store = RouteStore::new(&mut manager);

        let first = DocumentRoute::synthetic(3);
        let mut second = DocumentRoute::synthetic(3);
        second.client_uuid = "different".to_string();

        store.insert(&first).unwrap();
        match store.insert(&second) {
            Err(Error::Storage(rusqlite::Error::SqliteFailure(err, _))) => {
                assert_eq!(err.code, ErrorCode::ConstraintViolation);
            }
            other => panic!("expected constraint violation, got {other:?}"),
        }

        // Exactly one row persisted, and it is the original
        assert_eq!(store.count_rows().unwrap(), 1);
        let kept = store.find_by_uuid(&first.client_uuid).unwrap();
        assert_eq!(kept, first);
    }

    #[test]
    fn test_delete_all_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = open_store(&dir);
        let mut store = RouteStore::new(&mut manager);

        for i in 0..5 {
            store.insert(&DocumentRoute::synthetic(i)).unwrap();
        }
        assert_eq!(store.delete_all().unwrap(), 5);
        assert_eq!(store.count_rows().unwrap(), 0);
        assert_eq!(store.delete_all().unwrap(), 0);
    }
}
