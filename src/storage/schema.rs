//! Database schema definitions and administration

use crate::storage::ConnectionManager;
use crate::Result;

/// SQL to create the routes table
pub const CREATE_ROUTES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS doc_routes (
    name TEXT NOT NULL,
    revision TEXT NOT NULL,
    client_guid TEXT NOT NULL,
    client_projno INTEGER NOT NULL,
    client_docno INTEGER NOT NULL,
    contractor_guid TEXT NOT NULL,
    contractor_projno INTEGER NOT NULL,
    contractor_docno INTEGER NOT NULL,
    CONSTRAINT name_rev UNIQUE(name, revision)
)
"#;

/// SQL to create the two UUID lookup indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_routes_client_guid ON doc_routes(client_guid)",
    "CREATE INDEX IF NOT EXISTS idx_routes_contractor_guid ON doc_routes(contractor_guid)",
];

/// SQL to drop the routes table
pub const DROP_ROUTES_TABLE: &str = "DROP TABLE IF EXISTS doc_routes";

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_ROUTES_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// Thin DDL layer over a borrowed connection manager.
///
/// Schema creation is idempotent-by-intent: rerunning against an existing
/// schema is expected to no-op, and individual DDL failures are logged
/// rather than propagated. Only connection-establishment failures surface.
pub struct SchemaAdmin<'a> {
    manager: &'a mut ConnectionManager,
}

impl<'a> SchemaAdmin<'a> {
    pub fn new(manager: &'a mut ConnectionManager) -> Self {
        Self { manager }
    }

    /// Create the table and its two UUID indexes
    pub fn init_schema(&mut self) -> Result<()> {
        self.manager.ensure_live(super::TIMEOUT_ATTEMPTS)?;
        let conn = self.manager.connection()?;
        for stmt in all_schema_statements() {
            if let Err(err) = conn.execute(stmt, []) {
                tracing::warn!(error = %err, "schema statement failed");
            }
        }
        Ok(())
    }

    /// Drop the table (ignoring absence) and recreate it
    pub fn reset_schema(&mut self) -> Result<()> {
        self.manager.ensure_live(super::TIMEOUT_ATTEMPTS)?;
        let conn = self.manager.connection()?;
        if let Err(err) = conn.execute(DROP_ROUTES_TABLE, []) {
            tracing::warn!(error = %err, "drop table failed");
        }
        self.init_schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RouteStore;
    use crate::DocumentRoute;

    #[test]
    fn test_init_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ConnectionManager::new(dir.path().join("routes.db"));

        SchemaAdmin::new(&mut manager).init_schema().unwrap();
        SchemaAdmin::new(&mut manager).init_schema().unwrap();

        let mut store = RouteStore::new(&mut manager);
        assert_eq!(store.count_rows().unwrap(), 0);
    }

    #[test]
    fn test_reset_schema_twice_leaves_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ConnectionManager::new(dir.path().join("routes.db"));

        SchemaAdmin::new(&mut manager).init_schema().unwrap();
        RouteStore::new(&mut manager)
            .insert(&DocumentRoute::synthetic(0))
            .unwrap();

        SchemaAdmin::new(&mut manager).reset_schema().unwrap();
        SchemaAdmin::new(&mut manager).reset_schema().unwrap();

        let mut store = RouteStore::new(&mut manager);
        assert_eq!(store.count_rows().unwrap(), 0);

        // Constraints survive the reset: duplicate (name, revision) still rejected
        store.insert(&DocumentRoute::synthetic(1)).unwrap();
        assert!(store.insert(&DocumentRoute::synthetic(1)).is_err());
    }
}
