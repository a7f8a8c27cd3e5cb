//! Embedded SQLite persistence for nodes and edges

use rusqlite::{params, Connection, OptionalExtension, Row};
use sharpitect_core::model::{ArchLevel, DeclarationNode, EdgeKind, NodeKind, RelationshipEdge};
use sharpitect_core::{Result, SharpitectError};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Single-file graph store. Writes serialise through the connection mutex;
/// batch operations run inside one transaction.
pub struct GraphRepository {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for GraphRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphRepository").field("path", &self.path).finish()
    }
}

fn storage(e: rusqlite::Error) -> SharpitectError {
    SharpitectError::storage(e)
}

impl GraphRepository {
    /// Open (creating if needed) the store and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path).map_err(storage)?;
        let repo = GraphRepository {
            path,
            conn: Mutex::new(conn),
        };
        repo.init()?;
        tracing::debug!("opened graph store at {}", repo.path.display());
        Ok(repo)
    }

    /// An in-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        let repo = GraphRepository {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        };
        repo.init()?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init(&self) -> Result<()> {
        let conn = self.conn.lock().expect("repository mutex");
        // cascade deletes depend on foreign keys being enforced
        conn.execute_batch(
            "PRAGMA foreign_keys=ON;
             PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )
        .map_err(storage)?;

        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                kind INTEGER NOT NULL,
                file_path TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                start_column INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                end_column INTEGER NOT NULL,
                arch_level INTEGER NOT NULL DEFAULT 0,
                arch_description TEXT,
                metadata TEXT
            );

            CREATE TABLE IF NOT EXISTS edges (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
                target_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
                kind INTEGER NOT NULL,
                source_file_path TEXT,
                source_line INTEGER,
                metadata TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind);
            CREATE INDEX IF NOT EXISTS idx_nodes_file_path ON nodes(file_path);
            CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name);
            CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);
            CREATE INDEX IF NOT EXISTS idx_edges_kind ON edges(kind);
            CREATE INDEX IF NOT EXISTS idx_edges_source_kind ON edges(source_id, kind);
            CREATE INDEX IF NOT EXISTS idx_edges_target_kind ON edges(target_id, kind);
            COMMIT;",
        )
        .map_err(storage)?;
        Ok(())
    }

    // ── Writes ──────────────────────────────────────────────────────────

    pub fn upsert_node(&self, node: &DeclarationNode) -> Result<()> {
        self.upsert_nodes(std::slice::from_ref(node))
    }

    /// Batch upsert inside one transaction. Re-analysis of the same id
    /// replaces the entire row.
    pub fn upsert_nodes(&self, nodes: &[DeclarationNode]) -> Result<()> {
        let mut conn = self.conn.lock().expect("repository mutex");
        let tx = conn.transaction().map_err(storage)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO nodes (id, name, kind, file_path, start_line, start_column,
                                        end_line, end_column, arch_level, arch_description, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT(id) DO UPDATE SET
                        name=excluded.name,
                        kind=excluded.kind,
                        file_path=excluded.file_path,
                        start_line=excluded.start_line,
                        start_column=excluded.start_column,
                        end_line=excluded.end_line,
                        end_column=excluded.end_column,
                        arch_level=excluded.arch_level,
                        arch_description=excluded.arch_description,
                        metadata=excluded.metadata",
                )
                .map_err(storage)?;
            for node in nodes {
                stmt.execute(params![
                    node.id,
                    node.name,
                    node.kind.as_i64(),
                    node.file_path,
                    node.start_line,
                    node.start_column,
                    node.end_line,
                    node.end_column,
                    node.arch_level.as_i64(),
                    node.arch_description,
                    node.metadata,
                ])
                .map_err(storage)?;
            }
        }
        tx.commit().map_err(storage)
    }

    pub fn upsert_edge(&self, edge: &RelationshipEdge) -> Result<()> {
        self.upsert_edges(std::slice::from_ref(edge))
    }

    pub fn upsert_edges(&self, edges: &[RelationshipEdge]) -> Result<()> {
        let mut conn = self.conn.lock().expect("repository mutex");
        let tx = conn.transaction().map_err(storage)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO edges (id, source_id, target_id, kind, source_file_path, source_line, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(id) DO UPDATE SET
                        source_id=excluded.source_id,
                        target_id=excluded.target_id,
                        kind=excluded.kind,
                        source_file_path=excluded.source_file_path,
                        source_line=excluded.source_line,
                        metadata=excluded.metadata",
                )
                .map_err(storage)?;
            for edge in edges {
                stmt.execute(params![
                    edge.id,
                    edge.source_id,
                    edge.target_id,
                    edge.kind.as_i64(),
                    edge.source_file_path,
                    edge.source_line,
                    edge.metadata,
                ])
                .map_err(storage)?;
            }
        }
        tx.commit().map_err(storage)
    }

    pub fn delete_node(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("repository mutex");
        let affected = conn
            .execute("DELETE FROM nodes WHERE id = ?1", params![id])
            .map_err(storage)?;
        Ok(affected > 0)
    }

    /// Delete a batch of nodes in one transaction; incident edges cascade.
    pub fn delete_nodes(&self, ids: &[String]) -> Result<usize> {
        let mut conn = self.conn.lock().expect("repository mutex");
        let tx = conn.transaction().map_err(storage)?;
        let mut deleted = 0;
        {
            let mut stmt = tx
                .prepare_cached("DELETE FROM nodes WHERE id = ?1")
                .map_err(storage)?;
            for id in ids {
                deleted += stmt.execute(params![id]).map_err(storage)?;
            }
        }
        tx.commit().map_err(storage)?;
        Ok(deleted)
    }

    pub fn delete_nodes_by_file(&self, file_path: &str) -> Result<usize> {
        let conn = self.conn.lock().expect("repository mutex");
        conn.execute("DELETE FROM nodes WHERE file_path = ?1", params![file_path])
            .map_err(storage)
    }

    pub fn delete_edges_by_source_file(&self, file_path: &str) -> Result<usize> {
        let conn = self.conn.lock().expect("repository mutex");
        conn.execute(
            "DELETE FROM edges WHERE source_file_path = ?1",
            params![file_path],
        )
        .map_err(storage)
    }

    pub fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().expect("repository mutex");
        conn.execute_batch("DELETE FROM edges; DELETE FROM nodes;")
            .map_err(storage)
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub fn node(&self, id: &str) -> Result<Option<DeclarationNode>> {
        let conn = self.conn.lock().expect("repository mutex");
        conn.query_row(
            "SELECT id, name, kind, file_path, start_line, start_column, end_line, end_column,
                    arch_level, arch_description, metadata
             FROM nodes WHERE id = ?1",
            params![id],
            node_from_row,
        )
        .optional()
        .map_err(storage)
    }

    pub fn nodes_by_kind(&self, kind: NodeKind, limit: Option<usize>) -> Result<Vec<DeclarationNode>> {
        let conn = self.conn.lock().expect("repository mutex");
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, name, kind, file_path, start_line, start_column, end_line, end_column,
                        arch_level, arch_description, metadata
                 FROM nodes WHERE kind = ?1
                 ORDER BY file_path, start_line
                 LIMIT ?2",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![kind.as_i64(), sql_limit(limit)], node_from_row)
            .map_err(storage)?;
        collect_rows(rows)
    }

    pub fn nodes_by_file(&self, file_path: &str) -> Result<Vec<DeclarationNode>> {
        let conn = self.conn.lock().expect("repository mutex");
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, name, kind, file_path, start_line, start_column, end_line, end_column,
                        arch_level, arch_description, metadata
                 FROM nodes WHERE file_path = ?1
                 ORDER BY start_line, start_column",
            )
            .map_err(storage)?;
        let rows = stmt.query_map(params![file_path], node_from_row).map_err(storage)?;
        collect_rows(rows)
    }

    /// LIKE-based name search. `pattern` is a SQL LIKE pattern; the caller
    /// builds it from the match mode. Returns `(matches, total_count)`.
    pub fn search_nodes(
        &self,
        pattern: &str,
        kind: Option<NodeKind>,
        case_sensitive: bool,
        limit: usize,
    ) -> Result<(Vec<DeclarationNode>, usize)> {
        let conn = self.conn.lock().expect("repository mutex");
        // LIKE is case-insensitive for ASCII by default; flip with PRAGMA
        conn.execute_batch(if case_sensitive {
            "PRAGMA case_sensitive_like=ON;"
        } else {
            "PRAGMA case_sensitive_like=OFF;"
        })
        .map_err(storage)?;

        let kind_value = kind.map(|k| k.as_i64()).unwrap_or(-1);
        let total: usize = conn
            .query_row(
                "SELECT COUNT(*) FROM nodes WHERE name LIKE ?1 ESCAPE '\\' AND (?2 < 0 OR kind = ?2)",
                params![pattern, kind_value],
                |row| row.get::<_, i64>(0),
            )
            .map_err(storage)? as usize;

        let mut stmt = conn
            .prepare_cached(
                "SELECT id, name, kind, file_path, start_line, start_column, end_line, end_column,
                        arch_level, arch_description, metadata
                 FROM nodes WHERE name LIKE ?1 ESCAPE '\\' AND (?2 < 0 OR kind = ?2)
                 ORDER BY name, id
                 LIMIT ?3",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![pattern, kind_value, limit as i64], node_from_row)
            .map_err(storage)?;
        Ok((collect_rows(rows)?, total))
    }

    pub fn outgoing_edges(&self, source_id: &str, kind: Option<EdgeKind>, limit: Option<usize>) -> Result<Vec<RelationshipEdge>> {
        self.edges_for_endpoint("source_id", source_id, kind, limit)
    }

    pub fn incoming_edges(&self, target_id: &str, kind: Option<EdgeKind>, limit: Option<usize>) -> Result<Vec<RelationshipEdge>> {
        self.edges_for_endpoint("target_id", target_id, kind, limit)
    }

    fn edges_for_endpoint(
        &self,
        column: &str,
        id: &str,
        kind: Option<EdgeKind>,
        limit: Option<usize>,
    ) -> Result<Vec<RelationshipEdge>> {
        let conn = self.conn.lock().expect("repository mutex");
        let sql = format!(
            "SELECT id, source_id, target_id, kind, source_file_path, source_line, metadata
             FROM edges WHERE {column} = ?1 AND (?2 < 0 OR kind = ?2)
             LIMIT ?3"
        );
        let mut stmt = conn.prepare_cached(&sql).map_err(storage)?;
        let kind_value = kind.map(|k| k.as_i64()).unwrap_or(-1);
        let rows = stmt
            .query_map(params![id, kind_value, sql_limit(limit)], edge_from_row)
            .map_err(storage)?;
        collect_rows(rows)
    }

    pub fn edges_by_kind(&self, kind: EdgeKind, limit: Option<usize>) -> Result<Vec<RelationshipEdge>> {
        let conn = self.conn.lock().expect("repository mutex");
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, source_id, target_id, kind, source_file_path, source_line, metadata
                 FROM edges WHERE kind = ?1 LIMIT ?2",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![kind.as_i64(), sql_limit(limit)], edge_from_row)
            .map_err(storage)?;
        collect_rows(rows)
    }

    pub fn edges_by_source_file(&self, file_path: &str) -> Result<Vec<RelationshipEdge>> {
        let conn = self.conn.lock().expect("repository mutex");
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, source_id, target_id, kind, source_file_path, source_line, metadata
                 FROM edges WHERE source_file_path = ?1",
            )
            .map_err(storage)?;
        let rows = stmt.query_map(params![file_path], edge_from_row).map_err(storage)?;
        collect_rows(rows)
    }

    pub fn count_nodes(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("repository mutex");
        conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(storage)
    }

    pub fn count_edges(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("repository mutex");
        conn.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(storage)
    }

    pub fn count_nodes_by_kind(&self) -> Result<Vec<(NodeKind, usize)>> {
        let conn = self.conn.lock().expect("repository mutex");
        let mut stmt = conn
            .prepare_cached("SELECT kind, COUNT(*) FROM nodes GROUP BY kind ORDER BY kind")
            .map_err(storage)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as usize))
            })
            .map_err(storage)?;
        let mut counts = Vec::new();
        for row in rows {
            let (kind, count) = row.map_err(storage)?;
            if let Some(kind) = NodeKind::from_i64(kind) {
                counts.push((kind, count));
            }
        }
        Ok(counts)
    }

    /// Load the entire persisted graph into memory. Used when watch mode
    /// attaches to an existing database.
    pub fn load_graph(&self) -> Result<sharpitect_core::Graph> {
        let mut graph = sharpitect_core::Graph::new();
        for node in self.all_nodes()? {
            graph.upsert_node(node);
        }
        for edge in self.all_edges()? {
            graph.add_edge(edge);
        }
        Ok(graph)
    }

    pub fn all_nodes(&self) -> Result<Vec<DeclarationNode>> {
        let conn = self.conn.lock().expect("repository mutex");
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, name, kind, file_path, start_line, start_column, end_line, end_column,
                        arch_level, arch_description, metadata
                 FROM nodes ORDER BY file_path, start_line",
            )
            .map_err(storage)?;
        let rows = stmt.query_map([], node_from_row).map_err(storage)?;
        collect_rows(rows)
    }

    pub fn all_edges(&self) -> Result<Vec<RelationshipEdge>> {
        let conn = self.conn.lock().expect("repository mutex");
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, source_id, target_id, kind, source_file_path, source_line, metadata
                 FROM edges",
            )
            .map_err(storage)?;
        let rows = stmt.query_map([], edge_from_row).map_err(storage)?;
        collect_rows(rows)
    }
}

fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map(|l| l as i64).unwrap_or(-1)
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<DeclarationNode> {
    Ok(DeclarationNode {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: NodeKind::from_i64(row.get::<_, i64>(2)?).unwrap_or(NodeKind::TodoComment),
        file_path: row.get(3)?,
        start_line: row.get::<_, i64>(4)? as u32,
        start_column: row.get::<_, i64>(5)? as u32,
        end_line: row.get::<_, i64>(6)? as u32,
        end_column: row.get::<_, i64>(7)? as u32,
        arch_level: ArchLevel::from_i64(row.get::<_, i64>(8)?),
        arch_description: row.get(9)?,
        metadata: row.get(10)?,
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<RelationshipEdge> {
    Ok(RelationshipEdge {
        id: row.get(0)?,
        source_id: row.get(1)?,
        target_id: row.get(2)?,
        kind: EdgeKind::from_i64(row.get::<_, i64>(3)?).unwrap_or(EdgeKind::References),
        source_file_path: row.get(4)?,
        source_line: row.get::<_, Option<i64>>(5)?.map(|l| l as u32),
        metadata: row.get(6)?,
    })
}

fn collect_rows<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(storage)?);
    }
    Ok(out)
}
