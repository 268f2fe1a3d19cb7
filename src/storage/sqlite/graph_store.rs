//! `SQLite` implementation of [`GraphStore`].
//!
//! The versioning chokepoint, [`create_new_entity_version`], is the only
//! place that invalidates a current entity row, inserts its successor, and
//! re-creates its edges against whatever is currently valid — every mutating
//! public method funnels through it, which is what keeps "no phantom
//! relations" true no matter which entry point a caller used.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;

use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::models::{Entity, Metadata, Relation, current_timestamp};
use crate::storage::traits::{
    DecayOptions, EntityInput, GraphSnapshot, GraphStore, ObservationDelta, ObservationsAdded,
    RelationInput, RelationKey,
};
use crate::{Error, Result};

use super::record_operation_metrics;
use super::schema::GraphDatabase;
use super::acquire_lock;

/// `SQLite`-backed [`GraphStore`].
pub struct SqliteGraphStore {
    conn: std::sync::Arc<Mutex<Connection>>,
}

impl SqliteGraphStore {
    /// Builds a graph store over an already-initialized [`GraphDatabase`].
    #[must_use]
    pub fn new(db: &GraphDatabase) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    fn with_tx<T>(&self, op: &'static str, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let mut conn = acquire_lock(&self.conn);
        let tx = conn.transaction().map_err(|e| Error::OperationFailed {
            operation: op.to_string(),
            cause: e.to_string(),
        })?;
        let result = f(&tx);
        match result {
            Ok(value) => {
                tx.commit().map_err(|e| Error::OperationFailed {
                    operation: op.to_string(),
                    cause: e.to_string(),
                })?;
                record_operation_metrics("sqlite_graph", op, start, "success");
                Ok(value)
            },
            Err(e) => {
                record_operation_metrics("sqlite_graph", op, start, "error");
                Err(e)
            },
        }
    }

    /// The chokepoint versioning algorithm (see module docs).
    fn create_new_entity_version(
        tx: &Transaction<'_>,
        name: &str,
        new_observations: Vec<String>,
    ) -> Result<Option<Entity>> {
        let Some(current) = fetch_current_entity(tx, name)? else {
            return Ok(None);
        };

        let outgoing = fetch_current_relations_from(tx, name)?;
        let incoming = fetch_current_relations_to(tx, name)?;

        let now = current_timestamp();

        tx.execute(
            "UPDATE entities SET valid_to = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, current.id.to_string()],
        )
        .map_err(op_err("invalidate_entity"))?;

        tx.execute(
            "UPDATE relations SET valid_to = ?1, updated_at = ?1
             WHERE (from_name = ?2 OR to_name = ?2) AND valid_to IS NULL",
            params![now, name],
        )
        .map_err(op_err("invalidate_relations"))?;

        let new_entity = current.next_version(new_observations);
        insert_entity(tx, &new_entity)?;

        for edge in outgoing {
            if fetch_current_entity(tx, &edge.to)?.is_none() {
                warn!(target = %edge.to, "skipping outgoing edge re-creation: target no longer current");
                continue;
            }
            insert_relation(tx, &edge.next_version())?;
        }

        for edge in incoming {
            if fetch_current_entity(tx, &edge.from)?.is_none() {
                warn!(source = %edge.from, "skipping incoming edge re-creation: source no longer current");
                continue;
            }
            insert_relation(tx, &edge.next_version())?;
        }

        Ok(Some(new_entity))
    }
}

impl GraphStore for SqliteGraphStore {
    #[instrument(skip(self, inputs))]
    fn create_entities(&self, inputs: Vec<EntityInput>) -> Result<Vec<Entity>> {
        self.with_tx("create_entities", |tx| {
            let mut created = Vec::new();
            for input in inputs {
                match fetch_current_entity(tx, &input.name)? {
                    None => {
                        let entity = Entity::new(&input.name, &input.entity_type, input.observations);
                        insert_entity(tx, &entity)?;
                        created.push(entity);
                    },
                    Some(existing) => {
                        let merged = crate::models::merge_observations(&existing.observations, &input.observations);
                        if merged == existing.observations {
                            continue;
                        }
                        if let Some(next) = Self::create_new_entity_version(tx, &input.name, merged)? {
                            created.push(next);
                        }
                    },
                }
            }
            Ok(created)
        })
    }

    #[instrument(skip(self, deltas))]
    fn add_observations(&self, deltas: Vec<ObservationDelta>) -> Result<Vec<ObservationsAdded>> {
        self.with_tx("add_observations", |tx| {
            let mut results = Vec::new();
            for delta in deltas {
                let Some(existing) = fetch_current_entity(tx, &delta.entity_name)? else {
                    warn!(entity = %delta.entity_name, "add_observations: entity not found");
                    continue;
                };
                let merged = crate::models::merge_observations(&existing.observations, &delta.contents);
                let added: Vec<String> = delta
                    .contents
                    .iter()
                    .filter(|c| !existing.observations.contains(c))
                    .cloned()
                    .collect();
                if !added.is_empty() {
                    Self::create_new_entity_version(tx, &delta.entity_name, merged)?;
                }
                results.push(ObservationsAdded {
                    entity_name: delta.entity_name,
                    added_observations: added,
                });
            }
            Ok(results)
        })
    }

    #[instrument(skip(self, deletions))]
    fn delete_observations(&self, deletions: Vec<ObservationDelta>) -> Result<()> {
        self.with_tx("delete_observations", |tx| {
            for deletion in deletions {
                let Some(existing) = fetch_current_entity(tx, &deletion.entity_name)? else {
                    warn!(entity = %deletion.entity_name, "delete_observations: entity not found");
                    continue;
                };
                let remaining = crate::models::remove_observations(&existing.observations, &deletion.contents);
                if remaining != existing.observations {
                    Self::create_new_entity_version(tx, &deletion.entity_name, remaining)?;
                }
            }
            Ok(())
        })
    }

    #[instrument(skip(self, names))]
    fn delete_entities(&self, names: &[String]) -> Result<()> {
        self.with_tx("delete_entities", |tx| {
            let now = current_timestamp();
            for name in names {
                let Some(current) = fetch_current_entity(tx, name)? else {
                    warn!(entity = %name, "delete_entities: entity not found");
                    continue;
                };
                tx.execute(
                    "UPDATE entities SET valid_to = ?1, updated_at = ?1 WHERE id = ?2",
                    params![now, current.id.to_string()],
                )
                .map_err(op_err("archive_entity"))?;
                tx.execute(
                    "UPDATE relations SET valid_to = ?1, updated_at = ?1
                     WHERE (from_name = ?2 OR to_name = ?2) AND valid_to IS NULL",
                    params![now, name],
                )
                .map_err(op_err("cascade_archive_relations"))?;
            }
            Ok(())
        })
    }

    #[instrument(skip(self, relations))]
    fn create_relations(&self, relations: Vec<RelationInput>) -> Result<Vec<Relation>> {
        self.with_tx("create_relations", |tx| {
            let mut created = Vec::new();
            for input in relations {
                if fetch_current_entity(tx, &input.from)?.is_none()
                    || fetch_current_entity(tx, &input.to)?.is_none()
                {
                    warn!(from = %input.from, to = %input.to, "create_relations: endpoint not current");
                    continue;
                }
                if fetch_current_relation(tx, &input.from, &input.to, &input.relation_type)?.is_some() {
                    continue;
                }
                let mut relation = Relation::new(&input.from, &input.to, &input.relation_type);
                if let Some(strength) = input.strength {
                    relation.strength = strength;
                }
                if let Some(confidence) = input.confidence {
                    relation.confidence = confidence;
                }
                relation.metadata = input.metadata;
                insert_relation(tx, &relation)?;
                created.push(relation);
            }
            Ok(created)
        })
    }

    #[instrument(skip(self, relation))]
    fn update_relation(&self, relation: Relation) -> Result<Relation> {
        self.with_tx("update_relation", |tx| {
            if fetch_current_entity(tx, &relation.from)?.is_none()
                || fetch_current_entity(tx, &relation.to)?.is_none()
            {
                return Err(Error::EntityNotCurrent(format!(
                    "{} -> {}",
                    relation.from, relation.to
                )));
            }
            let now = current_timestamp();
            let existing = fetch_current_relation(tx, &relation.from, &relation.to, &relation.relation_type)?;

            if let Some(existing) = &existing {
                tx.execute(
                    "UPDATE relations SET valid_to = ?1, updated_at = ?1 WHERE id = ?2",
                    params![now, existing.id.to_string()],
                )
                .map_err(op_err("archive_relation"))?;
            }

            let mut next = existing.as_ref().map_or_else(
                || Relation::new(&relation.from, &relation.to, &relation.relation_type),
                Relation::next_version,
            );
            next.strength = relation.strength;
            next.confidence = relation.confidence;
            next.metadata = relation.metadata;
            insert_relation(tx, &next)?;
            Ok(next)
        })
    }

    #[instrument(skip(self, relations))]
    fn delete_relations(&self, relations: &[RelationKey]) -> Result<()> {
        self.with_tx("delete_relations", |tx| {
            let now = current_timestamp();
            for key in relations {
                if let Some(existing) = fetch_current_relation(tx, &key.from, &key.to, &key.relation_type)? {
                    tx.execute(
                        "UPDATE relations SET valid_to = ?1, updated_at = ?1 WHERE id = ?2",
                        params![now, existing.id.to_string()],
                    )
                    .map_err(op_err("archive_relation"))?;
                }
            }
            Ok(())
        })
    }

    fn get_relation(&self, from: &str, to: &str, relation_type: &str) -> Result<Option<Relation>> {
        let conn = acquire_lock(&self.conn);
        fetch_current_relation_conn(&conn, from, to, relation_type)
    }

    fn load_graph(&self) -> Result<GraphSnapshot> {
        let conn = acquire_lock(&self.conn);
        let entities = query_entities(&conn, "WHERE valid_to IS NULL", [])?;
        let relations = query_relations(&conn, "WHERE valid_to IS NULL", [])?;
        Ok(GraphSnapshot { entities, relations })
    }

    fn get_entity(&self, name: &str) -> Result<Option<Entity>> {
        let conn = acquire_lock(&self.conn);
        fetch_current_entity_conn(&conn, name)
    }

    fn search_nodes(&self, substring: &str) -> Result<GraphSnapshot> {
        let conn = acquire_lock(&self.conn);
        let needle = format!("%{}%", super::escape_like_wildcards(&substring.to_lowercase()));

        let mut matched_entities = query_entities(
            &conn,
            "WHERE valid_to IS NULL AND lower(name) LIKE ?1 ESCAPE '\\'",
            params![needle],
        )?;
        let relations = query_relations(
            &conn,
            "WHERE valid_to IS NULL AND (lower(from_name) LIKE ?1 ESCAPE '\\' OR lower(to_name) LIKE ?1 ESCAPE '\\')",
            params![needle],
        )?;

        let mut names: HashSet<String> = matched_entities.iter().map(|e| e.name.clone()).collect();
        for r in &relations {
            names.insert(r.from.clone());
            names.insert(r.to.clone());
        }
        for name in &names {
            if !matched_entities.iter().any(|e| &e.name == name)
                && let Some(e) = fetch_current_entity_conn(&conn, name)?
            {
                matched_entities.push(e);
            }
        }

        Ok(GraphSnapshot {
            entities: matched_entities,
            relations,
        })
    }

    fn open_nodes(&self, names: &[String]) -> Result<GraphSnapshot> {
        let conn = acquire_lock(&self.conn);
        let mut entities = Vec::new();
        for name in names {
            if let Some(e) = fetch_current_entity_conn(&conn, name)? {
                entities.push(e);
            }
        }
        let name_set: HashSet<&String> = names.iter().collect();
        let all_current_relations = query_relations(&conn, "WHERE valid_to IS NULL", [])?;
        let relations = all_current_relations
            .into_iter()
            .filter(|r| name_set.contains(&r.from) && name_set.contains(&r.to))
            .collect();
        Ok(GraphSnapshot { entities, relations })
    }

    fn get_entity_history(&self, name: &str) -> Result<Vec<Entity>> {
        let conn = acquire_lock(&self.conn);
        query_entities(&conn, "WHERE name = ?1 ORDER BY valid_from ASC", params![name])
    }

    fn get_relation_history(&self, from: &str, to: &str, relation_type: &str) -> Result<Vec<Relation>> {
        let conn = acquire_lock(&self.conn);
        query_relations(
            &conn,
            "WHERE from_name = ?1 AND to_name = ?2 AND relation_type = ?3 ORDER BY valid_from ASC",
            params![from, to, relation_type],
        )
    }

    fn get_graph_at_time(&self, at: i64) -> Result<GraphSnapshot> {
        let conn = acquire_lock(&self.conn);
        let entities = query_entities(
            &conn,
            "WHERE valid_from <= ?1 AND (valid_to IS NULL OR valid_to > ?1)",
            params![at],
        )?;
        let relations = query_relations(
            &conn,
            "WHERE valid_from <= ?1 AND (valid_to IS NULL OR valid_to > ?1)
             AND EXISTS (SELECT 1 FROM entities e WHERE e.name = relations.from_name
                         AND e.valid_from <= ?1 AND (e.valid_to IS NULL OR e.valid_to > ?1))
             AND EXISTS (SELECT 1 FROM entities e WHERE e.name = relations.to_name
                         AND e.valid_from <= ?1 AND (e.valid_to IS NULL OR e.valid_to > ?1))",
            params![at],
        )?;
        Ok(GraphSnapshot { entities, relations })
    }

    fn get_decayed_graph(&self, opts: DecayOptions) -> Result<GraphSnapshot> {
        let mut snapshot = self.load_graph()?;
        let now = current_timestamp();
        for relation in &mut snapshot.relations {
            let age_days = (now - relation.valid_from).max(0) as f64 / 86_400.0;
            relation.decayed_confidence =
                Some(relation.decay_confidence(age_days, opts.half_life_days, opts.min_floor));
        }
        Ok(snapshot)
    }

    fn purge_archived_entities(&self, cutoff: i64) -> Result<u64> {
        self.with_tx("purge_archived_entities", |tx| {
            let affected = tx
                .execute(
                    "DELETE FROM entities WHERE valid_to IS NOT NULL AND valid_to < ?1",
                    params![cutoff],
                )
                .map_err(op_err("purge_archived_entities"))?;
            Ok(affected as u64)
        })
    }

    fn purge_archived_relations(&self, cutoff: i64) -> Result<u64> {
        self.with_tx("purge_archived_relations", |tx| {
            let affected = tx
                .execute(
                    "DELETE FROM relations WHERE valid_to IS NOT NULL AND valid_to < ?1",
                    params![cutoff],
                )
                .map_err(op_err("purge_archived_relations"))?;
            Ok(affected as u64)
        })
    }
}

fn op_err(operation: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

fn fetch_current_entity(tx: &Transaction<'_>, name: &str) -> Result<Option<Entity>> {
    tx.query_row(
        "SELECT * FROM entities WHERE name = ?1 AND valid_to IS NULL",
        params![name],
        parse_entity_row,
    )
    .optional()
    .map_err(op_err("fetch_current_entity"))
}

fn fetch_current_entity_conn(conn: &Connection, name: &str) -> Result<Option<Entity>> {
    conn.query_row(
        "SELECT * FROM entities WHERE name = ?1 AND valid_to IS NULL",
        params![name],
        parse_entity_row,
    )
    .optional()
    .map_err(op_err("fetch_current_entity"))
}

fn fetch_current_relation(
    tx: &Transaction<'_>,
    from: &str,
    to: &str,
    relation_type: &str,
) -> Result<Option<Relation>> {
    tx.query_row(
        "SELECT * FROM relations WHERE from_name = ?1 AND to_name = ?2 AND relation_type = ?3 AND valid_to IS NULL",
        params![from, to, relation_type],
        parse_relation_row,
    )
    .optional()
    .map_err(op_err("fetch_current_relation"))
}

fn fetch_current_relation_conn(
    conn: &Connection,
    from: &str,
    to: &str,
    relation_type: &str,
) -> Result<Option<Relation>> {
    conn.query_row(
        "SELECT * FROM relations WHERE from_name = ?1 AND to_name = ?2 AND relation_type = ?3 AND valid_to IS NULL",
        params![from, to, relation_type],
        parse_relation_row,
    )
    .optional()
    .map_err(op_err("fetch_current_relation"))
}

fn fetch_current_relations_from(tx: &Transaction<'_>, name: &str) -> Result<Vec<Relation>> {
    let mut stmt = tx
        .prepare("SELECT * FROM relations WHERE from_name = ?1 AND valid_to IS NULL")
        .map_err(op_err("prepare_relations_from"))?;
    let rows = stmt
        .query_map(params![name], parse_relation_row)
        .map_err(op_err("query_relations_from"))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(op_err("collect_relations_from"))
}

fn fetch_current_relations_to(tx: &Transaction<'_>, name: &str) -> Result<Vec<Relation>> {
    let mut stmt = tx
        .prepare("SELECT * FROM relations WHERE to_name = ?1 AND valid_to IS NULL")
        .map_err(op_err("prepare_relations_to"))?;
    let rows = stmt
        .query_map(params![name], parse_relation_row)
        .map_err(op_err("query_relations_to"))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(op_err("collect_relations_to"))
}

fn query_entities(conn: &Connection, where_clause: &str, params: impl rusqlite::Params) -> Result<Vec<Entity>> {
    let sql = format!("SELECT * FROM entities {where_clause}");
    let mut stmt = conn.prepare(&sql).map_err(op_err("prepare_entities_query"))?;
    let rows = stmt.query_map(params, parse_entity_row).map_err(op_err("query_entities"))?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(op_err("collect_entities"))
}

fn query_relations(conn: &Connection, where_clause: &str, params: impl rusqlite::Params) -> Result<Vec<Relation>> {
    let sql = format!("SELECT * FROM relations {where_clause}");
    let mut stmt = conn.prepare(&sql).map_err(op_err("prepare_relations_query"))?;
    let rows = stmt.query_map(params, parse_relation_row).map_err(op_err("query_relations"))?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(op_err("collect_relations"))
}

fn insert_entity(tx: &Transaction<'_>, entity: &Entity) -> Result<()> {
    let observations_json = serde_json::to_string(&entity.observations).map_err(|e| Error::OperationFailed {
        operation: "serialize_observations".to_string(),
        cause: e.to_string(),
    })?;
    let vector_json = entity
        .vector
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::OperationFailed {
            operation: "serialize_vector".to_string(),
            cause: e.to_string(),
        })?;
    tx.execute(
        "INSERT INTO entities
            (id, name, entity_type, observations, vector, embedding_model, embedding_updated_at,
             version, created_at, updated_at, valid_from, valid_to)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            entity.id.to_string(),
            entity.name,
            entity.entity_type,
            observations_json,
            vector_json,
            entity.embedding_model,
            entity.embedding_updated_at,
            entity.version,
            entity.created_at,
            entity.updated_at,
            entity.valid_from,
            entity.valid_to,
        ],
    )
    .map_err(op_err("insert_entity"))?;
    Ok(())
}

fn insert_relation(tx: &Transaction<'_>, relation: &Relation) -> Result<()> {
    let metadata_json = relation.metadata.to_json_string()?;
    tx.execute(
        "INSERT INTO relations
            (id, from_name, to_name, relation_type, strength, confidence, metadata,
             version, created_at, updated_at, valid_from, valid_to)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            relation.id.to_string(),
            relation.from,
            relation.to,
            relation.relation_type,
            relation.strength,
            relation.confidence,
            metadata_json,
            relation.version,
            relation.created_at,
            relation.updated_at,
            relation.valid_from,
            relation.valid_to,
        ],
    )
    .map_err(op_err("insert_relation"))?;
    Ok(())
}

fn parse_entity_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    let id: String = row.get("id")?;
    let observations_json: String = row.get("observations")?;
    let vector_json: Option<String> = row.get("vector")?;
    Ok(Entity {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        name: row.get("name")?,
        entity_type: row.get("entity_type")?,
        observations: serde_json::from_str(&observations_json).unwrap_or_default(),
        vector: vector_json.and_then(|v| serde_json::from_str(&v).ok()),
        embedding_model: row.get("embedding_model")?,
        embedding_updated_at: row.get("embedding_updated_at")?,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        valid_from: row.get("valid_from")?,
        valid_to: row.get("valid_to")?,
    })
}

fn parse_relation_row(row: &Row<'_>) -> rusqlite::Result<Relation> {
    let id: String = row.get("id")?;
    let metadata_json: Option<String> = row.get("metadata")?;
    let metadata = metadata_json
        .and_then(|m| Metadata::from_json_string(&m).ok())
        .unwrap_or(Metadata::Null);
    Ok(Relation {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        from: row.get("from_name")?,
        to: row.get("to_name")?,
        relation_type: row.get("relation_type")?,
        strength: row.get("strength")?,
        confidence: row.get("confidence")?,
        metadata,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        valid_from: row.get("valid_from")?,
        valid_to: row.get("valid_to")?,
        decayed_confidence: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteGraphStore {
        let db = GraphDatabase::in_memory().expect("opens");
        SqliteGraphStore::new(&db)
    }

    fn entity_input(name: &str, obs: &[&str]) -> EntityInput {
        EntityInput {
            name: name.to_string(),
            entity_type: "person".to_string(),
            observations: obs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn create_entities_is_idempotent_with_same_observations() {
        let store = store();
        let created = store
            .create_entities(vec![entity_input("Alice", &["likes tea"])])
            .expect("ok");
        assert_eq!(created.len(), 1);

        let created_again = store
            .create_entities(vec![entity_input("Alice", &["likes tea"])])
            .expect("ok");
        assert!(created_again.is_empty());
    }

    #[test]
    fn delete_observations_archives_no_phantom_relations() {
        let store = store();
        store
            .create_entities(vec![
                entity_input("Alice", &["x", "y"]),
                entity_input("Bob", &[]),
                entity_input("Charlie", &[]),
            ])
            .expect("ok");
        store
            .create_relations(vec![
                RelationInput {
                    from: "Alice".into(),
                    to: "Bob".into(),
                    relation_type: "KNOWS".into(),
                    strength: None,
                    confidence: None,
                    metadata: Metadata::Null,
                },
                RelationInput {
                    from: "Charlie".into(),
                    to: "Alice".into(),
                    relation_type: "KNOWS".into(),
                    strength: None,
                    confidence: None,
                    metadata: Metadata::Null,
                },
            ])
            .expect("ok");

        store
            .delete_observations(vec![ObservationDelta {
                entity_name: "Alice".into(),
                contents: vec!["x".into()],
            }])
            .expect("ok");

        let alice = store.get_entity("Alice").expect("ok").expect("exists");
        assert_eq!(alice.version, 2);
        assert_eq!(alice.observations, vec!["y".to_string()]);

        let snapshot = store.load_graph().expect("ok");
        for relation in &snapshot.relations {
            let from_current = snapshot.entities.iter().any(|e| e.name == relation.from);
            let to_current = snapshot.entities.iter().any(|e| e.name == relation.to);
            assert!(from_current && to_current, "phantom relation detected");
        }
        assert_eq!(snapshot.relations.len(), 2);
    }

    #[test]
    fn delete_entities_cascades_to_current_relations() {
        let store = store();
        store
            .create_entities(vec![entity_input("Alice", &[]), entity_input("Bob", &[])])
            .expect("ok");
        store
            .create_relations(vec![RelationInput {
                from: "Alice".into(),
                to: "Bob".into(),
                relation_type: "KNOWS".into(),
                strength: None,
                confidence: None,
                metadata: Metadata::Null,
            }])
            .expect("ok");

        store.delete_entities(&["Alice".to_string()]).expect("ok");

        let snapshot = store.load_graph().expect("ok");
        assert!(snapshot.relations.is_empty());
        assert_eq!(snapshot.entities.len(), 1);
    }

    #[test]
    fn get_graph_at_time_reconstructs_past_state() {
        let store = store();
        store.create_entities(vec![entity_input("Alice", &[])]).expect("ok");
        let t0 = store.get_entity("Alice").expect("ok").expect("exists").valid_from;
        std::thread::sleep(std::time::Duration::from_millis(1100));
        store
            .add_observations(vec![ObservationDelta {
                entity_name: "Alice".into(),
                contents: vec!["new fact".into()],
            }])
            .expect("ok");

        let past = store.get_graph_at_time(t0).expect("ok");
        assert_eq!(past.entities.len(), 1);
        assert_eq!(past.entities[0].version, 1);

        let now = store.get_entity("Alice").expect("ok").expect("exists");
        assert_eq!(now.version, 2);
    }

    #[test]
    fn purge_archived_entities_never_touches_current_rows() {
        let store = store();
        store.create_entities(vec![entity_input("Alice", &[])]).expect("ok");
        let purged = store.purge_archived_entities(i64::MAX).expect("ok");
        assert_eq!(purged, 0);
        assert!(store.get_entity("Alice").expect("ok").is_some());
    }
}
