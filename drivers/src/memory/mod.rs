//! In-memory store.
//!
//! Rows live behind a single async mutex. Auto-commit statements lock it for
//! the duration of one statement; a transaction holds it until commit or
//! rollback and works on a private copy, so transactions are serializable and
//! a rollback is simply dropping the copy.

mod tables;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use quarry_core::connection::{Connection, Executor, IsolationLevel, TransactionHandle};
use quarry_core::{QuarryError, QueryResult, Result, Row, Schema, Statement};
use tokio::sync::{Mutex, OwnedMutexGuard};

pub use tables::Tables;

struct Shared {
    schema: Arc<Schema>,
    tables: Arc<Mutex<Tables>>,
    reachable: AtomicBool,
    statements: AtomicU64,
}

impl Shared {
    fn execute(&self, tables: &mut Tables, statement: Statement) -> Result<QueryResult> {
        self.statements.fetch_add(1, Ordering::Relaxed);
        let mut scratch = tables.clone();
        let result = scratch.execute(&self.schema, statement)?;
        *tables = scratch;
        Ok(result)
    }
}

/// A process-local store enforcing unique keys, foreign keys and referential actions.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            shared: Arc::new(Shared {
                schema,
                tables: Arc::new(Mutex::new(Tables::default())),
                reachable: AtomicBool::new(true),
                statements: AtomicU64::new(0),
            }),
        }
    }

    /// A store whose `connect` fails, for exercising initialization errors.
    pub fn unreachable(schema: Arc<Schema>) -> Self {
        let store = Self::new(schema);
        store.shared.reachable.store(false, Ordering::SeqCst);
        store
    }

    /// Snapshot of an entity's committed rows.
    pub async fn rows(&self, entity: &str) -> Vec<Row> {
        self.shared.tables.lock().await.rows(entity).to_vec()
    }

    /// Number of statements executed so far, transactions included.
    pub fn statement_count(&self) -> u64 {
        self.shared.statements.load(Ordering::Relaxed)
    }
}

impl Connection for MemoryStore {
    async fn run(&self, statement: Statement) -> Result<QueryResult> {
        let mut tables = self.shared.tables.lock().await;
        self.shared.execute(&mut tables, statement)
    }
}

impl Executor for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn connect(&self) -> Result<()> {
        if self.shared.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QuarryError::Initialization(
                "Can't reach database server at `memory`".into(),
            ))
        }
    }

    async fn begin(&self, _isolation: Option<IsolationLevel>) -> Result<MemoryTransaction> {
        let guard = self.shared.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTransaction {
            shared: self.shared.clone(),
            guard,
            working: std::sync::Mutex::new(working),
        })
    }
}

/// An open transaction. Holds the store exclusively until it ends.
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    guard: OwnedMutexGuard<Tables>,
    working: std::sync::Mutex<Tables>,
}

impl MemoryTransaction {
    fn execute(&self, statement: Statement) -> Result<QueryResult> {
        let mut working = self
            .working
            .lock()
            .map_err(|_| QuarryError::TransactionError("transaction state poisoned".into()))?;
        self.shared.execute(&mut working, statement)
    }
}

impl Connection for MemoryTransaction {
    fn run(&self, statement: Statement) -> impl Future<Output = Result<QueryResult>> + Send {
        let result = self.execute(statement);
        async move { result }
    }
}

impl TransactionHandle for MemoryTransaction {
    async fn commit(self) -> Result<()> {
        let MemoryTransaction {
            mut guard, working, ..
        } = self;
        *guard = working
            .into_inner()
            .map_err(|_| QuarryError::TransactionError("transaction state poisoned".into()))?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::schema::{EntityDef, FieldDef, RelationDef, ScalarType, UniqueKey};
    use quarry_core::statement::{DeleteStatement, InsertStatement, SelectStatement};
    use quarry_core::{Constraint, Predicate, ReferentialAction};

    static TEAM: EntityDef = EntityDef {
        name: "Team",
        fields: &[
            FieldDef::new("id", ScalarType::String),
            FieldDef::new("slug", ScalarType::String),
        ],
        relations: &[
            RelationDef::to_many("members", "Member", &[("id", "teamId")]),
            RelationDef::to_many("badges", "Badge", &[("id", "teamId")]),
        ],
        primary_key: "id",
        unique_keys: &[UniqueKey {
            name: "slug",
            fields: &["slug"],
        }],
    };

    static MEMBER: EntityDef = EntityDef {
        name: "Member",
        fields: &[
            FieldDef::new("id", ScalarType::String),
            FieldDef::new("teamId", ScalarType::String).optional(),
        ],
        relations: &[RelationDef::to_one("team", "Team", &[("teamId", "id")]).optional()],
        primary_key: "id",
        unique_keys: &[],
    };

    static BADGE: EntityDef = EntityDef {
        name: "Badge",
        fields: &[
            FieldDef::new("id", ScalarType::String),
            FieldDef::new("teamId", ScalarType::String),
        ],
        relations: &[RelationDef::to_one("team", "Team", &[("teamId", "id")])
            .on_delete(ReferentialAction::Cascade)],
        primary_key: "id",
        unique_keys: &[],
    };

    fn store() -> MemoryStore {
        MemoryStore::new(Arc::new(Schema::new(&[&TEAM, &MEMBER, &BADGE], &[]).unwrap()))
    }

    fn insert(entity: &'static str, rows: Vec<Row>) -> Statement {
        InsertStatement {
            entity,
            rows,
            skip_duplicates: false,
        }
        .into()
    }

    #[tokio::test]
    async fn unique_keys_are_enforced_and_nulls_never_collide() {
        let store = store();
        store
            .run(insert("Team", vec![Row::new().with("id", "t1").with("slug", "a")]))
            .await
            .unwrap();
        let err = store
            .run(insert("Team", vec![Row::new().with("id", "t2").with("slug", "a")]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::ConstraintViolation { constraint: Constraint::Unique(ref f), .. } if f == &["slug"]
        ));

        store
            .run(insert(
                "Member",
                vec![
                    Row::new().with("id", "m1").with("teamId", quarry_core::Value::Null),
                    Row::new().with("id", "m2").with("teamId", quarry_core::Value::Null),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(store.rows("Member").await.len(), 2);
    }

    #[tokio::test]
    async fn failed_statement_leaves_no_partial_rows() {
        let store = store();
        let err = store
            .run(insert(
                "Team",
                vec![
                    Row::new().with("id", "t1").with("slug", "a"),
                    Row::new().with("id", "t1").with("slug", "b"),
                ],
            ))
            .await;
        assert!(err.is_err());
        assert!(store.rows("Team").await.is_empty());
    }

    #[tokio::test]
    async fn foreign_keys_and_referential_actions() {
        let store = store();
        store
            .run(insert("Team", vec![Row::new().with("id", "t1").with("slug", "a")]))
            .await
            .unwrap();
        let dangling = store
            .run(insert("Badge", vec![Row::new().with("id", "b0").with("teamId", "nope")]))
            .await
            .unwrap_err();
        assert_eq!(dangling.code(), "P2003");

        store
            .run(insert("Badge", vec![Row::new().with("id", "b1").with("teamId", "t1")]))
            .await
            .unwrap();
        store
            .run(insert("Member", vec![Row::new().with("id", "m1").with("teamId", "t1")]))
            .await
            .unwrap();

        let deleted = store
            .run(
                DeleteStatement {
                    entity: "Team",
                    filter: Predicate::eq("id", "t1"),
                }
                .into(),
            )
            .await
            .unwrap();
        assert_eq!(deleted.affected, 1);
        assert!(store.rows("Badge").await.is_empty());
        assert!(store.rows("Member").await[0].get("teamId").is_null());
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = store();
        {
            let tx = store.begin(None).await.unwrap();
            tx.run(insert("Team", vec![Row::new().with("id", "t1").with("slug", "a")]))
                .await
                .unwrap();
            let seen = tx
                .run(SelectStatement::new("Team", Predicate::Const(true)).into())
                .await
                .unwrap();
            assert_eq!(seen.rows.len(), 1);
        }
        assert!(store.rows("Team").await.is_empty());

        let tx = store.begin(None).await.unwrap();
        tx.run(insert("Team", vec![Row::new().with("id", "t2").with("slug", "b")]))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.rows("Team").await.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_store_fails_to_connect() {
        let store = MemoryStore::unreachable(Arc::new(Schema::new(&[&TEAM, &MEMBER, &BADGE], &[]).unwrap()));
        assert!(matches!(store.connect().await, Err(QuarryError::Initialization(_))));
    }
}
