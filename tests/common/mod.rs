#![allow(dead_code)]

use memoorm::{
    Entity, IdGeneration, MemoryDatabase, QueryResult, Session, SessionConfig, SqlExecutor,
    StorageError, StorageResult,
};

#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[entity(table = "person")]
pub struct Person {
    #[id]
    pub id: Option<i64>,
    #[column(name = "nick_name")]
    pub name: String,
    #[column(name = "old")]
    pub age: i32,
    pub email: Option<String>,
}

impl Person {
    pub fn new(name: &str, age: i32, email: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            age,
            email: Some(email.to_string()),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[entity(table = "orders")]
pub struct Order {
    pub id: i64,
    pub total: f64,
    pub paid: bool,
}

/// Wraps a [`MemoryDatabase`] and fails any statement containing a pattern.
pub struct FlakyExecutor {
    pub inner: MemoryDatabase,
    fail_on: Option<String>,
}

impl FlakyExecutor {
    pub fn new(inner: MemoryDatabase) -> Self {
        Self { inner, fail_on: None }
    }

    pub fn fail_when(&mut self, pattern: &str) {
        self.fail_on = Some(pattern.to_string());
    }

    pub fn heal(&mut self) {
        self.fail_on = None;
    }

    fn check(&self, sql: &str) -> StorageResult<()> {
        match &self.fail_on {
            Some(pattern) if sql.contains(pattern.as_str()) => {
                Err(StorageError::Execution(format!("injected failure on: {sql}")))
            }
            _ => Ok(()),
        }
    }
}

impl SqlExecutor for FlakyExecutor {
    fn execute(&mut self, sql: &str) -> StorageResult<u64> {
        self.check(sql)?;
        self.inner.execute(sql)
    }

    fn query(&mut self, sql: &str) -> StorageResult<QueryResult> {
        self.check(sql)?;
        self.inner.query(sql)
    }
}

pub fn session() -> Session<MemoryDatabase> {
    let mut session = Session::new(MemoryDatabase::new());
    session.register::<Person>().unwrap();
    session.register::<Order>().unwrap();
    session.create_table::<Person>().unwrap();
    session.create_table::<Order>().unwrap();
    session.executor_mut().reset_stats();
    session
}

pub fn assigned_session() -> Session<MemoryDatabase> {
    let config = SessionConfig::new("assigned").id_generation(IdGeneration::Assigned);
    let mut session = Session::with_config(MemoryDatabase::new(), config).unwrap();
    session.register::<Person>().unwrap();
    session.create_table::<Person>().unwrap();
    session.executor_mut().reset_stats();
    session
}

pub fn flaky_session() -> Session<FlakyExecutor> {
    let mut session = Session::new(FlakyExecutor::new(MemoryDatabase::new()));
    session.register::<Person>().unwrap();
    session.create_table::<Person>().unwrap();
    session.executor_mut().inner.reset_stats();
    session
}
