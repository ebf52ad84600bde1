#![allow(dead_code)]

use rowkeep_core::adapter::{BoundParam, Connector, Driver, DriverError, RawOutcome};
use rowkeep_core::{
    Accessor, DatabaseAdapter, Descriptor, MssqlAdapter, MysqlAdapter, Record, Row, RowError,
    ServerConfig, SqlValue,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Everything a `FakeDriver` saw, plus the answers it will give.
#[derive(Default)]
pub struct DriverLog {
    pub statements: Vec<String>,
    pub prepared: Vec<(String, Vec<BoundParam>)>,
    pub selected: Vec<String>,
    pub connects: Vec<ServerConfig>,
    scripted: VecDeque<(String, Result<RawOutcome, DriverError>)>,
    pub insert_id: u64,
    pub affected_rows: u64,
    pub closed: bool,
}

impl DriverLog {
    /// Answers the next statement containing `fragment` with `outcome`.
    pub fn script(&mut self, fragment: &str, outcome: Result<RawOutcome, DriverError>) {
        self.scripted.push_back((fragment.to_string(), outcome));
    }

    pub fn count(&self, statement: &str) -> usize {
        self.statements.iter().filter(|sql| *sql == statement).count()
    }

    fn answer(&mut self, sql: &str) -> Result<RawOutcome, DriverError> {
        if let Some(index) = self
            .scripted
            .iter()
            .position(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            if let Some((_, outcome)) = self.scripted.remove(index) {
                return outcome;
            }
        }
        if sql.trim_start().to_ascii_uppercase().starts_with("SELECT") {
            Ok(RawOutcome::Rows(Vec::new()))
        } else {
            Ok(RawOutcome::Done)
        }
    }
}

pub type SharedLog = Rc<RefCell<DriverLog>>;

pub fn new_log() -> SharedLog {
    Rc::new(RefCell::new(DriverLog::default()))
}

pub struct FakeDriver {
    log: SharedLog,
    prepared: bool,
}

impl Driver for FakeDriver {
    fn close(&mut self) {
        self.log.borrow_mut().closed = true;
    }

    fn select_db(&mut self, name: &str) -> Result<(), DriverError> {
        if name == "missing" {
            return Err(DriverError::new(format!("Unknown database '{name}'")));
        }
        self.log.borrow_mut().selected.push(name.to_string());
        Ok(())
    }

    fn query(&mut self, sql: &str) -> Result<RawOutcome, DriverError> {
        let mut log = self.log.borrow_mut();
        log.statements.push(sql.to_string());
        log.answer(sql)
    }

    fn supports_prepared(&self) -> bool {
        self.prepared
    }

    fn query_prepared(&mut self, sql: &str, params: &[BoundParam]) -> Result<RawOutcome, DriverError> {
        let mut log = self.log.borrow_mut();
        log.prepared.push((sql.to_string(), params.to_vec()));
        log.answer(sql)
    }

    fn affected_rows(&self) -> u64 {
        self.log.borrow().affected_rows
    }

    fn insert_id(&self) -> u64 {
        self.log.borrow().insert_id
    }
}

pub struct FakeConnector {
    pub log: SharedLog,
    pub prepared: bool,
    pub refuse: Option<String>,
}

impl FakeConnector {
    pub fn new(log: &SharedLog) -> Self {
        Self {
            log: Rc::clone(log),
            prepared: true,
            refuse: None,
        }
    }

    pub fn without_prepared(mut self) -> Self {
        self.prepared = false;
        self
    }

    pub fn refusing(mut self, message: &str) -> Self {
        self.refuse = Some(message.to_string());
        self
    }
}

impl Connector for FakeConnector {
    fn connect(&self, config: &ServerConfig) -> Result<Box<dyn Driver>, DriverError> {
        self.log.borrow_mut().connects.push(config.clone());
        if let Some(message) = &self.refuse {
            return Err(DriverError::new(message.clone()));
        }
        Ok(Box::new(FakeDriver {
            log: Rc::clone(&self.log),
            prepared: self.prepared,
        }))
    }
}

pub fn mysql(log: &SharedLog) -> MysqlAdapter {
    MysqlAdapter::connect(&FakeConnector::new(log), &ServerConfig::default()).unwrap()
}

pub fn mssql(log: &SharedLog) -> MssqlAdapter {
    MssqlAdapter::connect(&FakeConnector::new(log), &ServerConfig::default()).unwrap()
}

pub fn rows(rows: Vec<Row>) -> Result<RawOutcome, DriverError> {
    Ok(RawOutcome::Rows(rows))
}

pub fn widget_row(id: i64, name: &str, value: i64) -> Row {
    Row::new().with("id", id).with("name", name).with("value", value)
}

pub const WIDGET_SCHEMA: &str = "CREATE TABLE widgets (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    value INTEGER NOT NULL CHECK (value >= 0)
)";

/// Domain object that persists itself with plain INSERT/UPDATE/DELETE.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: Option<i64>,
    pub name: String,
    pub value: i64,
    pub deleted: bool,
    pub saves: u32,
}

impl Widget {
    pub fn new(name: &str, value: i64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            value,
            deleted: false,
            saves: 0,
        }
    }
}

impl Record for Widget {
    fn key(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }

    fn save(&mut self, db: &mut dyn DatabaseAdapter) -> bool {
        self.saves += 1;
        let name = db.quote(&SqlValue::from(self.name.as_str()));
        let sql = match (self.id, self.deleted) {
            (None, true) => return true,
            (Some(id), true) => format!("DELETE FROM widgets WHERE id = {id}"),
            (Some(id), false) => format!(
                "UPDATE widgets SET name = {name}, value = {} WHERE id = {id}",
                self.value
            ),
            (None, false) => format!(
                "INSERT INTO widgets (name, value) VALUES ({name}, {})",
                self.value
            ),
        };
        if db.execute(&sql).is_err() {
            return false;
        }
        if self.id.is_none() && !self.deleted {
            self.id = db.last_insert_id().and_then(|id| id.as_i64());
        }
        true
    }
}

impl Descriptor for Widget {
    fn table_name() -> &'static str {
        "widgets"
    }

    fn primary_key_field_names() -> &'static [&'static str] {
        &["id"]
    }

    fn database_name() -> &'static str {
        "main"
    }

    fn from_row(row: &Row) -> Result<Self, RowError> {
        Ok(Self {
            id: row.get_opt_i64("id")?,
            name: row.get_string("name")?,
            value: row.get_i64("value")?,
            deleted: false,
            saves: 0,
        })
    }

    fn accessor(name: &str) -> Option<Accessor<Self>> {
        match name {
            "value" => Some(|widget: &Widget| SqlValue::Int(widget.value)),
            "name" => Some(|widget: &Widget| SqlValue::from(widget.name.as_str())),
            _ => None,
        }
    }
}

/// In-memory object whose save outcome and assigned key are scripted.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub code: Option<String>,
    pub value: i64,
    pub assign_on_save: Option<String>,
    pub succeed: bool,
    pub saves: u32,
}

impl Token {
    pub fn keyed(code: &str, value: i64) -> Self {
        Self {
            code: Some(code.to_string()),
            value,
            assign_on_save: None,
            succeed: true,
            saves: 0,
        }
    }

    pub fn unkeyed(assign_on_save: &str) -> Self {
        Self {
            code: None,
            value: 0,
            assign_on_save: Some(assign_on_save.to_string()),
            succeed: true,
            saves: 0,
        }
    }

    pub fn failing(mut self) -> Self {
        self.succeed = false;
        self
    }
}

impl Record for Token {
    fn key(&self) -> Option<String> {
        self.code.clone()
    }

    fn save(&mut self, _db: &mut dyn DatabaseAdapter) -> bool {
        self.saves += 1;
        if self.succeed && self.code.is_none() {
            self.code = self.assign_on_save.take();
        }
        self.succeed
    }
}

impl Descriptor for Token {
    fn table_name() -> &'static str {
        "tokens"
    }

    fn primary_key_field_names() -> &'static [&'static str] {
        &["code"]
    }

    fn database_name() -> &'static str {
        "main"
    }

    fn from_row(row: &Row) -> Result<Self, RowError> {
        Ok(Self {
            code: row.get_opt_string("code")?,
            value: row.get_i64("value")?,
            assign_on_save: None,
            succeed: true,
            saves: 0,
        })
    }

    fn accessor(name: &str) -> Option<Accessor<Self>> {
        match name {
            "value" => Some(|token: &Token| SqlValue::Int(token.value)),
            _ => None,
        }
    }
}

/// Object keyed by two columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub shelf: i64,
    pub slot: i64,
}

impl Record for Placement {
    fn key(&self) -> Option<String> {
        rowkeep_core::flatten_key(&[SqlValue::Int(self.shelf), SqlValue::Int(self.slot)])
    }

    fn save(&mut self, _db: &mut dyn DatabaseAdapter) -> bool {
        true
    }
}

impl Descriptor for Placement {
    fn table_name() -> &'static str {
        "placements"
    }

    fn primary_key_field_names() -> &'static [&'static str] {
        &["shelf", "slot"]
    }

    fn database_name() -> &'static str {
        "main"
    }

    fn from_row(row: &Row) -> Result<Self, RowError> {
        Ok(Self {
            shelf: row.get_i64("shelf")?,
            slot: row.get_i64("slot")?,
        })
    }
}
