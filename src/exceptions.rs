use std::error::Error as StdError;

use serde_json::Value;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter};
use thiserror::Error;
use tracing::debug;

use crate::properties::PropertyPathError;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T, E = OrmError> = std::result::Result<T, E>;

/// Database error classes, named after the DB-API exception hierarchy
///
/// Declared from most generic to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, AsRefStr, Display)]
pub enum DatabaseErrorKind {
    #[strum(serialize = "Error")]
    Error,
    #[strum(serialize = "Warning")]
    Warning,
    #[strum(serialize = "InterfaceError")]
    Interface,
    #[strum(serialize = "DatabaseError")]
    Database,
    #[strum(serialize = "InternalError")]
    Internal,
    #[strum(serialize = "OperationalError")]
    Operational,
    #[strum(serialize = "ProgrammingError")]
    Programming,
    #[strum(serialize = "IntegrityError")]
    Integrity,
    #[strum(serialize = "DataError")]
    Data,
    #[strum(serialize = "NotSupportedError")]
    NotSupported,
}

impl DatabaseErrorKind {
    pub fn parent(self) -> Option<Self> {
        use DatabaseErrorKind::*;
        match self {
            Error | Warning => None,
            Interface | Database => Some(Error),
            Internal | Operational | Programming | Integrity | Data | NotSupported => {
                Some(Database)
            }
        }
    }

    /// Whether `self` is `other` or one of its descendants
    pub fn is_a(self, other: Self) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
pub enum StoreErrorKind {
    #[strum(serialize = "WrongStoreError")]
    WrongStore,
    #[strum(serialize = "NotFlushedError")]
    NotFlushed,
    #[strum(serialize = "OrderLoopError")]
    OrderLoop,
    #[strum(serialize = "NotOneError")]
    NotOne,
    #[strum(serialize = "UnorderedError")]
    Unordered,
    #[strum(serialize = "LostObjectError")]
    LostObject,
}

/// Unified error taxonomy for the mapping layer
#[derive(Debug, Error)]
pub enum OrmError {
    #[error("Compile error: {0}")]
    Compile(String),

    #[error("No table: {0}")]
    NoTable(String),

    #[error("Expression error: {0}")]
    Expr(String),

    #[error("{0}")]
    NoneValue(String),

    #[error(transparent)]
    PropertyPath(#[from] PropertyPathError),

    #[error("Class info error: {0}")]
    ClassInfo(String),

    #[error("Invalid URI: {0}")]
    Uri(String),

    #[error("Closed: {0}")]
    Closed(String),

    #[error("Feature not supported: {0}")]
    Feature(String),

    #[error("Database module error: {0}")]
    DatabaseModule(String),

    #[error("{kind}: {message}")]
    Store {
        kind: StoreErrorKind,
        message: String,
    },

    #[error("No store: {0}")]
    NoStore(String),

    #[error("{kind}: {source}")]
    Database {
        kind: DatabaseErrorKind,
        /// Operational error caused by a lost connection
        disconnection: bool,
        source: BoxError,
    },

    #[error("{}", timeout_message(.message, .statement, .params))]
    Timeout {
        statement: Option<String>,
        params: Option<Vec<Value>>,
        message: Option<String>,
    },

    #[error("Connection blocked: {0}")]
    ConnectionBlocked(String),

    #[error("Invalid value: {0}")]
    Value(String),

    /// A driver error that maps to no known class
    #[error("Driver error: {0}")]
    Driver(#[source] BoxError),
}

impl OrmError {
    pub fn store(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        OrmError::Store {
            kind,
            message: message.into(),
        }
    }

    pub fn database_kind(&self) -> Option<DatabaseErrorKind> {
        match self {
            OrmError::Database { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_disconnection(&self) -> bool {
        matches!(
            self,
            OrmError::Database {
                disconnection: true,
                ..
            }
        )
    }
}

fn timeout_message(
    message: &Option<String>,
    statement: &Option<String>,
    params: &Option<Vec<Value>>,
) -> String {
    let mut parts = Vec::new();
    if let Some(message) = message {
        parts.push(quote(message));
    }
    if let Some(statement) = statement {
        parts.push(quote(statement));
    }
    if let Some(params) = params {
        parts.push(format!("[{}]", render_values(params)));
    }
    parts.join(", ")
}

/// Single-quoted literal form used in timeout messages
fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn render_values(values: &[Value]) -> String {
    values.iter().map(render_value).collect::<Vec<_>>().join(", ")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => format!("[{}]", render_values(items)),
        Value::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), render_value(v)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
    }
}

/// An error raised by a database driver
pub trait DriverError: StdError + Send + Sync + 'static {
    /// DB-API class names this error is an instance of, its own class
    /// included. Empty when the driver does not expose its error classes.
    fn dbapi_classes(&self) -> &[&str];

    /// Whether the error signals a lost connection
    fn is_disconnection(&self) -> bool {
        false
    }
}

/// Translates a driver error into the matching [`OrmError::Database`]
///
/// The most specific matching class wins. Errors that match no class are
/// returned as [`OrmError::Driver`].
pub fn wrap_driver_error<E: DriverError>(err: E) -> OrmError {
    let kind = {
        let classes = err.dbapi_classes();
        DatabaseErrorKind::iter()
            .rev()
            .find(|kind| {
                let name: &str = kind.as_ref();
                classes.iter().any(|class| *class == name)
            })
    };

    match kind {
        Some(kind) => {
            let disconnection = err.is_disconnection() && kind.is_a(DatabaseErrorKind::Operational);
            debug!(kind = %kind, disconnection, "Translated driver error");
            OrmError::Database {
                kind,
                disconnection,
                source: Box::new(err),
            }
        }
        None => {
            debug!(error = %err, "Driver error left untranslated");
            OrmError::Driver(Box::new(err))
        }
    }
}
