//! Graph store errors.

use thiserror::Error;

/// Failure reported by a [`GraphStore`](crate::store::GraphStore).
///
/// `Rejected` means the store understood the statement and refused it for a
/// reason attributable to the data (constraint violation, type error). Only
/// the item being written fails. `Transport` covers everything else and ends
/// the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Graph store unavailable: {0}")]
    Transport(String),

    #[error("Graph store rejected the statement: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<neo4rs::Error> for StoreError {
    fn from(err: neo4rs::Error) -> Self {
        match &err {
            // Neo.ClientError.Schema.* / Neo.ClientError.Statement.* are caused
            // by the statement or its parameters. Security and request errors
            // are not.
            neo4rs::Error::Neo4j(e)
                if e.code().starts_with("Neo.ClientError.Schema.")
                    || e.code().starts_with("Neo.ClientError.Statement.") =>
            {
                Self::Rejected(format!("{}: {}", e.code(), e.message()))
            }
            _ => Self::Transport(err.to_string()),
        }
    }
}

impl From<neo4rs::DeError> for StoreError {
    fn from(err: neo4rs::DeError) -> Self {
        Self::Transport(format!("Unexpected result shape: {}", err))
    }
}
