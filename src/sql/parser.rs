use thiserror::Error;

use crate::sql::ast::Statement;
use crate::storage::row::{COLUMN_EMAIL_SIZE, COLUMN_USERNAME_SIZE, Row};

/// Preparation failure. The `Display` strings are the exact messages the
/// REPL prints.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrepareError {
    #[error("Syntax error. Could not parse statement.")]
    Syntax,
    #[error("ID must be positive.")]
    NegativeId,
    #[error("String is too long.")]
    StringTooLong,
    #[error("Unrecognized keyword at start of '{0}'")]
    Unrecognized(String),
}

/// Prepare one input line into a statement.
pub fn parse_statement(input: &str) -> Result<Statement, PrepareError> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    match tokens.first() {
        Some(&"insert") => prepare_insert(&tokens),
        Some(&"select") if tokens.len() == 1 => Ok(Statement::Select),
        _ => Err(PrepareError::Unrecognized(input.to_string())),
    }
}

fn prepare_insert(tokens: &[&str]) -> Result<Statement, PrepareError> {
    let [_, id, username, email] = tokens else {
        return Err(PrepareError::Syntax);
    };
    let id: i64 = id.parse().map_err(|_| PrepareError::Syntax)?;
    if id < 0 {
        return Err(PrepareError::NegativeId);
    }
    let id = u32::try_from(id).map_err(|_| PrepareError::Syntax)?;
    if username.len() > COLUMN_USERNAME_SIZE || email.len() > COLUMN_EMAIL_SIZE {
        return Err(PrepareError::StringTooLong);
    }
    Ok(Statement::Insert(Row {
        id,
        username: username.to_string(),
        email: email.to_string(),
    }))
}
