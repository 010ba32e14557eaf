use thiserror::Error;
use std::io;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("duplicate key {0}")]
    DuplicateKey(u32),
    #[error("table full")]
    TableFull,
    #[error("tried to fetch page number out of bounds. {page} >= {max}")]
    PageOutOfBounds { page: u32, max: u32 },
    #[error("corrupt database: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type DbResult<T> = Result<T, DbError>;
