use std::io::Write;

use crate::error::DbResult;
use crate::sql::ast::Statement;
use crate::storage::cursor::Cursor;
use crate::storage::table::Table;

/// Run a prepared statement against the table, writing any result rows to
/// `out`. The caller reports the outcome to the user.
pub fn execute_statement(
    table: &mut Table,
    statement: &Statement,
    out: &mut impl Write,
) -> DbResult<()> {
    match statement {
        Statement::Insert(row) => table.insert(row),
        Statement::Select => execute_select(table, out),
    }
}

fn execute_select(table: &mut Table, out: &mut impl Write) -> DbResult<()> {
    let mut cursor = Cursor::table_start(table)?;
    while !cursor.end_of_table {
        let row = cursor.row(table)?;
        writeln!(out, "{row}")?;
        cursor.advance(table)?;
    }
    Ok(())
}
