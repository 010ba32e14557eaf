use std::env;
use std::io::{self, Write};
use std::process;

use ferrodb::error::{DbError, DbResult};
use ferrodb::execution::execute_statement;
use ferrodb::sql::parser::parse_statement;
use ferrodb::storage::page::{
    COMMON_NODE_HEADER_SIZE, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_MAX_CELLS,
    LEAF_NODE_SPACE_FOR_CELLS,
};
use ferrodb::storage::row::ROW_SIZE;
use ferrodb::storage::table::Table;

fn main() {
    env_logger::init();

    let Some(filename) = env::args().nth(1) else {
        eprintln!("Must supply a database filename.");
        process::exit(1);
    };

    if let Err(e) = repl(&filename) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn repl(filename: &str) -> DbResult<()> {
    let mut table = Table::open(filename)?;
    let stdin = io::stdin();

    loop {
        print!("Sup boy>");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            // EOF without `.exit` counts as a failed read; nothing is flushed.
            return Err(DbError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of input",
            )));
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('.') {
            if do_meta_command(input, &mut table)? {
                return Ok(());
            }
            continue;
        }

        let statement = match parse_statement(input) {
            Ok(statement) => statement,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match execute_statement(&mut table, &statement, &mut io::stdout()) {
            Ok(()) => println!("Executed."),
            Err(DbError::DuplicateKey(_)) => println!("Error: Duplicate key."),
            Err(DbError::TableFull) => println!("Error: Table full."),
            Err(e) => return Err(e),
        }
    }
}

/// Handle a `.`-prefixed command. Returns true when the session should end.
fn do_meta_command(input: &str, table: &mut Table) -> DbResult<bool> {
    match input {
        ".exit" => {
            table.close()?;
            Ok(true)
        }
        ".constants" => {
            println!("Constants:");
            println!("ROW_SIZE: {ROW_SIZE}");
            println!("COMMON_NODE_HEADER_SIZE: {COMMON_NODE_HEADER_SIZE}");
            println!("LEAF_NODE_HEADER_SIZE: {LEAF_NODE_HEADER_SIZE}");
            println!("LEAF_NODE_CELL_SIZE: {LEAF_NODE_CELL_SIZE}");
            println!("LEAF_NODE_SPACE_FOR_CELLS: {LEAF_NODE_SPACE_FOR_CELLS}");
            println!("LEAF_NODE_MAX_CELLS: {LEAF_NODE_MAX_CELLS}");
            Ok(false)
        }
        ".btree" => {
            println!("Tree:");
            print!("{}", table.dump_tree()?);
            Ok(false)
        }
        _ => {
            println!("Unrecognized command '{input}'");
            Ok(false)
        }
    }
}
