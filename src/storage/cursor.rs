use crate::error::DbResult;
use crate::storage::page::{
    NodeType, get_node_type, internal_child, internal_node_find_child, leaf_next_leaf,
    leaf_node_find_slot, leaf_num_cells, leaf_value,
};
use crate::storage::row::Row;
use crate::storage::table::Table;

/// A position within the table: always a leaf page plus a cell slot. Cursors
/// hold raw page numbers and re-fetch the page on every access, so a cursor
/// stays meaningful only until the next operation that can split a node.
pub struct Cursor {
    pub page_num: u32,
    pub cell_num: u32,
    /// One past the last row.
    pub end_of_table: bool,
}

impl Cursor {
    /// Position at the first row in key order.
    pub fn table_start(table: &mut Table) -> DbResult<Cursor> {
        let mut cursor = Cursor::table_find(table, 0)?;
        let page = table.pager.get_page(cursor.page_num)?;
        cursor.end_of_table = leaf_num_cells(&page.data) == 0;
        Ok(cursor)
    }

    /// Find the position of `key`; if the key is absent, the slot where it
    /// would be inserted.
    pub fn table_find(table: &mut Table, key: u32) -> DbResult<Cursor> {
        let root_page_num = table.root_page_num;
        let root = table.pager.get_page(root_page_num)?;
        match get_node_type(&root.data)? {
            NodeType::Leaf => Cursor::leaf_node_find(table, root_page_num, key),
            NodeType::Internal => Cursor::internal_node_find(table, root_page_num, key),
        }
    }

    fn leaf_node_find(table: &mut Table, page_num: u32, key: u32) -> DbResult<Cursor> {
        let page = table.pager.get_page(page_num)?;
        let cell_num = leaf_node_find_slot(&page.data, key);
        Ok(Cursor {
            page_num,
            cell_num,
            end_of_table: false,
        })
    }

    fn internal_node_find(table: &mut Table, mut page_num: u32, key: u32) -> DbResult<Cursor> {
        loop {
            let page = table.pager.get_page(page_num)?;
            let child_index = internal_node_find_child(&page.data, key);
            let child_num = internal_child(&page.data, child_index)?;
            let child = table.pager.get_page(child_num)?;
            match get_node_type(&child.data)? {
                NodeType::Leaf => return Cursor::leaf_node_find(table, child_num, key),
                NodeType::Internal => page_num = child_num,
            }
        }
    }

    /// Read the row under the cursor.
    pub fn row(&self, table: &mut Table) -> DbResult<Row> {
        let page = table.pager.get_page(self.page_num)?;
        Ok(Row::deserialize(leaf_value(&page.data, self.cell_num)))
    }

    /// Step to the next cell, following the leaf sibling chain. A next-leaf
    /// pointer of 0 marks the rightmost leaf.
    pub fn advance(&mut self, table: &mut Table) -> DbResult<()> {
        let page = table.pager.get_page(self.page_num)?;
        self.cell_num += 1;
        if self.cell_num >= leaf_num_cells(&page.data) {
            let next_page_num = leaf_next_leaf(&page.data);
            if next_page_num == 0 {
                self.end_of_table = true;
            } else {
                self.page_num = next_page_num;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}
