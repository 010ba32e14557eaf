//! B+ tree operations over the page cache.
//!
//! Leaves hold `(key, row)` cells and chain to their right sibling; internal
//! nodes hold `(child, key)` cells where each key is the maximum key in its
//! left subtree, plus a rightmost child. Page 0 is always the root: when the
//! root fills up, its contents are demoted into a fresh page and page 0 is
//! rebuilt as an internal node over the two halves.

use log::debug;

use crate::error::{DbError, DbResult};
use crate::storage::cursor::Cursor;
use crate::storage::page::{
    INTERNAL_NODE_CELL_SIZE, INTERNAL_NODE_MAX_CELLS, INVALID_PAGE_NUM, LEAF_NODE_CELL_SIZE,
    LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS, LEAF_NODE_RIGHT_SPLIT_COUNT, NodeType,
    PAGE_SIZE, get_node_type, get_parent, initialize_internal_node, initialize_leaf_node,
    internal_cell_child, internal_cell_range, internal_child, internal_key, internal_node_find_child,
    internal_num_keys, internal_right_child, is_node_root, leaf_cell_range, leaf_key,
    leaf_next_leaf, leaf_num_cells, leaf_value_mut, set_internal_cell_child, set_internal_key,
    set_internal_num_keys, set_internal_right_child, set_leaf_key, set_leaf_next_leaf,
    set_leaf_num_cells, set_node_root, set_parent, update_internal_node_key,
};
use crate::storage::pager::TABLE_MAX_PAGES;
use crate::storage::row::Row;
use crate::storage::table::Table;

impl Table {
    /// Insert a row keyed by its id. Duplicate keys are rejected before any
    /// page is modified.
    pub fn insert(&mut self, row: &Row) -> DbResult<()> {
        let key = row.id;
        let cursor = Cursor::table_find(self, key)?;

        let page = self.pager.get_page(cursor.page_num)?;
        let num_cells = leaf_num_cells(&page.data);
        if cursor.cell_num < num_cells && leaf_key(&page.data, cursor.cell_num) == key {
            return Err(DbError::DuplicateKey(key));
        }

        self.leaf_node_insert(&cursor, key, row)
    }

    fn leaf_node_insert(&mut self, cursor: &Cursor, key: u32, row: &Row) -> DbResult<()> {
        let num_cells = leaf_num_cells(&self.pager.get_page(cursor.page_num)?.data);
        if num_cells as usize >= LEAF_NODE_MAX_CELLS {
            return self.leaf_node_split_and_insert(cursor, key, row);
        }

        let data = &mut self.pager.get_page(cursor.page_num)?.data;
        if cursor.cell_num < num_cells {
            // Shift cells right to open the slot.
            let start = leaf_cell_range(cursor.cell_num).start;
            let end = leaf_cell_range(num_cells - 1).end;
            data.copy_within(start..end, start + LEAF_NODE_CELL_SIZE);
        }
        set_leaf_num_cells(data, num_cells + 1);
        set_leaf_key(data, cursor.cell_num, key);
        row.serialize(leaf_value_mut(data, cursor.cell_num));
        Ok(())
    }

    /// Split a full leaf around the incoming cell: the upper half of the
    /// combined ordering moves to a fresh right sibling, which is spliced
    /// into the leaf chain and handed to the parent.
    fn leaf_node_split_and_insert(&mut self, cursor: &Cursor, key: u32, row: &Row) -> DbResult<()> {
        self.reserve_split_pages(cursor.page_num)?;

        let old_max = self.node_max_key(cursor.page_num)?;
        let new_page_num = self.pager.get_unused_page_num()?;
        self.pager.get_page(new_page_num)?;
        debug!("splitting leaf page {} into page {}", cursor.page_num, new_page_num);

        let old = self.pager.get_page(cursor.page_num)?.data;
        let mut left = old;
        let mut right = [0u8; PAGE_SIZE];
        initialize_leaf_node(&mut right);
        set_parent(&mut right, get_parent(&old));
        set_leaf_next_leaf(&mut right, leaf_next_leaf(&old));
        set_leaf_next_leaf(&mut left, new_page_num);

        // Redistribute all existing cells plus the incoming one, walking the
        // combined ordering from the top so the shift past the insertion
        // point happens in the same pass.
        let insert_at = cursor.cell_num as usize;
        for i in (0..=LEAF_NODE_MAX_CELLS).rev() {
            let (destination, index_within_node) = if i >= LEAF_NODE_LEFT_SPLIT_COUNT {
                (&mut right, (i - LEAF_NODE_LEFT_SPLIT_COUNT) as u32)
            } else {
                (&mut left, i as u32)
            };
            if i == insert_at {
                set_leaf_key(destination, index_within_node, key);
                row.serialize(leaf_value_mut(destination, index_within_node));
            } else {
                let source = if i > insert_at { i - 1 } else { i } as u32;
                destination[leaf_cell_range(index_within_node)]
                    .copy_from_slice(&old[leaf_cell_range(source)]);
            }
        }
        set_leaf_num_cells(&mut left, LEAF_NODE_LEFT_SPLIT_COUNT as u32);
        set_leaf_num_cells(&mut right, LEAF_NODE_RIGHT_SPLIT_COUNT as u32);

        self.pager.get_page(cursor.page_num)?.data = left;
        self.pager.get_page(new_page_num)?.data = right;

        if is_node_root(&old) {
            self.create_new_root(new_page_num)
        } else {
            let parent_page_num = get_parent(&old);
            let new_max = self.node_max_key(cursor.page_num)?;
            let parent = &mut self.pager.get_page(parent_page_num)?.data;
            update_internal_node_key(parent, old_max, new_max);
            self.internal_node_insert(parent_page_num, new_page_num)
        }
    }

    /// A split can cascade: one fresh leaf, one fresh internal node per
    /// contiguous full ancestor, and one more page when the chain reaches the
    /// root (whose contents are demoted into a fresh page). Refuse up front
    /// if the page cap cannot cover the worst case, so a failed insert never
    /// leaves a half-split tree behind.
    fn reserve_split_pages(&mut self, leaf_page_num: u32) -> DbResult<()> {
        let mut needed: u32 = 1;
        let mut page_num = leaf_page_num;
        loop {
            let page = self.pager.get_page(page_num)?;
            if is_node_root(&page.data) {
                needed += 1;
                break;
            }
            let parent_page_num = get_parent(&page.data);
            let parent = self.pager.get_page(parent_page_num)?;
            if internal_num_keys(&parent.data) as usize >= INTERNAL_NODE_MAX_CELLS {
                needed += 1;
                page_num = parent_page_num;
            } else {
                break;
            }
        }
        if self.pager.num_pages() + needed > TABLE_MAX_PAGES as u32 {
            return Err(DbError::TableFull);
        }
        Ok(())
    }

    /// Replace the root in place. Page 0 must stay the root, so its current
    /// contents move to a fresh page (the left half) and page 0 is
    /// reinitialized as an internal node over the two halves.
    pub(crate) fn create_new_root(&mut self, right_child_page_num: u32) -> DbResult<()> {
        let root = self.pager.get_page(self.root_page_num)?.data;
        let left_child_page_num = self.pager.get_unused_page_num()?;
        self.pager.get_page(left_child_page_num)?;
        debug!(
            "promoting root: left half moves to page {}, right sibling is page {}",
            left_child_page_num, right_child_page_num
        );

        let root_was_internal = get_node_type(&root)? == NodeType::Internal;
        if root_was_internal {
            // Splitting an internal root: the right sibling page is still
            // untyped at this point.
            initialize_internal_node(&mut self.pager.get_page(right_child_page_num)?.data);
        }

        let mut left = root;
        set_node_root(&mut left, false);
        self.pager.get_page(left_child_page_num)?.data = left;

        if root_was_internal {
            // The demoted half keeps its children; repoint them at it.
            for i in 0..=internal_num_keys(&left) {
                let child_page_num = internal_child(&left, i)?;
                set_parent(
                    &mut self.pager.get_page(child_page_num)?.data,
                    left_child_page_num,
                );
            }
        }

        let left_max = self.node_max_key(left_child_page_num)?;
        let root_page_num = self.root_page_num;
        let data = &mut self.pager.get_page(root_page_num)?.data;
        initialize_internal_node(data);
        set_node_root(data, true);
        set_internal_num_keys(data, 1);
        set_internal_cell_child(data, 0, left_child_page_num);
        set_internal_key(data, 0, left_max);
        set_internal_right_child(data, right_child_page_num);
        set_parent(&mut self.pager.get_page(left_child_page_num)?.data, root_page_num);
        set_parent(&mut self.pager.get_page(right_child_page_num)?.data, root_page_num);
        Ok(())
    }

    /// Add `child_page_num` under `parent_page_num`, keyed by the child's
    /// maximum key, and repoint the child's parent link. Splits the parent
    /// when it is already at capacity.
    fn internal_node_insert(&mut self, parent_page_num: u32, child_page_num: u32) -> DbResult<()> {
        let child_max = self.node_max_key(child_page_num)?;
        let (index, original_num_keys, right_child_page_num) = {
            let parent = &self.pager.get_page(parent_page_num)?.data;
            (
                internal_node_find_child(parent, child_max),
                internal_num_keys(parent),
                internal_right_child(parent),
            )
        };

        if original_num_keys as usize >= INTERNAL_NODE_MAX_CELLS {
            return self.internal_node_split_and_insert(parent_page_num, child_page_num);
        }

        if right_child_page_num == INVALID_PAGE_NUM {
            // Freshly initialized node: the first child becomes the right
            // child, with no key yet.
            set_internal_right_child(
                &mut self.pager.get_page(parent_page_num)?.data,
                child_page_num,
            );
            set_parent(&mut self.pager.get_page(child_page_num)?.data, parent_page_num);
            return Ok(());
        }

        let right_max = self.node_max_key(right_child_page_num)?;
        let parent = &mut self.pager.get_page(parent_page_num)?.data;
        set_internal_num_keys(parent, original_num_keys + 1);
        if child_max > right_max {
            // New rightmost child: demote the old right child into the cells.
            set_internal_cell_child(parent, original_num_keys, right_child_page_num);
            set_internal_key(parent, original_num_keys, right_max);
            set_internal_right_child(parent, child_page_num);
        } else {
            if index < original_num_keys {
                // Shift cells right to open the slot.
                let start = internal_cell_range(index).start;
                let end = internal_cell_range(original_num_keys - 1).end;
                parent.copy_within(start..end, start + INTERNAL_NODE_CELL_SIZE);
            }
            set_internal_cell_child(parent, index, child_page_num);
            set_internal_key(parent, index, child_max);
        }
        set_parent(&mut self.pager.get_page(child_page_num)?.data, parent_page_num);
        Ok(())
    }

    /// Split a full internal node. The old right child migrates into the new
    /// node first, then the upper half of the cells; the key left of the
    /// split point is absorbed by becoming the left half's right-child
    /// pointer. Splitting the root goes through `create_new_root` and rebinds
    /// the left half to the demoted copy.
    fn internal_node_split_and_insert(
        &mut self,
        parent_page_num: u32,
        child_page_num: u32,
    ) -> DbResult<()> {
        let mut old_page_num = parent_page_num;
        let old_max = self.node_max_key(old_page_num)?;
        let child_max = self.node_max_key(child_page_num)?;

        let new_page_num = self.pager.get_unused_page_num()?;
        self.pager.get_page(new_page_num)?;
        let splitting_root = is_node_root(&self.pager.get_page(old_page_num)?.data);
        debug!("splitting internal page {} into page {}", old_page_num, new_page_num);

        let grandparent_page_num = if splitting_root {
            self.create_new_root(new_page_num)?;
            // The former root's cells now live in child 0 of the fresh root;
            // that copy is the half being split.
            old_page_num = internal_child(&self.pager.get_page(self.root_page_num)?.data, 0)?;
            self.root_page_num
        } else {
            let grandparent = get_parent(&self.pager.get_page(old_page_num)?.data);
            initialize_internal_node(&mut self.pager.get_page(new_page_num)?.data);
            grandparent
        };

        // Move the old right child over first, then the upper cells.
        let old_right_child = internal_right_child(&self.pager.get_page(old_page_num)?.data);
        if old_right_child != INVALID_PAGE_NUM {
            self.internal_node_insert(new_page_num, old_right_child)?;
        }
        set_internal_right_child(
            &mut self.pager.get_page(old_page_num)?.data,
            INVALID_PAGE_NUM,
        );

        for i in (INTERNAL_NODE_MAX_CELLS / 2 + 1..INTERNAL_NODE_MAX_CELLS).rev() {
            let moved_page_num = internal_cell_child(&self.pager.get_page(old_page_num)?.data, i as u32);
            self.internal_node_insert(new_page_num, moved_page_num)?;

            let data = &mut self.pager.get_page(old_page_num)?.data;
            let num_keys = internal_num_keys(data);
            set_internal_num_keys(data, num_keys - 1);
        }

        // Absorb the key left of the split point: its child becomes the left
        // half's right-child pointer.
        {
            let data = &mut self.pager.get_page(old_page_num)?.data;
            let num_keys = internal_num_keys(data);
            set_internal_right_child(data, internal_cell_child(data, num_keys - 1));
            set_internal_num_keys(data, num_keys - 1);
        }

        let destination_page_num = if child_max < self.node_max_key(old_page_num)? {
            old_page_num
        } else {
            new_page_num
        };
        self.internal_node_insert(destination_page_num, child_page_num)?;

        let old_max_after = self.node_max_key(old_page_num)?;
        update_internal_node_key(
            &mut self.pager.get_page(grandparent_page_num)?.data,
            old_max,
            old_max_after,
        );

        if !splitting_root {
            let old_parent = get_parent(&self.pager.get_page(old_page_num)?.data);
            self.internal_node_insert(old_parent, new_page_num)?;
        }
        Ok(())
    }

    /// Largest key in the subtree rooted at `page_num`, found by following
    /// right children down to a leaf.
    pub(crate) fn node_max_key(&mut self, mut page_num: u32) -> DbResult<u32> {
        loop {
            let page = self.pager.get_page(page_num)?;
            match get_node_type(&page.data)? {
                NodeType::Leaf => {
                    let num_cells = leaf_num_cells(&page.data);
                    return Ok(if num_cells == 0 {
                        0
                    } else {
                        leaf_key(&page.data, num_cells - 1)
                    });
                }
                NodeType::Internal => {
                    let right_child = internal_right_child(&page.data);
                    if right_child == INVALID_PAGE_NUM {
                        return Err(DbError::Corrupt(format!(
                            "internal page {page_num} has no right child"
                        )));
                    }
                    page_num = right_child;
                }
            }
        }
    }

    /// Render the tree depth-first with a two-space indent per level (the
    /// `.btree` meta-command output).
    pub fn dump_tree(&mut self) -> DbResult<String> {
        let mut out = String::new();
        let root_page_num = self.root_page_num;
        self.dump_node(root_page_num, 0, &mut out)?;
        Ok(out)
    }

    fn dump_node(&mut self, page_num: u32, depth: usize, out: &mut String) -> DbResult<()> {
        let data = self.pager.get_page(page_num)?.data;
        let pad = "  ".repeat(depth);
        match get_node_type(&data)? {
            NodeType::Leaf => {
                let num_cells = leaf_num_cells(&data);
                out.push_str(&format!("{pad}- leaf (size {num_cells})\n"));
                for i in 0..num_cells {
                    out.push_str(&format!("{pad}  - {}\n", leaf_key(&data, i)));
                }
            }
            NodeType::Internal => {
                let num_keys = internal_num_keys(&data);
                out.push_str(&format!("{pad}- internal (size {num_keys})\n"));
                if num_keys > 0 {
                    for i in 0..num_keys {
                        self.dump_node(internal_child(&data, i)?, depth + 1, out)?;
                        out.push_str(&format!("{pad}  - key {}\n", internal_key(&data, i)));
                    }
                    self.dump_node(internal_child(&data, num_keys)?, depth + 1, out)?;
                }
            }
        }
        Ok(())
    }
}
