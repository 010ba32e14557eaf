// Every page is exactly one B+ tree node. Layout (all integers little-endian):
//
// ┌────────┬────────┬──────────────────────────────────────────────────────┐
// │ Offset │ Length │ Common header                                        │
// │────────┼────────┼──────────────────────────────────────────────────────│
// │   0    │   1    │ NODE_TYPE (0 = internal, 1 = leaf)                   │
// │   1    │   1    │ IS_ROOT   (0 = false, 1 = true)                      │
// │   2    │   4    │ PARENT_PAGE (u32), unused on the root                │
// │────────┼────────┼──────────────────────────────────────────────────────│
// │        │        │ Leaf nodes, after the common header                  │
// │   6    │   4    │ NUM_CELLS (u32)                                      │
// │  10    │   4    │ NEXT_LEAF (u32), right sibling page, 0 = none        │
// │  14    │   …    │ cells: key (u32) followed by a serialized row        │
// │────────┼────────┼──────────────────────────────────────────────────────│
// │        │        │ Internal nodes, after the common header              │
// │   6    │   4    │ NUM_KEYS (u32)                                       │
// │  10    │   4    │ RIGHT_CHILD (u32), INVALID_PAGE_NUM while empty      │
// │  14    │   …    │ cells: child page (u32) followed by key (u32)        │
// └────────┴────────┴──────────────────────────────────────────────────────┘

use std::ops::Range;

use crate::error::{DbError, DbResult};
use crate::storage::row::ROW_SIZE;

pub const PAGE_SIZE: usize = 4096;

/// Marker for a child slot that holds no page. Zero cannot serve as the
/// marker because page 0 is the root and therefore a legal child.
pub const INVALID_PAGE_NUM: u32 = u32::MAX;

// Common node header
pub const NODE_TYPE_OFFSET: usize = 0;
pub const NODE_TYPE_SIZE: usize = 1;
pub const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
pub const IS_ROOT_SIZE: usize = 1;
pub const PARENT_POINTER_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;
pub const PARENT_POINTER_SIZE: usize = 4;
pub const COMMON_NODE_HEADER_SIZE: usize = NODE_TYPE_SIZE + IS_ROOT_SIZE + PARENT_POINTER_SIZE;

// Leaf node header
pub const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const LEAF_NODE_NUM_CELLS_SIZE: usize = 4;
pub const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE;
pub const LEAF_NODE_NEXT_LEAF_SIZE: usize = 4;
pub const LEAF_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + LEAF_NODE_NUM_CELLS_SIZE + LEAF_NODE_NEXT_LEAF_SIZE;

// Leaf node body
pub const LEAF_NODE_KEY_SIZE: usize = 4;
pub const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize =
    LEAF_NODE_MAX_CELLS + 1 - LEAF_NODE_RIGHT_SPLIT_COUNT;

// Internal node header
pub const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const INTERNAL_NODE_NUM_KEYS_SIZE: usize = 4;
pub const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize =
    INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE;
pub const INTERNAL_NODE_RIGHT_CHILD_SIZE: usize = 4;
pub const INTERNAL_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + INTERNAL_NODE_NUM_KEYS_SIZE + INTERNAL_NODE_RIGHT_CHILD_SIZE;

// Internal node body
pub const INTERNAL_NODE_CHILD_SIZE: usize = 4;
pub const INTERNAL_NODE_KEY_SIZE: usize = 4;
pub const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;

/// Deliberately tiny so small workloads already exercise the internal split
/// paths. Raise it for realistic fanout.
pub const INTERNAL_NODE_MAX_CELLS: usize = 3;

const NODE_INTERNAL: u8 = 0;
const NODE_LEAF: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal,
    Leaf,
}

fn read_u32(page: &[u8; PAGE_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes(page[offset..offset + 4].try_into().unwrap())
}

fn write_u32(page: &mut [u8; PAGE_SIZE], offset: usize, value: u32) {
    page[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn get_node_type(page: &[u8; PAGE_SIZE]) -> DbResult<NodeType> {
    match page[NODE_TYPE_OFFSET] {
        NODE_INTERNAL => Ok(NodeType::Internal),
        NODE_LEAF => Ok(NodeType::Leaf),
        other => Err(DbError::Corrupt(format!("invalid node type byte {other}"))),
    }
}

pub fn set_node_type(page: &mut [u8; PAGE_SIZE], node_type: NodeType) {
    page[NODE_TYPE_OFFSET] = match node_type {
        NodeType::Internal => NODE_INTERNAL,
        NodeType::Leaf => NODE_LEAF,
    };
}

pub fn is_node_root(page: &[u8; PAGE_SIZE]) -> bool {
    page[IS_ROOT_OFFSET] == 1
}

pub fn set_node_root(page: &mut [u8; PAGE_SIZE], is_root: bool) {
    page[IS_ROOT_OFFSET] = is_root as u8;
}

pub fn get_parent(page: &[u8; PAGE_SIZE]) -> u32 {
    read_u32(page, PARENT_POINTER_OFFSET)
}

pub fn set_parent(page: &mut [u8; PAGE_SIZE], parent: u32) {
    write_u32(page, PARENT_POINTER_OFFSET, parent);
}

// Leaf node accessors

pub fn leaf_num_cells(page: &[u8; PAGE_SIZE]) -> u32 {
    read_u32(page, LEAF_NODE_NUM_CELLS_OFFSET)
}

pub fn set_leaf_num_cells(page: &mut [u8; PAGE_SIZE], num_cells: u32) {
    write_u32(page, LEAF_NODE_NUM_CELLS_OFFSET, num_cells);
}

pub fn leaf_next_leaf(page: &[u8; PAGE_SIZE]) -> u32 {
    read_u32(page, LEAF_NODE_NEXT_LEAF_OFFSET)
}

pub fn set_leaf_next_leaf(page: &mut [u8; PAGE_SIZE], next_leaf: u32) {
    write_u32(page, LEAF_NODE_NEXT_LEAF_OFFSET, next_leaf);
}

/// Byte range of leaf cell `cell_num` (key plus value).
pub fn leaf_cell_range(cell_num: u32) -> Range<usize> {
    let start = LEAF_NODE_HEADER_SIZE + cell_num as usize * LEAF_NODE_CELL_SIZE;
    start..start + LEAF_NODE_CELL_SIZE
}

pub fn leaf_key(page: &[u8; PAGE_SIZE], cell_num: u32) -> u32 {
    read_u32(page, leaf_cell_range(cell_num).start)
}

pub fn set_leaf_key(page: &mut [u8; PAGE_SIZE], cell_num: u32, key: u32) {
    write_u32(page, leaf_cell_range(cell_num).start, key);
}

pub fn leaf_value(page: &[u8; PAGE_SIZE], cell_num: u32) -> &[u8] {
    let cell = leaf_cell_range(cell_num);
    &page[cell.start + LEAF_NODE_KEY_SIZE..cell.end]
}

pub fn leaf_value_mut(page: &mut [u8; PAGE_SIZE], cell_num: u32) -> &mut [u8] {
    let cell = leaf_cell_range(cell_num);
    &mut page[cell.start + LEAF_NODE_KEY_SIZE..cell.end]
}

pub fn initialize_leaf_node(page: &mut [u8; PAGE_SIZE]) {
    set_node_type(page, NodeType::Leaf);
    set_node_root(page, false);
    set_leaf_num_cells(page, 0);
    set_leaf_next_leaf(page, 0);
}

// Internal node accessors

pub fn internal_num_keys(page: &[u8; PAGE_SIZE]) -> u32 {
    read_u32(page, INTERNAL_NODE_NUM_KEYS_OFFSET)
}

pub fn set_internal_num_keys(page: &mut [u8; PAGE_SIZE], num_keys: u32) {
    write_u32(page, INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys);
}

pub fn internal_right_child(page: &[u8; PAGE_SIZE]) -> u32 {
    read_u32(page, INTERNAL_NODE_RIGHT_CHILD_OFFSET)
}

pub fn set_internal_right_child(page: &mut [u8; PAGE_SIZE], right_child: u32) {
    write_u32(page, INTERNAL_NODE_RIGHT_CHILD_OFFSET, right_child);
}

/// Byte range of internal cell `cell_num` (child pointer plus key).
pub fn internal_cell_range(cell_num: u32) -> Range<usize> {
    let start = INTERNAL_NODE_HEADER_SIZE + cell_num as usize * INTERNAL_NODE_CELL_SIZE;
    start..start + INTERNAL_NODE_CELL_SIZE
}

/// Child pointer stored in cell `cell_num`, without the right-child fallback.
pub fn internal_cell_child(page: &[u8; PAGE_SIZE], cell_num: u32) -> u32 {
    read_u32(page, internal_cell_range(cell_num).start)
}

pub fn set_internal_cell_child(page: &mut [u8; PAGE_SIZE], cell_num: u32, child: u32) {
    write_u32(page, internal_cell_range(cell_num).start, child);
}

pub fn internal_key(page: &[u8; PAGE_SIZE], key_num: u32) -> u32 {
    read_u32(page, internal_cell_range(key_num).start + INTERNAL_NODE_CHILD_SIZE)
}

pub fn set_internal_key(page: &mut [u8; PAGE_SIZE], key_num: u32, key: u32) {
    write_u32(page, internal_cell_range(key_num).start + INTERNAL_NODE_CHILD_SIZE, key);
}

/// Child pointer `child_num`, where index `num_keys` means the right child.
/// An unset slot means the tree structure is broken.
pub fn internal_child(page: &[u8; PAGE_SIZE], child_num: u32) -> DbResult<u32> {
    let num_keys = internal_num_keys(page);
    if child_num > num_keys {
        return Err(DbError::Corrupt(format!(
            "tried to access child {child_num} > num_keys {num_keys}"
        )));
    }
    let child = if child_num == num_keys {
        internal_right_child(page)
    } else {
        internal_cell_child(page, child_num)
    };
    if child == INVALID_PAGE_NUM {
        return Err(DbError::Corrupt(format!(
            "child {child_num} of internal node is unset"
        )));
    }
    Ok(child)
}

/// A zeroed page already reads as an empty internal node, but with right
/// child 0 instead of the invalid-page marker; since page 0 is a real page,
/// fresh internal nodes must always be initialized explicitly.
pub fn initialize_internal_node(page: &mut [u8; PAGE_SIZE]) {
    set_node_type(page, NodeType::Internal);
    set_node_root(page, false);
    set_internal_num_keys(page, 0);
    set_internal_right_child(page, INVALID_PAGE_NUM);
}

// Page-local search

/// Smallest cell index whose key is >= `key`, or `num_cells` when every key
/// is smaller. Doubles as the in-order insertion slot.
pub fn leaf_node_find_slot(page: &[u8; PAGE_SIZE], key: u32) -> u32 {
    let mut min_index = 0;
    let mut one_past_max_index = leaf_num_cells(page);
    while one_past_max_index != min_index {
        let index = (min_index + one_past_max_index) / 2;
        let key_at_index = leaf_key(page, index);
        if key == key_at_index {
            return index;
        }
        if key < key_at_index {
            one_past_max_index = index;
        } else {
            min_index = index + 1;
        }
    }
    min_index
}

/// Index of the child that should contain `key`. There is one more child
/// than there are keys, so `num_keys` means the right child.
pub fn internal_node_find_child(page: &[u8; PAGE_SIZE], key: u32) -> u32 {
    let mut min_index = 0;
    let mut max_index = internal_num_keys(page);
    while min_index != max_index {
        let index = (min_index + max_index) / 2;
        if internal_key(page, index) >= key {
            max_index = index;
        } else {
            min_index = index + 1;
        }
    }
    min_index
}

/// Replace the separator that currently reads `old_key` with `new_key`.
pub fn update_internal_node_key(page: &mut [u8; PAGE_SIZE], old_key: u32, new_key: u32) {
    let old_child_index = internal_node_find_child(page, old_key);
    set_internal_key(page, old_child_index, new_key);
}
