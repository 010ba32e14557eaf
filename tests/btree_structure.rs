use ferrodb::storage::cursor::Cursor;
use ferrodb::storage::page::{
    self, INVALID_PAGE_NUM, NodeType, get_node_type, get_parent, internal_child, internal_key,
    internal_num_keys, is_node_root, leaf_key, leaf_next_leaf, leaf_num_cells,
};
use ferrodb::storage::row::Row;
use ferrodb::storage::table::Table;
use tempfile::TempDir;

fn open_table(dir: &TempDir) -> Table {
    Table::open(dir.path().join("test.db").to_str().unwrap()).unwrap()
}

fn row(id: u32) -> Row {
    Row {
        id,
        username: format!("user{id}"),
        email: format!("person{id}@example.com"),
    }
}

fn insert_keys(table: &mut Table, keys: impl IntoIterator<Item = u32>) {
    for id in keys {
        table.insert(&row(id)).unwrap();
    }
}

/// Fixed permutation of 1..=n (stride must be coprime to n).
fn permutation(n: u32, stride: u32) -> Vec<u32> {
    (0..n).map(|i| (i * stride) % n + 1).collect()
}

#[test]
fn thirteen_rows_fit_in_the_root_leaf() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir);
    insert_keys(&mut table, 1..=13);

    let mut expected = String::from("- leaf (size 13)\n");
    for i in 1..=13 {
        expected.push_str(&format!("  - {i}\n"));
    }
    assert_eq!(table.dump_tree().unwrap(), expected);
}

#[test]
fn fourteenth_insert_splits_the_root_leaf() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir);
    insert_keys(&mut table, 1..=14);

    let mut expected = String::from("- internal (size 1)\n  - leaf (size 7)\n");
    for i in 1..=7 {
        expected.push_str(&format!("    - {i}\n"));
    }
    expected.push_str("  - key 7\n  - leaf (size 7)\n");
    for i in 8..=14 {
        expected.push_str(&format!("    - {i}\n"));
    }
    assert_eq!(table.dump_tree().unwrap(), expected);
}

#[test]
fn ascending_inserts_promote_the_root_twice() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir);
    // Four leaf splits fill the root's three key slots; the fifth new leaf
    // forces an internal split and a second promotion.
    insert_keys(&mut table, 1..=35);

    let root = table.pager.get_page(0).unwrap().data;
    assert!(is_node_root(&root));
    assert_eq!(get_node_type(&root).unwrap(), NodeType::Internal);

    // Every child of the root is itself internal: depth three.
    for i in 0..=internal_num_keys(&root) {
        let child_num = internal_child(&root, i).unwrap();
        let child = table.pager.get_page(child_num).unwrap().data;
        assert_eq!(get_node_type(&child).unwrap(), NodeType::Internal);
    }

    let ids: Vec<u32> = scan_ids(&mut table);
    assert_eq!(ids, (1..=35).collect::<Vec<u32>>());
}

#[test]
fn leaf_chain_visits_every_key_in_order() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir);
    insert_keys(&mut table, permutation(120, 77));

    // Walk the sibling chain directly, starting from the leftmost leaf.
    let mut page_num = leftmost_leaf(&mut table);
    let mut seen = Vec::new();
    loop {
        let data = table.pager.get_page(page_num).unwrap().data;
        assert_eq!(get_node_type(&data).unwrap(), NodeType::Leaf);
        for i in 0..leaf_num_cells(&data) {
            seen.push(leaf_key(&data, i));
        }
        match leaf_next_leaf(&data) {
            0 => break,
            next => page_num = next,
        }
    }
    assert_eq!(seen, (1..=120).collect::<Vec<u32>>());
}

#[test]
fn node_invariants_hold_after_deep_splits() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir);
    insert_keys(&mut table, permutation(120, 77));

    let root = table.pager.get_page(0).unwrap().data;
    assert!(is_node_root(&root));
    check_subtree(&mut table, 0, None, None);
}

#[test]
fn root_stays_on_page_zero() {
    let dir = TempDir::new().unwrap();
    let mut table = open_table(&dir);
    insert_keys(&mut table, permutation(120, 91));

    for page_num in 0..table.pager.num_pages() {
        let data = table.pager.get_page(page_num).unwrap().data;
        assert_eq!(is_node_root(&data), page_num == 0, "page {page_num}");
    }
}

fn scan_ids(table: &mut Table) -> Vec<u32> {
    let mut ids = Vec::new();
    let mut cursor = Cursor::table_start(table).unwrap();
    while !cursor.end_of_table {
        ids.push(cursor.row(table).unwrap().id);
        cursor.advance(table).unwrap();
    }
    ids
}

fn leftmost_leaf(table: &mut Table) -> u32 {
    let mut page_num = 0;
    loop {
        let data = table.pager.get_page(page_num).unwrap().data;
        match get_node_type(&data).unwrap() {
            NodeType::Leaf => return page_num,
            NodeType::Internal => page_num = internal_child(&data, 0).unwrap(),
        }
    }
}

/// Recursively verify ordering, separator bounds, and parent links. Returns
/// the subtree's maximum key.
fn check_subtree(
    table: &mut Table,
    page_num: u32,
    expected_parent: Option<u32>,
    upper_bound: Option<u32>,
) -> u32 {
    let data = table.pager.get_page(page_num).unwrap().data;
    if let Some(parent) = expected_parent {
        assert_eq!(get_parent(&data), parent, "parent link of page {page_num}");
    }
    match get_node_type(&data).unwrap() {
        NodeType::Leaf => {
            let num_cells = leaf_num_cells(&data);
            assert!(num_cells > 0, "empty non-root leaf {page_num}");
            for i in 1..num_cells {
                assert!(
                    leaf_key(&data, i - 1) < leaf_key(&data, i),
                    "leaf {page_num} keys out of order"
                );
            }
            let max = leaf_key(&data, num_cells - 1);
            if let Some(bound) = upper_bound {
                assert!(max <= bound, "leaf {page_num} exceeds separator {bound}");
            }
            max
        }
        NodeType::Internal => {
            let num_keys = internal_num_keys(&data);
            assert!(num_keys > 0, "empty internal node {page_num}");
            assert_ne!(page::internal_right_child(&data), INVALID_PAGE_NUM);
            for i in 1..num_keys {
                assert!(
                    internal_key(&data, i - 1) < internal_key(&data, i),
                    "internal {page_num} keys out of order"
                );
            }
            let mut lower = None;
            for i in 0..num_keys {
                let separator = internal_key(&data, i);
                let child = internal_child(&data, i).unwrap();
                let child_max = check_subtree(table, child, Some(page_num), Some(separator));
                assert_eq!(
                    child_max, separator,
                    "separator {i} of page {page_num} is not its child's max"
                );
                if let Some(lower) = lower {
                    assert!(child_max > lower);
                }
                lower = Some(separator);
            }
            let right = internal_child(&data, num_keys).unwrap();
            let right_max = check_subtree(table, right, Some(page_num), upper_bound);
            assert!(
                right_max > internal_key(&data, num_keys - 1),
                "right child of page {page_num} not above the last separator"
            );
            right_max
        }
    }
}
