use log::info;

use crate::error::DbResult;
use crate::storage::page::{initialize_leaf_node, set_node_root};
use crate::storage::pager::Pager;

/// The single table backing a database file. Page 0 is always the tree root.
pub struct Table {
    pub root_page_num: u32,
    pub pager: Pager,
}

impl Table {
    /// Open (or create) the database file. A brand-new file gets page 0
    /// initialized as an empty root leaf.
    pub fn open(filename: &str) -> DbResult<Table> {
        let mut pager = Pager::open(filename)?;

        if pager.num_pages() == 0 {
            let page = pager.get_page(0)?;
            initialize_leaf_node(&mut page.data);
            set_node_root(&mut page.data, true);
        }

        info!("opened database {} ({} pages)", filename, pager.num_pages());
        Ok(Table {
            root_page_num: 0,
            pager,
        })
    }

    /// Flush every resident page. Durability is flush-on-clean-shutdown only:
    /// a process that terminates before `close` loses everything written
    /// since the previous close.
    pub fn close(&mut self) -> DbResult<()> {
        self.pager.flush_all()
    }
}
