//! Data Manager - item storage over the page store and the log.
//!
//! The [`DataManager`] owns:
//! - The [`PageStore`] and page 1's shutdown stamps
//! - The [`Wal`], written before every page mutation
//! - The [`FreeSpaceIndex`], rebuilt from page headers on open
//! - A cache of [`DataItem`]s, each pinning its page

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::buffer::{CacheStats, ObjectCache, PageFrame, PageStore};
use crate::common::config::INSERT_RETRIES;
use crate::common::{Config, Error, ItemId, PageNo, Result, Tid};
use crate::concurrency::TidManager;
use crate::data::data_item::{wrap_raw, DataItem};
use crate::recovery::{recover, LogRecord, Wal};
use crate::storage::page::data_page::MAX_FREE_SPACE;
use crate::storage::page::Page;
use crate::storage::{FreeSpaceIndex, PageSpace};

/// Stores variable-length items in data pages.
///
/// # Write Ordering
/// An insert is logged (and fsynced) before the page is touched. In-place
/// edits go through [`DataItem::edit`], which logs both images on commit.
///
/// # Usage
/// ```ignore
/// let dm = DataManager::create(&db_path, &log_path, &config)?;
/// let id = dm.insert(tid, b"hello")?;
///
/// if let Some(item) = dm.read(id)? {
///     assert_eq!(item.data(), b"hello");
///     dm.release(id)?;
/// }
/// ```
pub struct DataManager {
    pages: PageStore,
    wal: Arc<Wal>,
    free_space: FreeSpaceIndex,
    items: ObjectCache<ItemId, DataItem>,
    /// Page 1, held for the whole session.
    page_one: Arc<PageFrame>,
}

impl DataManager {
    /// Create the page and log files. Page 1 is written with a fresh open
    /// stamp, so the store reads as unclean until [`close`](Self::close).
    pub fn create(db_path: &Path, log_path: &Path, config: &Config) -> Result<Self> {
        let pages = PageStore::create(db_path, config.page_capacity())?;
        let wal = Arc::new(Wal::create(log_path)?);

        let page_no = pages.new_page(&Page::new_page_one())?;
        debug_assert_eq!(page_no, PageNo::ONE);
        let page_one = pages.obtain_page(PageNo::ONE)?;

        info!(path = %db_path.display(), "data manager created");
        Ok(Self::new(pages, wal, page_one, config))
    }

    /// Open existing page and log files.
    ///
    /// If page 1's stamps disagree the last session crashed, and the log is
    /// replayed with [`recover`] before anything else reads the pages.
    pub fn open(db_path: &Path, log_path: &Path, config: &Config, tm: &TidManager) -> Result<Self> {
        let pages = PageStore::open(db_path, config.page_capacity())?;
        let wal = Arc::new(Wal::open(log_path)?);
        let page_one = pages.obtain_page(PageNo::ONE)?;

        let clean = page_one.read().stamps_match();
        if !clean {
            warn!(path = %db_path.display(), "unclean shutdown detected, recovering");
            recover(&pages, &wal, tm)?;
        }

        page_one.write().set_open_stamp();
        pages.flush_page(&page_one)?;

        let dm = Self::new(pages, wal, page_one, config);
        dm.fill_free_space()?;

        info!(
            path = %db_path.display(),
            pages = dm.pages.page_count(),
            clean,
            "data manager opened"
        );
        Ok(dm)
    }

    fn new(pages: PageStore, wal: Arc<Wal>, page_one: Arc<PageFrame>, config: &Config) -> Self {
        Self {
            pages,
            wal,
            free_space: FreeSpaceIndex::new(),
            items: ObjectCache::new(config.item_cache_capacity),
            page_one,
        }
    }

    /// Index every data page by the free space its header reports.
    fn fill_free_space(&self) -> Result<()> {
        for no in 2..=self.pages.page_count() {
            let page_no = PageNo::new(no);
            let guard = self.pages.fetch(page_no)?;
            let free = guard.read().free_space();
            guard.release()?;
            self.free_space.add(page_no, free);
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Insert
    // ========================================================================

    /// Store `payload` as a new item written by `tid`.
    ///
    /// # Errors
    /// - `Error::DataTooLarge` if the wrapped item exceeds an empty page
    /// - `Error::DatabaseBusy` if no page could be claimed within the retry bound
    pub fn insert(&self, tid: Tid, payload: &[u8]) -> Result<ItemId> {
        let raw = wrap_raw(payload);
        if raw.len() > MAX_FREE_SPACE {
            return Err(Error::DataTooLarge {
                size: raw.len(),
                max: MAX_FREE_SPACE,
            });
        }

        let space = self.claim_page(raw.len())?;
        let guard = match self.pages.fetch(space.page_no) {
            Ok(guard) => guard,
            Err(e) => {
                self.free_space.add(space.page_no, space.free);
                return Err(e);
            }
        };

        let placed = {
            let mut page = guard.write();
            let id = ItemId::new(space.page_no, page.fso());
            let record = LogRecord::Insert {
                tid,
                item_id: id,
                raw: raw.clone(),
            };
            self.wal.log(&record.encode()).map(|()| {
                page.insert_data(&raw);
                id
            })
        };

        // The page goes back to the index whether or not the insert landed.
        let free = guard.read().free_space();
        let released = guard.release();
        self.free_space.add(space.page_no, free);

        let id = placed?;
        released?;
        debug!(tid, item = %id, len = payload.len(), "item inserted");
        Ok(id)
    }

    /// Take a page with room for `needed` bytes out of the index, allocating
    /// new pages as needed.
    fn claim_page(&self, needed: usize) -> Result<PageSpace> {
        for _ in 0..INSERT_RETRIES {
            if let Some(space) = self.free_space.select(needed) {
                return Ok(space);
            }
            let page_no = self.pages.new_page(&Page::new_data_page())?;
            self.free_space.add(page_no, MAX_FREE_SPACE);
        }
        Err(Error::DatabaseBusy)
    }

    // ========================================================================
    // Public API: Read and release
    // ========================================================================

    /// Get the item at `id`, or None if it was rolled back.
    ///
    /// Pair every `Some` with [`release`](Self::release).
    ///
    /// # Errors
    /// Returns `Error::InvalidItemId` if `id` doesn't point at an item.
    pub fn read(&self, id: ItemId) -> Result<Option<Arc<DataItem>>> {
        let item = self.items.obtain(id, |id| self.load_item(id))?;
        if item.is_valid() {
            return Ok(Some(item));
        }
        self.release(id)?;
        Ok(None)
    }

    /// Drop one reference to a read item.
    pub fn release(&self, id: ItemId) -> Result<()> {
        self.items
            .release(id, |_, item| self.pages.release_page(item.page_no()))
    }

    fn load_item(&self, id: ItemId) -> Result<DataItem> {
        let page_no = id.page_no();
        if page_no <= PageNo::ONE || page_no.0 > self.pages.page_count() {
            return Err(Error::InvalidItemId(id));
        }

        let frame = self.pages.obtain_page(page_no)?;
        match DataItem::load(id, frame, Arc::clone(&self.wal)) {
            Ok(item) => Ok(item),
            Err(e) => {
                self.pages.release_page(page_no)?;
                Err(e)
            }
        }
    }

    // ========================================================================
    // Public API: Close and stats
    // ========================================================================

    /// Release every item, flush every page, then write the close stamp.
    pub fn close(&self) -> Result<()> {
        self.items
            .drain(|_, item| self.pages.release_page(item.page_no()))?;
        self.wal.close()?;
        self.pages.close()?;

        self.page_one.write().set_close_stamp();
        self.pages.flush_page(&self.page_one)?;

        info!("data manager closed");
        Ok(())
    }

    /// Number of pages in the page file, page 1 included.
    pub fn page_count(&self) -> u32 {
        self.pages.page_count()
    }

    /// Number of items currently cached.
    pub fn cached_items(&self) -> usize {
        self.items.len()
    }

    pub fn item_stats(&self) -> &CacheStats {
        self.items.stats()
    }

    pub fn page_stats(&self) -> &CacheStats {
        self.pages.stats()
    }
}
