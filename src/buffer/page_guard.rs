//! RAII guard for scoped page access.
//!
//! A [`PageGuard`] holds one reference to a cached page and releases it when
//! dropped. Long-lived holders (data items) use
//! [`PageStore::obtain_page`](super::PageStore::obtain_page) and
//! [`PageStore::release_page`](super::PageStore::release_page) directly.

use std::ops::Deref;
use std::sync::Arc;

use tracing::error;

use super::page_store::PageStore;
use super::PageFrame;
use crate::common::Result;

/// Guard for one page reference.
///
/// Releasing can flush a dirty page, which can fail. `Drop` can only log that
/// failure; call [`release`](Self::release) to get the error back.
///
/// # Example
/// ```ignore
/// let guard = store.fetch(page_no)?;
/// let fso = guard.read().fso();  // Deref to &PageFrame
/// // guard drops here, page released
/// ```
pub struct PageGuard<'a> {
    store: &'a PageStore,
    frame: Arc<PageFrame>,
    released: bool,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(store: &'a PageStore, frame: Arc<PageFrame>) -> Self {
        Self {
            store,
            frame,
            released: false,
        }
    }

    /// Release the page now, returning any flush error.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.store.release_page(self.frame.page_no())
    }
}

impl Deref for PageGuard<'_> {
    type Target = PageFrame;

    #[inline]
    fn deref(&self) -> &PageFrame {
        &self.frame
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let page_no = self.frame.page_no();
        if let Err(e) = self.store.release_page(page_no) {
            error!(%page_no, error = %e, "failed to release page");
        }
    }
}
