//! Page 1 layout: the open/close shutdown stamps.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 100     8     open stamp (random, rewritten on every open)
//! 108     8     close stamp (copy of the open stamp, written on clean close)
//! ```
//!
//! A mismatch between the two stamps on open means the previous run never
//! closed cleanly.

use rand::RngCore;

use crate::common::config::{STAMP_LEN, STAMP_OFFSET};

use super::Page;

const OPEN: usize = STAMP_OFFSET;
const CLOSE: usize = STAMP_OFFSET + STAMP_LEN;

impl Page {
    /// Build a fresh page 1 with a new open stamp.
    pub fn new_page_one() -> Page {
        let mut page = Page::new();
        page.set_open_stamp();
        page
    }

    /// Write a fresh random open stamp.
    pub fn set_open_stamp(&mut self) {
        rand::thread_rng().fill_bytes(&mut self.as_mut_slice()[OPEN..OPEN + STAMP_LEN]);
    }

    /// Mirror the open stamp into the close slot.
    pub fn set_close_stamp(&mut self) {
        self.as_mut_slice().copy_within(OPEN..OPEN + STAMP_LEN, CLOSE);
    }

    /// True if the last run closed cleanly.
    pub fn stamps_match(&self) -> bool {
        let data = self.as_slice();
        data[OPEN..OPEN + STAMP_LEN] == data[CLOSE..CLOSE + STAMP_LEN]
    }
}
