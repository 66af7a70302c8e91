//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 8KB data container
//! - [`page_one`] - Shutdown stamps kept in page 1
//! - [`data_page`] - FSO header and item packing for every other page

pub mod data_page;
#[allow(clippy::module_inception)]
mod page;
pub mod page_one;

pub use page::Page;
