//! Filter and pagination state for the product list.

mod filter;
mod pagination;

pub use filter::{FilterPatch, FilterState, RawFilterInput};
pub use pagination::Pagination;
