//! Application services composed from the catalogue and the enrichment clients

mod book_data;

pub use book_data::{cover_key, BookDataService};
