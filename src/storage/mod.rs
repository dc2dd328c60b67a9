pub mod catalog;
pub mod dedup;
pub mod models;

pub use catalog::CatalogStore;
pub use dedup::DuplicateGuard;
