pub mod draft;
pub mod store;
