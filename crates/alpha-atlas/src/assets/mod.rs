pub mod manifest;
pub mod registry;
pub mod store;
