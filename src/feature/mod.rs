pub mod payload;
pub mod registry;
