pub mod application;
pub mod archive;
pub mod downgrade;
pub mod escape;
pub mod package;
pub mod repository;
pub mod schema;
pub mod version;
