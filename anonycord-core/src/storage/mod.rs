pub mod directory_library;
pub mod metadata;
pub mod persistence;
