pub mod artifact;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod graph;
pub mod permissions;
pub mod settings;
pub mod state;
