pub mod aggregate;
pub mod config;
pub mod domain;
pub mod error;
pub mod index;
pub mod layout;
pub mod listing;
pub mod output;
pub mod remote;
pub mod scheduler;
pub mod state;
pub mod tree;
