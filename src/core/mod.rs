// Core modules: row codec, collaborator contracts and the scan unit state machine.
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod memory;
pub mod naming;
pub mod row;
pub mod scanner;
pub mod schema;
pub mod sink;
