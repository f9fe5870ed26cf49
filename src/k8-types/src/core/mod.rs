pub mod namespace;
pub mod plugin;
pub mod pod;
pub mod service;
