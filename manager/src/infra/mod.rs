pub mod container;
pub mod mac_registry;
pub mod ports;
pub mod workspace;
