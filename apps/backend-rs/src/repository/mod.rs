pub mod event_store;
pub mod memory;
pub mod postgres;
