pub mod error;
pub mod events;
pub mod file_store;
pub mod job_store;
pub mod offer_service;
