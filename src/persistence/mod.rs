//! PostgreSQL adapters for the application ports

mod application_store;
mod outbox_store;
mod reference_data;

pub use application_store::PgApplicationStore;
pub use outbox_store::PgOutboxStore;
pub use reference_data::PgReferenceData;
