pub mod app;
pub mod catalog;
pub mod collection;
pub mod config;
mod frame;
pub mod gateway;
pub mod library;
pub mod model;
pub mod session;

pub use catalog::TagCatalog;
pub use collection::{TagCollection, TagError};
pub use gateway::{GatewayError, Id3FileGateway, PersistenceGateway};
pub use model::{TagEntry, TagKey, TagRecord};
pub use session::{EditSession, LoadOutcome, SessionError, SessionState};
