//! sqlx-backed storage for csvnorm: sessions over SQLite and Postgres,
//! catalog introspection, and the async halves of denormalisation and
//! renormalisation that need to read the database.

pub mod denormalise;
pub mod options;
pub mod postgres;
pub mod renormalise;
pub mod session;
pub mod sqlite;
pub mod write;

pub use denormalise::{fetch_denormalised, prepare_denormalise};
pub use options::IntrospectOptions;
pub use postgres::PostgresSession;
pub use renormalise::{RenormaliseOptions, Renormaliser, prepare_renormalise};
pub use session::Session;
pub use sqlite::SqliteSession;
pub use write::insert_row;
