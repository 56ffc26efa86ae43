pub mod executor;
pub mod postgres;
pub mod profile;
pub mod result;
pub mod sqlite;
pub mod store;

pub use executor::{Executor, ExecutorState};
pub use profile::QueryProfile;
pub use result::{QueryResult, Record, RowSet};
pub use store::{RelationalStore, StatementOutcome, StoreConnection};
