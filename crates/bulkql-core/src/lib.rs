//! bulkql core: batched bulk mutation over parameter-limited databases
//!
//! This crate holds everything that does not depend on a particular
//! network driver:
//!
//! - `StatementScope`, `Connection`, `Transaction`, `PreparedStatement` - capability traits
//! - identifier validation and batch partitioning
//! - the INSERT/UPDATE statement builder and `ParamMap`
//! - the prepared statement executor
//! - `bulk_insert` / `bulk_update`
//! - the `DatabaseDriver` trait, configuration and logging setup

mod bulk;
mod config;
mod connection;
mod dialect;
mod driver;
mod error;
mod executor;
mod identifier;
pub mod logging;
mod partition;
mod statement;
mod types;

pub use bulk::*;
pub use config::*;
pub use connection::*;
pub use dialect::*;
pub use driver::*;
pub use error::*;
pub use executor::*;
pub use identifier::*;
pub use partition::*;
pub use statement::*;
pub use types::*;
