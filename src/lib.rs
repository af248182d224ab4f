//! Decoder for compiled Android resource tables (`resources.arsc`) with
//! configuration-aware resource resolution.
//!
//! [`Table::parse`] walks the chunk container once and builds an immutable
//! in-memory model; [`Table::resolve`] then picks the stored value for a
//! resource id and a requested device configuration, replicating the
//! platform's qualifier-selection semantics.
//!
//! ```no_run
//! use restable::{ResTableConfig, ResourceId, Table};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("resources.arsc")?;
//! let table = Table::parse(&data)?;
//!
//! let requested = ResTableConfig {
//!     language: *b"fr",
//!     sdk_version: 30,
//!     ..ResTableConfig::default()
//! };
//! let value = table.resolve(ResourceId::from(0x7f01_0000), &requested)?;
//! println!("{value:?}");
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod table;

pub(crate) mod structs;

pub use errors::{DecodeError, ResolveError};
pub use structs::res_table_config::ResTableConfig;
pub use table::{ResourceId, ResourceValue, Table};
