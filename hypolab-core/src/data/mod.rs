//! Data sources: the read interface, a Parquet cache, CSV import, in-memory
//! and synthetic sources, and as-of alignment.

pub mod align;
pub mod cache;
pub mod csv_import;
pub mod memory;
pub mod provider;
pub mod synthetic;

pub use align::{align_asof, align_closed};
pub use cache::{CacheMeta, CacheStatus, ParquetCache};
pub use csv_import::{import_csv, read_csv, read_csv_file};
pub use memory::InMemorySource;
pub use provider::{DataError, DataSource};
pub use synthetic::synthetic_series;
