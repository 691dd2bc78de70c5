pub mod error;
pub mod files;
pub mod places;
pub mod postgres;
pub mod rows;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use error::{PlacesError, SourceError};
pub use files::{MetricsCsv, ZipcodeCsv};
pub use places::PlacesClient;
pub use postgres::PostgresSource;
pub use rows::{BlockGroupRow, CityRow, MetricsRow, NeighborhoodRow, Place, ZipcodeRow};
pub use traits::{AdministrativeSource, BlockGroupSource, MetricsSource, PlaceSearch, ZipcodeSource};
