pub mod config;
pub mod feature;
pub mod field;
pub mod filter;
pub mod query;
pub mod source;
pub mod status;
pub mod testing;

pub use config::{load_config, load_config_from_str, Config, ConfigError, QueryConfig};
pub use feature::Feature;
pub use field::{BoundingBox, Field, FieldKind, FieldSet, SetOutcome};
pub use filter::{
    BoundaryFilter, FetchContext, Filter, FilterCore, PlacesFilter, BOUNDS_FIELD,
};
pub use query::{MapQuery, MapQueryBuilder};
pub use source::{
    BoundaryService, HttpBoundaryService, HttpPlacesService, PlacesService, SourceError,
};
pub use status::{FetchState, Status};
