pub mod config;
pub mod logging;
pub mod models;
pub mod origin;
pub mod paths;
pub mod store;

pub use config::{
    CacheConfig, Config, ConfigError, LogLevel, LoggingConfig, OriginConfig, PrefetchConfig,
    ServerConfig, ValidationError,
};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use models::{Episode, EpisodeId, Program, ProgramId, RefreshSummary};
pub use origin::{Origin, OriginError, OriginResult};
pub use paths::{AppDirs, DirsError};
pub use store::{CatalogStore, MemoryStore, StoreError, StoreResult};

pub const APP_NAME: &str = "airwaves";
pub const APP_AUTHOR: &str = "Airwaves";
pub const APP_QUALIFIER: &str = "io";
