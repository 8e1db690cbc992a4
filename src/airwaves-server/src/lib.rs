//! HTTP surface for Airwaves.
//!
//! - `GET /api/audio?id=<episode>` resolves, caches and range-serves episode audio
//! - `POST /api/episodes/refresh` runs a batch refresh for `{"programIds": [...]}`
//! - `GET /health`

pub mod error;
pub mod range;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use range::{parse_range, serve_file, ByteRange};
pub use routes::{normalize_program_ids, router, MAX_REFRESH_PROGRAMS};
pub use state::AppState;
