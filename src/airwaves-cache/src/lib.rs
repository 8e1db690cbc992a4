//! Episode audio cache for Airwaves.
//!
//! Files live at `<root>/episodes/<sanitized-id>.audio`. A file at that path
//! is always complete: downloads stage into `<name>.audio.tmp` and are renamed
//! into place. Freshness is judged from the file's modification time.

pub mod coordinator;
pub mod download;
pub mod freshness;
pub mod layout;
pub mod maintenance;

pub use coordinator::{AudioCache, EnsureOutcome, EnsureResult};
pub use download::{download_atomically, AudioSource, ByteStream, DownloadError, HttpAudioSource};
pub use freshness::is_fresh;
pub use layout::{sanitize_id, CacheLayout};
pub use maintenance::{CacheMaintenance, CacheStats, MaintenanceError};
