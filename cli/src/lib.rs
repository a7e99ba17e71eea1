//! Library surface of the hive CLI: config file schema, provider
//! resolution, and the session store. The binary in `main.rs` is a thin
//! clap dispatcher over these.

pub mod config_file;
pub mod providers;
pub mod sessions;

pub use config_file::{load_swarm_file, SwarmFile};
pub use providers::{resolve_provider, OpenAiCompatProvider};
pub use sessions::{SessionRecord, SessionStore};
