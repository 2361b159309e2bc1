mod settings;

pub use settings::{ConnectionConfig, Settings, DEFAULT_API_VERSION, DEFAULT_MAX_FILE_BYTES};
