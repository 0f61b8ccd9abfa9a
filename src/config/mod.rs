mod settings;

pub use settings::{AuthType, ConnectionSettings, Settings, TransferSettings, DEFAULT_CHUNK_SIZE};
