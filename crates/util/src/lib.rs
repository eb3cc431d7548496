pub mod env_file;
pub mod path_processing;
pub mod redaction;

pub use env_file::{EnvFileError, load_env_file, parse_env_file};
pub use path_processing::{expand_tilde, resolve_against};
pub use redaction::{is_sensitive_key, redact_env_value, redact_sensitive};
