//! Layered configuration where environment variables override config file values.
//!
//! A loader that merges a config file with environment variables usually only
//! checks the environment for keys it already knows. This crate derives those
//! keys from the shape of the target type itself: every leaf reachable through
//! nested structs, flattened structs, optionals and map entries is bound for
//! environment lookup before the final decode.
//!
//! ```rust,ignore
//! #[derive(Default, Serialize, Deserialize, enviper::Describe)]
//! struct Config {
//!     foo: String,
//!     bar: Bar,
//!     #[serde(flatten)]
//!     qux: Qux,
//! }
//!
//! let mut e = Enviper::new(Layered::new());
//! e.set_env_prefix("MYAPP");
//! e.add_config_path("/etc/myapp");
//! let mut config = Config::default();
//! e.unmarshal(&mut config)?; // MYAPP_BAR_BAZ overrides bar.baz from the file
//! ```

extern crate self as enviper;

mod engine;
mod error;
mod orchestrator;
mod shape;
mod walk;

pub use engine::{DecodeOptions, Engine, Format, KeyReplacer, Layered, env_var_or_none};
pub use enviper_derive::Describe;
pub use error::{BoxError, Error, Result};
pub use orchestrator::Enviper;
pub use shape::{Describe, Entry, Field, Kind, MapKey, Scalar, Shape, Tags};
pub use walk::{DEFAULT_TAG_NAME, KeyPath, walk};
