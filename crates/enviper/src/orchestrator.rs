//! Two-pass unmarshaling with environment overrides.
//!
//! Responsibilities:
//! - Load the config file, treating "no config file" as an empty file layer.
//! - Pre-populate the target from the file so map keys and optionals become visible.
//! - Walk the populated target and bind every key path for environment lookup.
//! - Run the authoritative decode with the environment active.
//!
//! Does NOT handle:
//! - Config file search, parsing or layer precedence (see `engine/`).
//! - Deriving key paths (see `walk.rs`).
//!
//! Invariants / Assumptions:
//! - Any config file error other than "not found" aborts before a binding is made.
//! - Errors from the pre-populating decode are always discarded.
//! - Only the final decode's error reaches the caller after the file loaded.
//! - The tag name is fixed once the first walk has run.

use std::ops::{Deref, DerefMut};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::engine::{DecodeOptions, Engine, KeyReplacer, Layered};
use crate::error::Result;
use crate::shape::Describe;
use crate::walk::{DEFAULT_TAG_NAME, walk};

/// Wraps an engine so that unmarshaling also considers environment variables
/// for every key a target's shape exposes.
///
/// Derefs to the wrapped engine, so its whole interface stays available:
///
/// ```rust,ignore
/// let mut e = Enviper::new(Layered::new());
/// e.set_env_prefix("MYAPP");
/// e.add_config_path("/etc/myapp");
/// e.unmarshal(&mut config)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Enviper<E = Layered> {
    engine: E,
    tag_name: Option<String>,
    walked: bool,
}

impl<E: Engine> Enviper<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            tag_name: None,
            walked: false,
        }
    }

    /// Read rename/squash/skip directives from the tag `name` instead of `serde`.
    ///
    /// Ignored once a walk has run.
    pub fn with_tag_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.walked {
            warn!(tag = %name, current = %self.tag_name(), "tag name is fixed after the first unmarshal");
            return self;
        }
        self.tag_name = Some(name);
        self
    }

    pub fn tag_name(&self) -> &str {
        self.tag_name.as_deref().unwrap_or(DEFAULT_TAG_NAME)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_inner(self) -> E {
        self.engine
    }

    /// Unmarshal into `target` with environment variables overriding file values.
    pub fn unmarshal<T>(&mut self, target: &mut T) -> Result<()>
    where
        T: Serialize + DeserializeOwned + Describe,
    {
        self.unmarshal_with(target, DecodeOptions::default())
    }

    /// Like [`Enviper::unmarshal`], passing `options` to both decode passes.
    pub fn unmarshal_with<T>(&mut self, target: &mut T, options: DecodeOptions) -> Result<()>
    where
        T: Serialize + DeserializeOwned + Describe,
    {
        match self.engine.read_in_config() {
            Ok(()) => {}
            Err(err) if err.is_config_file_not_found() => {
                debug!(error = %err, "no config file, continuing with environment only");
            }
            Err(err) => return Err(err),
        }

        // Best effort: only here to surface file-provided map keys and optionals.
        if let Err(err) = self.engine.unmarshal(target, &options) {
            debug!(error = %err, "pre-populating decode failed");
        }

        self.bind_envs(target);

        let options = if self.tag_name() == DEFAULT_TAG_NAME {
            options
        } else {
            options.with_tag_name(self.tag_name())
        };
        self.engine.unmarshal(target, &options)
    }

    fn bind_envs<T: Describe>(&mut self, target: &T) {
        self.engine
            .set_env_key_replacer(KeyReplacer::new([(".", "_")]));
        let paths = walk(&target.describe(), self.tag_name());
        for path in &paths {
            debug!(key = %path, "binding environment key");
            self.engine.bind_env(&path.key(), path.kind());
        }
        self.walked = true;
    }
}

impl<E> Deref for Enviper<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.engine
    }
}

impl<E> DerefMut for Enviper<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::Describe;
    use crate::error::Error;
    use crate::shape::Kind;

    #[derive(Debug, PartialEq)]
    enum Call {
        ReadInConfig,
        Unmarshal { tag_name: String },
        BindEnv(String),
        SetReplacer(String),
    }

    /// Engine double recording every call in order.
    struct Recording {
        read_result: RefCell<Option<Error>>,
        fail_first_decode: bool,
        calls: RefCell<Vec<Call>>,
    }

    impl Recording {
        fn new() -> Self {
            Self {
                read_result: RefCell::new(None),
                fail_first_decode: false,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn failing_read(err: Error) -> Self {
            let engine = Self::new();
            *engine.read_result.borrow_mut() = Some(err);
            engine
        }

        fn decodes(&self) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|call| matches!(call, Call::Unmarshal { .. }))
                .count()
        }
    }

    impl Engine for Recording {
        fn read_in_config(&mut self) -> Result<()> {
            self.calls.borrow_mut().push(Call::ReadInConfig);
            match self.read_result.borrow_mut().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        fn unmarshal<T>(&self, _target: &mut T, options: &DecodeOptions) -> Result<()>
        where
            T: Serialize + DeserializeOwned + Describe,
        {
            let first = self.decodes() == 0;
            self.calls.borrow_mut().push(Call::Unmarshal {
                tag_name: options.tag_name().to_string(),
            });
            if first && self.fail_first_decode {
                return Err(serde_json::from_str::<u8>("x").unwrap_err().into());
            }
            Ok(())
        }

        fn bind_env(&mut self, key: &str, _kind: Kind) {
            self.calls.borrow_mut().push(Call::BindEnv(key.to_string()));
        }

        fn set_env_key_replacer(&mut self, replacer: KeyReplacer) {
            self.calls
                .borrow_mut()
                .push(Call::SetReplacer(replacer.replace("a.b")));
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize, Describe)]
    struct Target {
        foo: String,
        #[tag(custom_tag = "BAR")]
        bar: u8,
    }

    fn unmarshal_default(e: &mut Enviper<Recording>) -> Result<()> {
        let mut target = Target::default();
        e.unmarshal(&mut target)
    }

    #[test]
    fn test_protocol_order() {
        let mut e = Enviper::new(Recording::new());
        unmarshal_default(&mut e).unwrap();
        assert_eq!(
            *e.calls.borrow(),
            vec![
                Call::ReadInConfig,
                Call::Unmarshal {
                    tag_name: "serde".to_string()
                },
                Call::SetReplacer("a_b".to_string()),
                Call::BindEnv("foo".to_string()),
                Call::BindEnv("bar".to_string()),
                Call::Unmarshal {
                    tag_name: "serde".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_missing_config_file_is_not_fatal() {
        let err = Error::ConfigFileNotFound {
            name: "config".to_string(),
            locations: vec![PathBuf::from("/nowhere")],
        };
        let mut e = Enviper::new(Recording::failing_read(err));
        unmarshal_default(&mut e).unwrap();
        assert_eq!(e.decodes(), 2);
    }

    #[test]
    fn test_other_read_errors_abort_before_binding() {
        let err = Error::ConfigFileRead {
            path: PathBuf::from("/etc/app/config.yaml"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let mut e = Enviper::new(Recording::failing_read(err));
        let result = unmarshal_default(&mut e);
        assert!(matches!(result, Err(Error::ConfigFileRead { .. })));
        assert_eq!(*e.calls.borrow(), vec![Call::ReadInConfig]);
    }

    #[test]
    fn test_first_decode_error_is_swallowed() {
        let mut engine = Recording::new();
        engine.fail_first_decode = true;
        let mut e = Enviper::new(engine);
        unmarshal_default(&mut e).unwrap();
        assert_eq!(e.decodes(), 2);
        assert!(e.calls.borrow().contains(&Call::BindEnv("foo".to_string())));
    }

    #[test]
    fn test_custom_tag_reaches_walk_and_final_decode_only() {
        let mut e = Enviper::new(Recording::new()).with_tag_name("custom_tag");
        assert_eq!(e.tag_name(), "custom_tag");
        unmarshal_default(&mut e).unwrap();

        let calls = e.calls.borrow();
        assert!(calls.contains(&Call::BindEnv("BAR".to_string())));
        assert_eq!(
            calls.first_chunk::<2>().map(|c| &c[1]),
            Some(&Call::Unmarshal {
                tag_name: "serde".to_string()
            })
        );
        assert_eq!(
            calls.last(),
            Some(&Call::Unmarshal {
                tag_name: "custom_tag".to_string()
            })
        );
    }

    #[test]
    fn test_tag_name_is_fixed_after_first_walk() {
        let mut e = Enviper::new(Recording::new());
        assert_eq!(e.tag_name(), DEFAULT_TAG_NAME);
        unmarshal_default(&mut e).unwrap();
        let e = e.with_tag_name("custom_tag");
        assert_eq!(e.tag_name(), DEFAULT_TAG_NAME);
    }

    #[test]
    fn test_deref_exposes_engine() {
        let mut e = Enviper::new(Layered::new());
        e.set_env_prefix("APP");
        assert_eq!(e.env_prefix(), Some("APP"));
        assert_eq!(e.engine().env_prefix(), Some("APP"));
        assert_eq!(e.into_inner().env_prefix(), Some("APP"));
    }
}
