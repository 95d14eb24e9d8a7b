//! Durable JSON-file persistence for the StepSync reconciler
//!
//! Keeps the six reconciler fields in a single small JSON object:
//!
//! ```json
//! {
//!   "current_app_step": 2550,
//!   "last_offset_step": -2400,
//!   "last_sensor_step": 150,
//!   "last_sensor_time": 1699977600000,
//!   "system_boot_time": 1699966800000,
//!   "system_reboot_status": false
//! }
//! ```
//!
//! Every `set` rewrites the file through a temporary sibling and an atomic
//! rename, so a crash leaves either the old or the new contents on disk.
//!
//! ```no_run
//! use stepsync_core::{StepReconciler, SystemClock};
//! use stepsync_store::JsonFileStore;
//!
//! let store = JsonFileStore::open("/var/lib/stepsync/state.json")?;
//! let reconciler = StepReconciler::new(store, SystemClock::new(), ());
//! println!("{} steps today", reconciler.steps());
//! # Ok::<(), stepsync_store::FileStoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use stepsync_core::{StateKey, StateValue, StepError, StepResult, StepState, StepStore};
use thiserror::Error;

/// Failures reading or writing the state file
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// Filesystem operation failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// File contents are not valid JSON
    #[error("malformed state file {}: {source}", .path.display())]
    Json {
        /// File being parsed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// File is valid JSON but not an object
    #[error("state file {} is not a JSON object", .path.display())]
    NotAnObject {
        /// File being parsed
        path: PathBuf,
    },
}

impl FileStoreError {
    /// Short static reason, for reporting through [`StepError`]
    pub fn reason(&self) -> &'static str {
        match self {
            FileStoreError::Io { .. } => "state file I/O failed",
            FileStoreError::Json { .. } => "state file encoding failed",
            FileStoreError::NotAnObject { .. } => "state file is not an object",
        }
    }
}

/// [`StepStore`] backed by a JSON file
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing file is an empty store
    ///
    /// A file that is not a JSON object is logged and replaced with a fresh
    /// all-default state, so tracking restarts at zero instead of failing.
    /// Fields with unknown names are dropped. Only I/O errors are returned.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FileStoreError> {
        let path = path.as_ref().to_path_buf();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(FileStoreError::Io { path, source }),
        };
        if bytes.is_empty() {
            return Ok(Self {
                path,
                values: Map::new(),
            });
        }

        match Self::parse(&path, &bytes) {
            Ok(values) => Ok(Self { path, values }),
            Err(err) => {
                log::warn!("{}; starting from a fresh state", err);
                let mut store = Self {
                    path,
                    values: Map::new(),
                };
                if StepState::default().save(&mut store).is_err() {
                    // Surface the underlying I/O error rather than the field
                    store.flush()?;
                }
                Ok(store)
            }
        }
    }

    fn parse(path: &Path, bytes: &[u8]) -> Result<Map<String, Value>, FileStoreError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|source| FileStoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let Value::Object(mut map) = value else {
            return Err(FileStoreError::NotAnObject {
                path: path.to_path_buf(),
            });
        };
        map.retain(|name, _| {
            let known = StateKey::from_name(name).is_some();
            if !known {
                log::warn!("dropping unknown field {:?} from {}", name, path.display());
            }
            known
        });
        Ok(map)
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current contents to disk
    pub fn flush(&self) -> Result<(), FileStoreError> {
        let io_err = |source| FileStoreError::Io {
            path: self.path.clone(),
            source,
        };

        let bytes = serde_json::to_vec_pretty(&self.values).map_err(|source| FileStoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let mut file = File::create(&tmp).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl StepStore for JsonFileStore {
    fn get(&self, key: StateKey) -> StepResult<Option<StateValue>> {
        match self.values.get(key.name()) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(flag)) if key.is_flag() => Ok(Some(StateValue::Flag(*flag))),
            Some(Value::Number(n)) if !key.is_flag() => n
                .as_i64()
                .map(|v| Some(StateValue::Integer(v)))
                .ok_or(StepError::TypeMismatch { key }),
            Some(_) => Err(StepError::TypeMismatch { key }),
        }
    }

    fn set(&mut self, key: StateKey, value: StateValue) -> StepResult<()> {
        let json = match value {
            StateValue::Integer(v) => Value::from(v),
            StateValue::Flag(flag) => Value::Bool(flag),
        };
        self.values.insert(key.name().to_owned(), json);
        self.flush().map_err(|err| StepError::Storage {
            key,
            reason: err.reason(),
        })
    }
}
