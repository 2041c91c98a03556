use crate::error::Error;
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[cfg(windows)]
use normpath::PathExt;

lazy_static! {
    static ref CURRENT: RwLock<Option<Profile>> = RwLock::new(None);
}

/// Storage paths
#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    /// The base directory for all spacely data
    pub base_dir: PathBuf,

    /// The profile directory (the base_dir unless SPACELY_PROFILE is set)
    pub profile_dir: PathBuf,

    /// The LMDB directory (within the profile directory)
    pub lmdb_dir: PathBuf,
}

impl Profile {
    fn new() -> Result<Profile, Error> {
        let base_dir = match env::var("SPACELY_DIR") {
            Ok(dir) => {
                tracing::info!("Using SPACELY_DIR: {}", dir);
                // Note, this must pre-exist
                normalize(dir)?
            }
            Err(_) => {
                let data_dir = dirs::data_dir()
                    .ok_or::<Error>("Cannot find a directory to store application data.".into())?;
                let mut base_dir = normalize(data_dir)?;
                base_dir.push("spacely");
                normalize(base_dir.as_path()).unwrap_or(base_dir)
            }
        };

        let profile_dir = match env::var("SPACELY_PROFILE") {
            Ok(profile) => profile_subdir(&base_dir, &profile)?,
            Err(_) => base_dir.clone(),
        };

        let lmdb_dir = {
            let mut lmdb_dir = profile_dir.clone();
            lmdb_dir.push("lmdb");

            // Windows syntax not compatible with lmdb:
            if let Ok(stripped) = lmdb_dir.strip_prefix(r"\\?\") {
                lmdb_dir = stripped.to_path_buf();
            }

            lmdb_dir
        };

        fs::create_dir_all(&base_dir)?;
        fs::create_dir_all(&profile_dir)?;
        fs::create_dir_all(&lmdb_dir)?;

        Ok(Profile {
            base_dir,
            profile_dir,
            lmdb_dir,
        })
    }

    pub fn current() -> Result<Profile, Error> {
        {
            let current = CURRENT.read().map_err(|_| Error::from("Profile lock poisoned"))?;
            if let Some(profile) = current.as_ref() {
                return Ok(profile.clone());
            }
        }
        let created = Profile::new()?;
        let mut w = CURRENT.write().map_err(|_| Error::from("Profile lock poisoned"))?;
        *w = Some(created.clone());
        Ok(created)
    }
}

/// A named profile lives in a direct subdirectory of the base directory
fn profile_subdir(base_dir: &Path, profile: &str) -> Result<PathBuf, Error> {
    if "lmdb".eq_ignore_ascii_case(profile) {
        return Err(Error::from("Profile name 'lmdb' is reserved."));
    }

    let mut dir = base_dir.to_path_buf();
    dir.push(profile);
    match dir.file_name() {
        Some(filename) if filename == OsStr::new(profile) => Ok(dir),
        Some(_) => Err(Error::from(format!(
            "Profile is not a simple filename: {}",
            profile
        ))),
        None => Err(Error::from(format!("Profile is invalid: {}", profile))),
    }
}

#[cfg(not(windows))]
fn normalize<P: AsRef<Path>>(path: P) -> Result<PathBuf, Error> {
    Ok(fs::canonicalize(path)?)
}

#[cfg(windows)]
fn normalize<P: AsRef<Path>>(path: P) -> Result<PathBuf, Error> {
    Ok(path.as_ref().normalize()?.into_path_buf())
}
