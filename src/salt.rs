// src/salt.rs
//! Per-identity salt file
//!
//! Every key ever derived for an identity depends on this salt, so the file
//! is written exactly once and never replaced afterwards.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use rand::RngCore;
use tracing::{debug, warn};

use crate::consts::SALT_LEN;
use crate::error::{CoreError, Result};

/// Load the salt at `path`, or create it if no file exists yet
pub fn load_or_create_salt<P: AsRef<Path>>(path: P) -> Result<[u8; SALT_LEN]> {
    let path = path.as_ref();

    match fs::read(path) {
        Ok(bytes) => {
            debug!("Using existing salt from `{}`", path.display());
            return parse_salt(path, &bytes);
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    debug!("Creating new salt at `{}`", path.display());
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);

    // Write beside the target, then link into place without clobbering
    let mut staged = tempfile::Builder::new().prefix(".salt-").tempfile_in(dir)?;
    restrict_permissions(staged.as_file())?;
    staged.write_all(&salt)?;
    staged.as_file().sync_all()?;

    match staged.persist_noclobber(path) {
        Ok(_) => Ok(salt),
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
            warn!(
                "Salt at `{}` appeared while creating it; keeping the existing one",
                path.display()
            );
            let bytes = fs::read(path)?;
            parse_salt(path, &bytes)
        }
        Err(err) => Err(err.error.into()),
    }
}

fn parse_salt(path: &Path, bytes: &[u8]) -> Result<[u8; SALT_LEN]> {
    bytes.try_into().map_err(|_| {
        CoreError::Configuration(format!(
            "salt file `{}` holds {} bytes, expected {SALT_LEN}; refusing to replace it",
            path.display(),
            bytes.len()
        ))
    })
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> io::Result<()> {
    Ok(())
}
