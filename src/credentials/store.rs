use crate::config::CredentialsConfig;
use crate::credentials::{Credential, CredentialError};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Loads the credential pool from a directory of `*.env` files
///
/// Files are taken in lexicographic order of their names, skipping anything
/// listed in `skip`. Each file must define the API token variable; the
/// secret variable is optional. Files without a token are skipped with a
/// warning.
pub fn load_credentials(config: &CredentialsConfig) -> Result<Vec<Credential>, CredentialError> {
    let entries = fs::read_dir(&config.directory).map_err(|source| CredentialError::Io {
        path: config.directory.clone(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| CredentialError::Io {
            path: config.directory.clone(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".env") || !entry.path().is_file() {
            continue;
        }
        if config.skip.iter().any(|skipped| skipped == &name) {
            debug!("Skipping credential file {}", name);
            continue;
        }
        files.push((name, entry.path()));
    }
    files.sort();

    let mut pool = Vec::with_capacity(files.len());
    for (name, path) in files {
        match read_credential(&name, &path, config)? {
            Some(credential) => pool.push(credential),
            None => warn!(
                "Credential file {} has no {}, skipping",
                name, config.api_key_var
            ),
        }
    }

    if pool.is_empty() {
        return Err(CredentialError::Empty(config.directory.clone()));
    }

    Ok(pool)
}

fn read_credential(
    name: &str,
    path: &Path,
    config: &CredentialsConfig,
) -> Result<Option<Credential>, CredentialError> {
    let iter = dotenvy::from_path_iter(path).map_err(|source| CredentialError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut api_key = None;
    let mut secret_key = None;
    for item in iter {
        let (key, value) = item.map_err(|source| CredentialError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }
        if key == config.api_key_var {
            api_key = Some(value);
        } else if key == config.secret_key_var {
            secret_key = Some(value);
        }
    }

    Ok(api_key.map(|api_key| Credential::new(name, api_key, secret_key)))
}
