use std::env;
use std::fs;
use std::io::{Error, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

const RECENT_STORES_FILE: &str = "recent_stores.txt";
const MAX_RECENT_STORES: usize = 50;
const STATE_DIR_NAME: &str = "chronos_agenda";
const STORE_ENV: &str = "CHRONOS_AGENDA_STORE";
const STATE_DIR_ENV: &str = "CHRONOS_AGENDA_STATE_DIR";

/// Where the active store path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreSource {
    Flag,
    Env,
    Recent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentStore {
    pub path: PathBuf,
    pub exists: bool,
}

pub fn resolve_store_path(cli_path: Option<PathBuf>) -> Result<(PathBuf, StoreSource), Error> {
    let selected = cli_path
        .map(|path| (absolutize(path), StoreSource::Flag))
        .or_else(|| {
            env::var_os(STORE_ENV)
                .map(PathBuf::from)
                .filter(|path| !path.as_os_str().is_empty())
                .map(|path| (absolutize(path), StoreSource::Env))
        })
        .or_else(|| {
            recent_stores(MAX_RECENT_STORES)
                .ok()
                .and_then(|rows| rows.into_iter().find(|row| row.exists))
                .map(|row| (row.path, StoreSource::Recent))
        });

    match selected {
        Some((path, source)) => {
            debug!(path = %path.display(), ?source, "store resolved");
            Ok((path, source))
        }
        None => Err(Error::new(
            ErrorKind::NotFound,
            "no store selected: pass --store <path>, set CHRONOS_AGENDA_STORE, or pick one from `stores`",
        )),
    }
}

/// Moves `path` to the front of the recent list.
pub fn remember_store(path: &Path) -> Result<(), Error> {
    let path = absolutize(path.to_path_buf());
    let mut entries = read_recent_paths()?;
    entries.retain(|entry| entry != &path);
    entries.insert(0, path);
    entries.truncate(MAX_RECENT_STORES);
    write_recent_paths(&entries)
}

pub fn recent_stores(limit: usize) -> Result<Vec<RecentStore>, Error> {
    Ok(read_recent_paths()?
        .into_iter()
        .take(limit)
        .map(|path| RecentStore {
            exists: path.exists(),
            path,
        })
        .collect())
}

/// Drops recent entries whose files no longer exist. Returns how many were removed.
pub fn prune_recent_stores() -> Result<usize, Error> {
    let entries = read_recent_paths()?;
    let before = entries.len();
    let kept = entries
        .into_iter()
        .filter(|path| path.exists())
        .collect::<Vec<_>>();
    let removed = before - kept.len();
    if removed > 0 {
        write_recent_paths(&kept)?;
        info!(removed, "pruned missing stores from recent list");
    }
    Ok(removed)
}

fn read_recent_paths() -> Result<Vec<PathBuf>, Error> {
    let raw = match fs::read_to_string(state_dir().join(RECENT_STORES_FILE)) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

fn write_recent_paths(entries: &[PathBuf]) -> Result<(), Error> {
    let state_dir = state_dir();
    fs::create_dir_all(&state_dir)?;

    let mut file = fs::File::create(state_dir.join(RECENT_STORES_FILE))?;
    for path in entries {
        writeln!(file, "{}", path.display())?;
    }

    Ok(())
}

/// Per-user directory for the recent list, settings and the log file.
pub fn state_dir() -> PathBuf {
    if let Some(path) = env::var_os(STATE_DIR_ENV) {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(path) = env::var_os("LOCALAPPDATA") {
            return PathBuf::from(path).join(STATE_DIR_NAME);
        }
    }

    if let Some(path) = env::var_os("XDG_STATE_HOME") {
        return PathBuf::from(path).join(STATE_DIR_NAME);
    }

    if let Some(path) = env::var_os("HOME") {
        return PathBuf::from(path)
            .join(".local")
            .join("state")
            .join(STATE_DIR_NAME);
    }

    PathBuf::from(format!(".{STATE_DIR_NAME}"))
}

fn absolutize(path: PathBuf) -> PathBuf {
    let path = match env::current_dir() {
        Ok(cwd) if !path.is_absolute() => cwd.join(path),
        _ => path,
    };

    if path.exists() {
        fs::canonicalize(&path).unwrap_or(path)
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{StoreSource, absolutize, resolve_store_path};

    #[test]
    fn relative_paths_are_anchored_to_cwd() {
        let cwd = std::env::current_dir().expect("cwd");
        let resolved = absolutize(PathBuf::from("does_not_exist_chronos_agenda.store"));
        assert!(resolved.is_absolute());
        assert_eq!(resolved, cwd.join("does_not_exist_chronos_agenda.store"));
    }

    #[test]
    fn flag_wins_over_everything() {
        let flag = std::env::temp_dir().join("chronos_agenda_flag.store");
        let (path, source) = resolve_store_path(Some(flag.clone())).expect("resolved");
        assert_eq!(source, StoreSource::Flag);
        assert_eq!(path, flag);
    }
}
