use crate::cli::InitArgs;
use crate::config::{DEFAULT_DB_FILENAME, TRAQ_DIR_NAME};
use crate::error::{Result, TraqError};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct InitOutput {
    path: PathBuf,
    seeded: usize,
}

const CONFIG_TEMPLATE: &str = r"# traq workspace configuration
# per-page: 25
# order: id
# lock-timeout: 30000
# default-filter:
#   status: all.open
";

const GITIGNORE: &str = r"# Database
*.db
*.db-shm
*.db-wal
";

/// Execute the init command.
///
/// With an explicit `db` only that database is created; later commands
/// given the same `--db` use its directory as the workspace.
///
/// # Errors
///
/// Returns an error if the workspace exists (without `--force`) or the
/// directory or database cannot be created.
pub fn execute(
    args: &InitArgs,
    json: bool,
    db: Option<&Path>,
    root_dir: Option<&Path>,
) -> Result<()> {
    let (db_path, traq_dir) = match db {
        Some(path) => (path.to_path_buf(), None),
        None => {
            let base_dir = root_dir.unwrap_or_else(|| Path::new("."));
            let traq_dir = base_dir.join(TRAQ_DIR_NAME);
            (traq_dir.join(DEFAULT_DB_FILENAME), Some(traq_dir))
        }
    };

    if db_path.exists() {
        if !args.force {
            return Err(TraqError::AlreadyInitialized { path: db_path });
        }
        remove_database(&db_path)?;
    }
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut storage = SqliteStorage::open(&db_path)?;
    let seeded = if args.no_defaults {
        0
    } else {
        storage.seed_defaults()?
    };

    if let Some(traq_dir) = &traq_dir {
        let config_path = traq_dir.join("config.yaml");
        if !config_path.exists() {
            fs::write(config_path, CONFIG_TEMPLATE)?;
        }
        let gitignore_path = traq_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, GITIGNORE)?;
        }
    }

    info!(path = %db_path.display(), seeded, "workspace initialized");
    if json {
        let output = InitOutput {
            path: db_path,
            seeded,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if traq_dir.is_some() {
        println!("Initialized traq workspace in {TRAQ_DIR_NAME}/");
    } else {
        println!("Initialized traq database at {}", db_path.display());
    }
    Ok(())
}

fn remove_database(db_path: &Path) -> Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let mut path = db_path.as_os_str().to_owned();
        path.push(suffix);
        let path = PathBuf::from(path);
        if path.exists() {
            debug!(path = %path.display(), "removing existing database file");
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::LookupStore;
    use crate::model::StatusState;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_workspace() {
        let temp_dir = TempDir::new().unwrap();
        execute(&InitArgs::default(), false, None, Some(temp_dir.path())).unwrap();

        let traq_dir = temp_dir.path().join(".traq");
        assert!(traq_dir.join("traq.db").exists());
        assert!(traq_dir.join("config.yaml").exists());
        assert!(traq_dir.join(".gitignore").exists());

        let storage = SqliteStorage::open(&traq_dir.join("traq.db")).unwrap();
        assert_eq!(storage.status_ids(StatusState::Open).unwrap().len(), 3);
    }

    #[test]
    fn test_init_without_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let args = InitArgs {
            no_defaults: true,
            ..Default::default()
        };
        execute(&args, false, None, Some(temp_dir.path())).unwrap();

        let storage = SqliteStorage::open(&temp_dir.path().join(".traq/traq.db")).unwrap();
        assert!(storage.status_ids(StatusState::Open).unwrap().is_empty());
    }

    #[test]
    fn test_init_fails_if_already_initialized() {
        let temp_dir = TempDir::new().unwrap();
        execute(&InitArgs::default(), false, None, Some(temp_dir.path())).unwrap();

        let result = execute(&InitArgs::default(), false, None, Some(temp_dir.path()));
        assert!(matches!(result, Err(TraqError::AlreadyInitialized { .. })));
    }

    #[test]
    fn test_init_force_recreates_database() {
        let temp_dir = TempDir::new().unwrap();
        execute(&InitArgs::default(), false, None, Some(temp_dir.path())).unwrap();
        let db_path = temp_dir.path().join(".traq/traq.db");
        {
            let mut storage = SqliteStorage::open(&db_path).unwrap();
            storage.create_project("Traq", "traq").unwrap();
        }

        let args = InitArgs {
            force: true,
            ..Default::default()
        };
        execute(&args, false, None, Some(temp_dir.path())).unwrap();
        let storage = SqliteStorage::open(&db_path).unwrap();
        assert!(storage.project_by_slug("traq").unwrap().is_none());
    }

    #[test]
    fn test_init_honors_explicit_db_path() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("store").join("tickets.db");
        execute(&InitArgs::default(), false, Some(&db_path), Some(temp_dir.path())).unwrap();

        assert!(db_path.exists());
        assert!(!temp_dir.path().join(".traq").exists());
        let storage = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(storage.status_ids(StatusState::Closed).unwrap().len(), 2);

        let again = execute(&InitArgs::default(), false, Some(&db_path), None);
        assert!(matches!(again, Err(TraqError::AlreadyInitialized { .. })));
    }
}
