//! State file access shared by the subcommands.

use eyre::{Result, WrapErr};
use shutter_config::Config;
use shutter_core::hw_error::map_store_error;
use shutter_hardware::FileStore;

pub fn open_state_file(cfg: &Config) -> Result<FileStore> {
    FileStore::open(&cfg.persistence.path)
        .map_err(|e| eyre::Report::new(map_store_error(&e)))
        .wrap_err_with(|| format!("open state file {}", cfg.persistence.path))
}
