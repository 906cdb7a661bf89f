use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use pension_loan_core::tariff::TariffTables;

/// Read a JSON request file into a typed struct.
pub fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    let value: T = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?;
    Ok(value)
}

/// Load tariff tables from a `.yaml`/`.yml` or JSON file, or fall back to the
/// reference workbook tables when no path is given.
pub fn read_tables(path: Option<&str>) -> Result<TariffTables, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(TariffTables::default());
    };

    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    let is_yaml = canonical
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let tables: TariffTables = if is_yaml {
        serde_yaml::from_str(&contents)
            .map_err(|e| format!("Invalid tariff tables in '{}': {}", canonical.display(), e))?
    } else {
        serde_json::from_str(&contents)
            .map_err(|e| format!("Invalid tariff tables in '{}': {}", canonical.display(), e))?
    };
    log::debug!("loaded tariff tables from {}", canonical.display());
    Ok(tables)
}

/// Resolve against the working directory and require an existing file.
fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }
    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}
