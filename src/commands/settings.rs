use crate::config::SETTING_KEYS;
use crate::db::{Database, StoreError};
use anyhow::{bail, Result};
use std::collections::BTreeMap;

/// Shorten API keys for display; other values pass through.
pub fn mask_value(key: &str, value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if key.ends_with("_api_key") && chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        value.to_string()
    }
}

pub fn get_settings(db: &Database) -> Result<BTreeMap<String, String>, StoreError> {
    let mut map = BTreeMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = db.get_setting(key)? {
            map.insert(key.to_string(), mask_value(key, &value));
        }
    }
    Ok(map)
}

fn check_key(key: &str) -> Result<()> {
    if !SETTING_KEYS.contains(&key) {
        bail!(
            "Unknown setting key: {} (expected one of: {})",
            key,
            SETTING_KEYS.join(", ")
        );
    }
    Ok(())
}

pub fn get_setting(db: &Database, key: &str) -> Result<Option<String>> {
    check_key(key)?;
    Ok(db.get_setting(key)?.map(|v| mask_value(key, &v)))
}

pub fn set_setting(db: &Database, key: &str, value: &str) -> Result<()> {
    check_key(key)?;
    db.set_setting(key, value.trim())?;
    Ok(())
}

pub fn delete_setting(db: &Database, key: &str) -> Result<bool> {
    check_key(key)?;
    Ok(db.delete_setting(key)?)
}
