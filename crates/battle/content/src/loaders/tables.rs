//! Effect tuning tables loader.

use std::path::Path;

use crate::loaders::{LoadResult, read_file};
use crate::tables::EffectTables;

/// Loader for [`EffectTables`] from TOML files.
pub struct TablesLoader;

impl TablesLoader {
    pub fn load(path: &Path) -> LoadResult<EffectTables> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LoadResult<EffectTables> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse tables TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_override_only_named_keys() {
        let tables = TablesLoader::parse(
            r#"
[spells]
burning_rain_targets = 5

[artifacts]
guardian_shield_per_stack = 25
"#,
        )
        .unwrap();

        assert_eq!(tables.spells.burning_rain_targets, 5);
        assert_eq!(
            tables.spells.burning_rain_damage,
            EffectTables::default().spells.burning_rain_damage
        );
        assert_eq!(tables.artifacts.guardian_shield_per_stack, 25);
        assert_eq!(tables.potions, EffectTables::default().potions);
    }

    #[test]
    fn invalid_toml_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.toml");
        std::fs::write(&path, "[spells\nburning_rain_targets = ").unwrap();
        let err = TablesLoader::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse tables TOML"));
    }
}
