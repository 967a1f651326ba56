use crate::config::{ImportConfig, InspectConfig};
use blockport_common::Result;
use blockport_import::{
    analyze_file, import_path, inspect_directory, load_mapping_or_default, ImportOptions, ImportResult,
};
use blockport_logger::{log, LogSeverity::Info};
use serde::Serialize;
use std::io;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Pretty JSON to `out`, or to stdout when no file is given.
async fn write_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value).map_err(io::Error::from)?;
    json.push('\n');
    match out {
        Some(path) => {
            tokio::fs::write(path, json).await?;
            log(format!("Wrote {}", path.display()), Info);
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(json.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

pub async fn import(config: &ImportConfig) -> Result<ImportResult> {
    let (table, mapping_warning) = load_mapping_or_default(config.mapping.as_deref()).await;
    let options = ImportOptions {
        bounds: config.bounds,
        center: config.center(),
        ..ImportOptions::default()
    };

    let mut result = import_path(&config.path, table, &options).await?;
    if let Some(warning) = mapping_warning {
        result.warnings.insert(0, warning);
    }
    let overrides = config.overrides();
    if !overrides.is_empty() {
        result.apply_overrides(&overrides);
    }
    for record in &result.unmapped {
        log(
            format!("Unmapped {} x{} -> {}", record.source, record.count, record.fallback_id),
            Info,
        );
    }
    Ok(result)
}

pub async fn run_import(config: &ImportConfig) -> Result<()> {
    let result = import(config).await?;
    write_json(&result, config.out.as_deref()).await
}

pub async fn run_inspect(config: &InspectConfig) -> Result<()> {
    let metadata = tokio::fs::metadata(&config.path).await?;
    if metadata.is_dir() {
        let reports = inspect_directory(&config.path).await?;
        let failed = reports.iter().filter(|report| report.error.is_some()).count();
        log(
            format!("Inspected {} files, {} with errors", reports.len(), failed),
            Info,
        );
        write_json(&reports, config.json.as_deref()).await
    } else {
        let report = analyze_file(&config.path).await;
        write_json(&report, config.json.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockport_common::VoxelCoordinate;
    use blockport_nbt::{NBTFile, Tag};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("blockport-cli-{}-{}", std::process::id(), name))
    }

    fn schematic_bytes() -> Vec<u8> {
        let mut palette = HashMap::new();
        palette.insert("mod:crystal".to_string(), Tag::Int(0));
        let mut root = HashMap::new();
        root.insert("Width".to_string(), Tag::Short(2));
        root.insert("Height".to_string(), Tag::Short(1));
        root.insert("Length".to_string(), Tag::Short(1));
        root.insert("Palette".to_string(), Tag::Compound(palette));
        root.insert("BlockData".to_string(), Tag::ByteArray(vec![0, 0]));
        let mut bytes = Vec::new();
        NBTFile::new(String::new(), Tag::Compound(root))
            .write_gzip(&mut bytes)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_import_with_missing_mapping_and_overrides() {
        let path = temp_path("crystal.schem");
        tokio::fs::write(&path, schematic_bytes()).await.unwrap();

        let config = ImportConfig {
            path: path.clone(),
            mapping: Some(temp_path("missing-mapping.json")),
            bounds: None,
            center: false,
            no_center: true,
            out: None,
            remaps: vec![("mod:crystal".to_string(), "glass".to_string())],
            skips: Vec::new(),
        };
        let result = import(&config).await;
        tokio::fs::remove_file(&path).await.unwrap();

        let result = result.unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("Using built-in block mapping"));
        assert_eq!(result.block_count, 2);
        assert_eq!(result.get(VoxelCoordinate::new(1, 0, 0)), Some("glass"));
        assert!(!result.has_unmapped());
    }

    #[tokio::test]
    async fn test_inspect_writes_json_file() {
        let path = temp_path("inspect.schem");
        let out = temp_path("inspect.json");
        tokio::fs::write(&path, schematic_bytes()).await.unwrap();

        let config = InspectConfig {
            path: path.clone(),
            json: Some(out.clone()),
        };
        run_inspect(&config).await.unwrap();
        let written = tokio::fs::read_to_string(&out).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();
        tokio::fs::remove_file(&out).await.unwrap();

        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json["format"], "modern_worldedit");
        assert_eq!(json["dimensions"]["total_volume"], 2);
    }
}
