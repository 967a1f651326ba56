use blockport_common::Bounds;
use blockport_import::BlockOverride;
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "blockport", about = "Import Minecraft worlds and schematics into a voxel map")]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum CliCommand {
    /// Import a world archive, region file or schematic and print the voxel map as JSON
    Import(ImportConfig),
    /// Report the structure of a schematic file, or of every schematic in a directory
    Inspect(InspectConfig),
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct ImportConfig {
    /// World zip or directory, region file (.mca) or schematic
    pub path: PathBuf,
    /// Block mapping document (JSON). Falls back to the built-in table
    #[arg(long)]
    pub mapping: Option<PathBuf>,
    /// Inclusive bounding box
    #[arg(long, value_name = "X1,Y1,Z1,X2,Y2,Z2", allow_hyphen_values = true)]
    pub bounds: Option<Bounds>,
    /// Center schematics on the origin (the default for schematics)
    #[arg(long, conflicts_with = "no_center")]
    pub center: bool,
    /// Keep the offset declared by the file
    #[arg(long)]
    pub no_center: bool,
    /// Output file, stdout when omitted
    #[arg(long, short)]
    pub out: Option<PathBuf>,
    /// Remap every voxel of a source block after import
    #[arg(long = "override", value_name = "NAME=TARGET", value_parser = parse_remap)]
    pub remaps: Vec<(String, String)>,
    /// Drop every voxel of a source block after import
    #[arg(long = "skip", value_name = "NAME")]
    pub skips: Vec<String>,
}

impl ImportConfig {
    pub fn center(&self) -> Option<bool> {
        match (self.center, self.no_center) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Remaps and skips keyed by source name. A skip wins over a remap of the same name.
    pub fn overrides(&self) -> HashMap<String, BlockOverride> {
        let mut overrides: HashMap<String, BlockOverride> = self
            .remaps
            .iter()
            .map(|(name, target)| (name.clone(), BlockOverride::Remap(target.clone())))
            .collect();
        for name in &self.skips {
            overrides.insert(name.trim().to_string(), BlockOverride::Skip);
        }
        overrides
    }
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct InspectConfig {
    /// Schematic file or directory of schematics
    pub path: PathBuf,
    /// Write the report to this file instead of stdout
    #[arg(long)]
    pub json: Option<PathBuf>,
}

fn parse_remap(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, target)| (name.trim(), target.trim()))
        .filter(|(name, target)| !name.is_empty() && !target.is_empty())
        .map(|(name, target)| (name.to_string(), target.to_string()))
        .ok_or_else(|| format!("expected <name>=<target> but got '{}'", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use blockport_common::VoxelCoordinate;
    use clap::error::ErrorKind;

    fn parse(list: &[&str]) -> Result<CliCommand, clap::Error> {
        Cli::try_parse_from(std::iter::once("blockport").chain(list.iter().copied())).map(|cli| cli.command)
    }

    #[test]
    fn test_parse_import() {
        let command = parse(&[
            "import",
            "world.zip",
            "--mapping",
            "map.json",
            "--bounds",
            "10,0,10,-10,64,-10",
            "--no-center",
            "--override",
            "mod:crystal=glass",
            "--skip",
            "mod:moss",
        ])
        .unwrap();

        let CliCommand::Import(config) = command else {
            panic!("expected import, got {:?}", command);
        };
        assert_eq!(config.path, PathBuf::from("world.zip"));
        assert_eq!(config.mapping, Some(PathBuf::from("map.json")));
        assert_eq!(config.center(), Some(false));
        assert_eq!(config.out, None);
        assert_eq!(config.bounds.map(|b| b.min), Some(VoxelCoordinate::new(-10, 0, -10)));

        let overrides = config.overrides();
        assert_eq!(overrides.get("mod:crystal"), Some(&BlockOverride::Remap("glass".to_string())));
        assert_eq!(overrides.get("mod:moss"), Some(&BlockOverride::Skip));
    }

    #[test]
    fn test_center_defaults_to_source_kind() {
        let CliCommand::Import(config) = parse(&["import", "a.schem"]).unwrap() else {
            panic!("expected import");
        };
        assert_eq!(config.center(), None);
        assert!(config.overrides().is_empty());
    }

    #[test]
    fn test_parse_inspect() {
        assert_eq!(
            parse(&["inspect", "schematics", "--json", "out.json"]).unwrap(),
            CliCommand::Inspect(InspectConfig {
                path: PathBuf::from("schematics"),
                json: Some(PathBuf::from("out.json")),
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        let kind = |list: &[&str]| parse(list).map_err(|e| e.kind());
        assert!(parse(&[]).is_err());
        assert!(parse(&["export"]).is_err());
        assert!(parse(&["import", "a", "--mapping"]).is_err());
        assert_matches!(kind(&["import"]), Err(ErrorKind::MissingRequiredArgument));
        assert_matches!(kind(&["import", "a", "--bounds", "1,2,3"]), Err(ErrorKind::ValueValidation));
        assert_matches!(kind(&["import", "a", "--override", "nothing"]), Err(ErrorKind::ValueValidation));
        assert_matches!(kind(&["import", "a", "--center", "--no-center"]), Err(ErrorKind::ArgumentConflict));
        assert_matches!(kind(&["inspect", "a", "b"]), Err(ErrorKind::UnknownArgument));
        assert_matches!(kind(&["inspect", "a", "--verbose"]), Err(ErrorKind::UnknownArgument));
    }
}
