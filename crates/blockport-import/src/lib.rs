pub mod archive;
pub mod decompress;
pub mod identifier;
pub mod import;
pub mod inspect;
pub mod legacy;
pub mod mapping;
pub mod palette;
pub mod region;
pub mod resolver;
pub mod run;
pub mod schematic;
pub mod sections;
pub mod stats;
pub mod transform;

// Re-export commonly used items
pub use archive::{DirectoryArchive, MemoryArchive, WorldArchive, ZipWorldArchive};
pub use import::{import_path, import_region_bytes, import_schematic_bytes, import_world};
pub use inspect::{analyze_bytes, analyze_file, inspect_directory, SchematicReport};
pub use mapping::{load_mapping, load_mapping_or_default, BlockMappingTable};
pub use resolver::{BlockResolver, Resolution, ResolutionKind, UnmappedBlockRecord};
pub use run::{BlockOverride, ImportOptions, ImportResult, SourceKind};
pub use schematic::{decode_schematic, SchematicDocument, SchematicFormat};
pub use stats::ImportStatistics;
