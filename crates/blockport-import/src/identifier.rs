//! Helpers for namespaced block identifiers such as
//! `minecraft:oak_stairs[facing=north,half=top]`.

use blockport_nbt::Tag;
use std::borrow::Cow;

pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// Plain names that never produce a voxel, compared case-insensitively.
pub const AIR_NAMES: [&str; 3] = ["air", "cave_air", "void_air"];

/// Drops a bracketed state suffix: `stone[variant=a]` -> `stone`.
pub fn base_name(id: &str) -> &str {
    match id.find('[') {
        Some(pos) => &id[..pos],
        None => id,
    }
}

/// Drops the namespace prefix but keeps any state suffix.
pub fn strip_namespace(id: &str) -> &str {
    let head = base_name(id);
    match head.find(':') {
        Some(pos) => &id[pos + 1..],
        None => id,
    }
}

pub fn has_namespace(id: &str) -> bool {
    base_name(id).contains(':')
}

pub fn with_default_namespace(id: &str) -> Cow<'_, str> {
    if has_namespace(id) {
        Cow::Borrowed(id)
    } else {
        Cow::Owned(format!("{}:{}", DEFAULT_NAMESPACE, id))
    }
}

/// Lower-cased name without namespace or states, used for category matching.
pub fn plain_name(id: &str) -> String {
    strip_namespace(base_name(id)).trim().to_ascii_lowercase()
}

pub fn is_air(id: &str) -> bool {
    let plain = plain_name(id);
    AIR_NAMES.iter().any(|air| *air == plain)
}

/// Builds `name[k=v,...]` from a palette record with sorted property keys, or
/// the bare name when there are no properties.
pub fn format_block_state(name: &str, properties: Option<&Tag>) -> String {
    let Some(props) = properties.and_then(Tag::as_compound) else {
        return name.to_owned();
    };
    if props.is_empty() {
        return name.to_owned();
    }

    let mut pairs: Vec<(&String, String)> = props
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Tag::String(s) => s.clone(),
                other => other
                    .as_number()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| other.type_name().to_owned()),
            };
            (key, value)
        })
        .collect();
    pairs.sort();

    let states: Vec<String> = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}[{}]", name, states.join(","))
}

/// Reads one palette entry: either a bare string or a record with a `Name`
/// field and optional `Properties`.
pub fn palette_entry_name(entry: &Tag) -> Option<String> {
    match entry {
        Tag::String(s) => Some(s.clone()),
        Tag::Compound(_) => {
            let name = entry.get_any(&["Name", "name"]).and_then(Tag::as_string)?;
            Some(format_block_state(name, entry.get_any(&["Properties", "properties"])))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_name_parts() {
        let id = "minecraft:oak_stairs[facing=north]";
        assert_eq!(base_name(id), "minecraft:oak_stairs");
        assert_eq!(strip_namespace(id), "oak_stairs[facing=north]");
        assert_eq!(plain_name(id), "oak_stairs");
        assert!(has_namespace(id));
        assert!(!has_namespace("stone[note=a:b]"));
        assert_eq!(strip_namespace("stone[note=a:b]"), "stone[note=a:b]");
        assert_eq!(with_default_namespace("stone"), "minecraft:stone");
        assert_eq!(with_default_namespace("mod:stone"), "mod:stone");
    }

    #[test]
    fn test_air_variants_any_case() {
        for id in [
            "air",
            "AIR",
            "minecraft:air",
            "Minecraft:Cave_Air",
            "minecraft:void_air[foo=bar]",
            "mod:air",
        ] {
            assert!(is_air(id), "{} should be air", id);
        }
        assert!(!is_air("minecraft:airship"));
        assert!(!is_air("minecraft:stone"));
    }

    #[test]
    fn test_palette_entry_with_properties() {
        let mut props = HashMap::new();
        props.insert("half".to_string(), Tag::String("top".to_string()));
        props.insert("facing".to_string(), Tag::String("north".to_string()));
        let mut entry = HashMap::new();
        entry.insert("Name".to_string(), Tag::String("minecraft:oak_stairs".to_string()));
        entry.insert("Properties".to_string(), Tag::Compound(props));

        assert_eq!(
            palette_entry_name(&Tag::Compound(entry)).as_deref(),
            Some("minecraft:oak_stairs[facing=north,half=top]")
        );
        assert_eq!(
            palette_entry_name(&Tag::String("mod:leaf".to_string())).as_deref(),
            Some("mod:leaf")
        );
        assert_eq!(palette_entry_name(&Tag::Int(1)), None);
    }
}
