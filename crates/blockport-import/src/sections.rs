//! Locates the list of sections inside a chunk tree.
//!
//! Chunk layouts moved the section list around between versions
//! (`sections` at the root, `Level.Sections`, wrapper compounds added by
//! other tools), so the search is recursive with a depth cap and a node
//! budget.

use blockport_nbt::Tag;

pub const MAX_SEARCH_DEPTH: usize = 8;
pub const MAX_VISITED_NODES: usize = 4096;

const SECTION_KEYS: [&str; 2] = ["sections", "Sections"];

/// Returns the first section list found, or `None`.
pub fn find_sections(root: &Tag) -> Option<&Vec<Tag>> {
    let mut visited = 0;
    search(root, 0, &mut visited)
}

/// Vertical index of a section record (`Y` or `y`).
pub fn section_y(section: &Tag) -> Option<i32> {
    section
        .get_any(&["Y", "y"])
        .and_then(Tag::as_number)
        .map(|y| y as i32)
}

fn is_section_list(list: &[Tag]) -> bool {
    list.iter()
        .any(|element| element.is_compound() && section_y(element).is_some())
}

fn search<'a>(tag: &'a Tag, depth: usize, visited: &mut usize) -> Option<&'a Vec<Tag>> {
    if depth > MAX_SEARCH_DEPTH || *visited >= MAX_VISITED_NODES {
        return None;
    }
    *visited += 1;

    let map = tag.as_compound()?;
    for key in SECTION_KEYS {
        if let Some(list) = map.get(key).and_then(Tag::as_list) {
            return Some(list);
        }
    }

    // Sorted so the result does not depend on hash order.
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    for key in &keys {
        if let Some(list) = map[*key].as_list() {
            if is_section_list(list) {
                return Some(list);
            }
        }
    }

    for key in &keys {
        let child = &map[*key];
        if child.is_compound() {
            if let Some(found) = search(child, depth + 1, visited) {
                return Some(found);
            }
        }
    }
    None
}
