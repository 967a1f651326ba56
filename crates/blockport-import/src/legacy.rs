//! Numeric block ids used before block states were flattened into names.
//!
//! Only the common ids and their notable data variants are listed. Anything
//! else is reported as `minecraft:legacy_<id>` and left to the resolver's
//! fallback chain.

const LEGACY_NAMES: [&str; 176] = [
    "air", "stone", "grass_block", "dirt", "cobblestone", "oak_planks", "oak_sapling", "bedrock",
    "water", "water", "lava", "lava", "sand", "gravel", "gold_ore", "iron_ore",
    "coal_ore", "oak_log", "oak_leaves", "sponge", "glass", "lapis_ore", "lapis_block", "dispenser",
    "sandstone", "note_block", "red_bed", "powered_rail", "detector_rail", "sticky_piston", "cobweb", "grass",
    "dead_bush", "piston", "piston_head", "white_wool", "moving_piston", "dandelion", "poppy", "brown_mushroom",
    "red_mushroom", "gold_block", "iron_block", "smooth_stone_slab", "smooth_stone_slab", "bricks", "tnt", "bookshelf",
    "mossy_cobblestone", "obsidian", "torch", "fire", "spawner", "oak_stairs", "chest", "redstone_wire",
    "diamond_ore", "diamond_block", "crafting_table", "wheat", "farmland", "furnace", "furnace", "oak_sign",
    "oak_door", "ladder", "rail", "cobblestone_stairs", "oak_wall_sign", "lever", "stone_pressure_plate", "iron_door",
    "oak_pressure_plate", "redstone_ore", "redstone_ore", "redstone_torch", "redstone_torch", "stone_button", "snow", "ice",
    "snow_block", "cactus", "clay", "sugar_cane", "jukebox", "oak_fence", "pumpkin", "netherrack",
    "soul_sand", "glowstone", "nether_portal", "carved_pumpkin", "cake", "repeater", "repeater", "white_stained_glass",
    "oak_trapdoor", "infested_stone", "stone_bricks", "brown_mushroom_block", "red_mushroom_block", "iron_bars", "glass_pane", "melon",
    "pumpkin_stem", "melon_stem", "vine", "oak_fence_gate", "brick_stairs", "stone_brick_stairs", "mycelium", "lily_pad",
    "nether_bricks", "nether_brick_fence", "nether_brick_stairs", "nether_wart", "enchanting_table", "brewing_stand", "cauldron", "end_portal",
    "end_portal_frame", "end_stone", "dragon_egg", "redstone_lamp", "redstone_lamp", "oak_slab", "oak_slab", "cocoa",
    "sandstone_stairs", "emerald_ore", "ender_chest", "tripwire_hook", "tripwire", "emerald_block", "spruce_stairs", "birch_stairs",
    "jungle_stairs", "command_block", "beacon", "cobblestone_wall", "flower_pot", "carrots", "potatoes", "oak_button",
    "skeleton_skull", "anvil", "trapped_chest", "light_weighted_pressure_plate", "heavy_weighted_pressure_plate", "comparator", "comparator", "daylight_detector",
    "redstone_block", "nether_quartz_ore", "hopper", "quartz_block", "quartz_stairs", "activator_rail", "dropper", "white_terracotta",
    "white_stained_glass_pane", "acacia_leaves", "acacia_log", "acacia_stairs", "dark_oak_stairs", "slime_block", "barrier", "iron_trapdoor",
    "prismarine", "sea_lantern", "hay_block", "white_carpet", "terracotta", "coal_block", "packed_ice", "sunflower",
];

const COLORS: [&str; 16] = [
    "white", "orange", "magenta", "light_blue", "yellow", "lime", "pink", "gray",
    "light_gray", "cyan", "purple", "blue", "brown", "green", "red", "black",
];

const STONE_VARIANTS: [&str; 7] = [
    "stone", "granite", "polished_granite", "diorite", "polished_diorite", "andesite",
    "polished_andesite",
];

const WOODS: [&str; 6] = ["oak", "spruce", "birch", "jungle", "acacia", "dark_oak"];

/// Modern namespaced name for a legacy `(id, data)` pair.
pub fn legacy_block_name(id: u16, data: u8) -> String {
    let data = (data & 0x0f) as usize;
    let name = match id {
        1 => STONE_VARIANTS.get(data).copied().unwrap_or("stone").to_string(),
        5 => format!("{}_planks", WOODS.get(data).copied().unwrap_or("oak")),
        17 => format!("{}_log", WOODS[data & 0x03]),
        18 => format!("{}_leaves", WOODS[data & 0x03]),
        161 => format!("{}_leaves", WOODS[4 + (data & 0x01)]),
        162 => format!("{}_log", WOODS[4 + (data & 0x01)]),
        12 if data == 1 => "red_sand".to_string(),
        35 => format!("{}_wool", COLORS[data]),
        95 => format!("{}_stained_glass", COLORS[data]),
        159 => format!("{}_terracotta", COLORS[data]),
        160 => format!("{}_stained_glass_pane", COLORS[data]),
        171 => format!("{}_carpet", COLORS[data]),
        251 => format!("{}_concrete", COLORS[data]),
        _ => match LEGACY_NAMES.get(id as usize) {
            Some(name) => name.to_string(),
            None => format!("legacy_{}", id),
        },
    };
    format!("minecraft:{}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ids() {
        assert_eq!(legacy_block_name(0, 0), "minecraft:air");
        assert_eq!(legacy_block_name(2, 0), "minecraft:grass_block");
        assert_eq!(legacy_block_name(9, 0), "minecraft:water");
        assert_eq!(legacy_block_name(175, 0), "minecraft:sunflower");
    }

    #[test]
    fn test_data_variants() {
        assert_eq!(legacy_block_name(1, 3), "minecraft:diorite");
        assert_eq!(legacy_block_name(1, 9), "minecraft:stone");
        assert_eq!(legacy_block_name(35, 14), "minecraft:red_wool");
        assert_eq!(legacy_block_name(17, 6), "minecraft:birch_log");
        assert_eq!(legacy_block_name(162, 1), "minecraft:dark_oak_log");
        assert_eq!(legacy_block_name(12, 1), "minecraft:red_sand");
    }

    #[test]
    fn test_unknown_id() {
        assert_eq!(legacy_block_name(300, 0), "minecraft:legacy_300");
    }
}
