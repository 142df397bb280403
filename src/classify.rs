use crate::data::osm::Tags;

/// Keys whose presence marks a closed way as an area.
const AREA_KEYS: &[&str] = &[
    "aeroway",
    "amenity",
    "building",
    "building:part",
    "historic",
    "landuse",
    "leisure",
    "man_made",
    "military",
    "place",
    "shop",
    "tourism",
];

/// `natural` values drawn as lines even when closed.
const LINEAR_NATURAL: &[&str] = &["coastline", "cliff", "ridge", "tree_row"];

pub fn has_key(tags: &Tags, key: &str) -> bool {
    tags.contains_key(key)
}

/// Matches a single value of a possibly `;`-separated tag value.
pub fn has_kv_pair(tags: &Tags, key: &str, value: &str) -> bool {
    if let Some(tag_value) = tags.get(key) {
        tag_value.split(';')
            .any(|tag| tag.trim() == value)
    } else {
        false
    }
}

/// Whether the tags describe an area rather than a linear feature. Only meaningful for closed
/// ways; the geometry builder still checks closure.
pub fn looks_like_polygon(tags: &Tags) -> bool {
    if has_kv_pair(tags, "area", "no") {
        return false;
    }
    if has_kv_pair(tags, "area", "yes") {
        return true;
    }
    if AREA_KEYS.iter().any(|key| has_key(tags, key)) {
        return true;
    }
    if let Some(natural) = tags.get("natural") {
        return natural
            .split(';')
            .any(|value| !LINEAR_NATURAL.contains(&value.trim()));
    }
    has_kv_pair(tags, "waterway", "riverbank")
}
