//! Small helpers shared by the OOXML part readers.

use quick_xml::events::BytesStart;
use std::io::{Read, Seek};
use zip::ZipArchive;

/// Attribute value by exact key (`r`, `s`, `r:id`)
pub fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return attr.unescape_value().ok().map(|v| v.into_owned());
        }
    }
    None
}

/// Attribute value by local name, ignoring any namespace prefix
pub fn attr_string_local(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == key {
            return attr.unescape_value().ok().map(|v| v.into_owned());
        }
    }
    None
}

pub fn attr_u32(e: &BytesStart, key: &[u8]) -> Option<u32> {
    attr_string(e, key).and_then(|s| s.parse().ok())
}

pub fn attr_i64(e: &BytesStart, key: &[u8]) -> Option<i64> {
    attr_string(e, key).and_then(|s| s.parse().ok())
}

/// The `val` attribute, very common in SpreadsheetML and DrawingML
pub fn attr_val(e: &BytesStart) -> Option<String> {
    attr_string(e, b"val")
}

/// Boolean toggle elements such as `<b/>` or `<b val="0"/>`
pub fn toggle_val(e: &BytesStart) -> bool {
    match attr_val(e) {
        Some(v) => matches!(v.as_str(), "1" | "true"),
        None => true,
    }
}

pub fn local_name_str(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Read a package part into a string, `None` when the part is missing
pub fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Option<String> {
    let mut file = archive.by_name(path.trim_start_matches('/')).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    Some(content)
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
pub fn rels_path_for(part_path: &str) -> String {
    match part_path.rfind('/') {
        Some(pos) => format!("{}/_rels/{}.rels", &part_path[..pos], &part_path[pos + 1..]),
        None => format!("_rels/{part_path}.rels"),
    }
}

pub fn dir_of(part_path: &str) -> &str {
    match part_path.rfind('/') {
        Some(pos) => &part_path[..pos],
        None => "",
    }
}

/// Resolve a relationship target (`../charts/chart1.xml`) against the
/// directory of the part that owns the relationship.
pub fn resolve_relative_path(base_dir: &str, relative: &str) -> String {
    if let Some(stripped) = relative.strip_prefix('/') {
        return stripped.to_string();
    }

    let mut components: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in relative.split('/') {
        match part {
            ".." => {
                components.pop();
            }
            "." | "" => {}
            _ => components.push(part),
        }
    }
    components.join("/")
}
