//! Byte order marks.

const UTF_8: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF_16_BE: &[u8] = &[0xFE, 0xFF];
const UTF_16_LE: &[u8] = &[0xFF, 0xFE];
const UTF_32_BE: &[u8] = &[0x00, 0x00, 0xFE, 0xFF];
const UTF_32_LE: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
const UTF_7: &[&[u8]] = &[
    &[0x2B, 0x2F, 0x76, 0x38],
    &[0x2B, 0x2F, 0x76, 0x39],
    &[0x2B, 0x2F, 0x76, 0x2B],
    &[0x2B, 0x2F, 0x76, 0x2F],
];

fn normalize(encoding: &str) -> String {
    encoding.trim().to_ascii_uppercase().replace('_', "-")
}

/// Every BOM variant known for an encoding, in emission order.
pub fn variants(encoding: &str) -> &'static [&'static [u8]] {
    match normalize(encoding).as_str() {
        "UTF-8" | "UTF8" => &[UTF_8],
        "UTF-16BE" => &[UTF_16_BE],
        "UTF-16LE" | "UTF-16" => &[UTF_16_LE],
        "UTF-32BE" => &[UTF_32_BE],
        "UTF-32LE" | "UTF-32" => &[UTF_32_LE],
        "UTF-7" => UTF_7,
        _ => &[],
    }
}

/// The BOM written for an encoding, if it has one.
pub fn for_encoding(encoding: &str) -> Option<&'static [u8]> {
    variants(encoding).first().copied()
}

/// Length of the BOM of `encoding` found at the start of `bytes`, if any.
pub fn find(encoding: &str, bytes: &[u8]) -> Option<usize> {
    variants(encoding)
        .iter()
        .find(|bom| bytes.starts_with(bom))
        .map(|bom| bom.len())
}

/// Sniffs the encoding announced by a leading BOM.
///
/// UTF-32LE is checked before UTF-16LE since its BOM starts with the same two
/// bytes.
pub fn sniff(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(UTF_32_LE) {
        Some("UTF-32LE")
    } else if bytes.starts_with(UTF_32_BE) {
        Some("UTF-32BE")
    } else if bytes.starts_with(UTF_8) {
        Some("UTF-8")
    } else if bytes.starts_with(UTF_16_LE) {
        Some("UTF-16LE")
    } else if bytes.starts_with(UTF_16_BE) {
        Some("UTF-16BE")
    } else if UTF_7.iter().any(|bom| bytes.starts_with(bom)) {
        Some("UTF-7")
    } else {
        None
    }
}
