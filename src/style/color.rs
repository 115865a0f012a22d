//! Color names and hex triplets to ASS byte order
//!
//! ASS colors are written blue-green-red (`&HBBGGRR`), the reverse of the
//! usual `#RRGGBB`. The palette below is already reversed.

/// Encoding used when input is not recognised
pub const WHITE: &str = "FFFFFF";

const PALETTE: &[(&str, &str)] = &[
    ("white", "FFFFFF"),
    ("black", "000000"),
    ("red", "0000FF"),
    ("green", "00FF00"),
    ("blue", "FF0000"),
    ("yellow", "00FFFF"),
    ("cyan", "FFFF00"),
    ("magenta", "FF00FF"),
    ("orange", "0080FF"),
    ("pink", "FF80FF"),
    ("purple", "800080"),
    ("brown", "003366"),
    ("gray", "808080"),
    ("grey", "808080"),
    ("lime", "00FF80"),
    ("navy", "800000"),
    ("silver", "C0C0C0"),
];

/// Resolve a color name or `#RRGGBB` / `RRGGBB` triplet to `BBGGRR`.
///
/// Never fails: anything unrecognised becomes white.
pub fn resolve_color(color: &str) -> String {
    let normalized = color.trim().to_lowercase();

    if let Some((_, bgr)) = PALETTE.iter().find(|(name, _)| *name == normalized) {
        return (*bgr).to_string();
    }

    let hex = normalized.strip_prefix('#').unwrap_or(&normalized);
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        let (r, g, b) = (&hex[0..2], &hex[2..4], &hex[4..6]);
        return format!("{}{}{}", b, g, r).to_uppercase();
    }

    tracing::debug!(color = %color, "Unrecognised color, using white");
    WHITE.to_string()
}
