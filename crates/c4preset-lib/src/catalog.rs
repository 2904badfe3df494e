//! Preset catalog: the compacted list of non-empty slots found by discovery.
//!
//! Entries keep the order slots were scanned in (ascending slot index), which
//! is also the navigation order. Storage is fixed-capacity: the device never
//! holds more than [`SLOT_COUNT`] presets.

use serde::{Serialize, Serializer};

use crate::protocol::{NAME_LEN, SLOT_COUNT};

/// Raw 32-byte preset name as stored on the device.
///
/// Names are ASCII, not null-terminated, and padded; the padding byte varies
/// between presets saved by different editor versions.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PresetName([u8; NAME_LEN]);

impl Default for PresetName {
    fn default() -> Self {
        PresetName([0; NAME_LEN])
    }
}

impl PresetName {
    pub fn from_bytes(bytes: [u8; NAME_LEN]) -> Self {
        PresetName(bytes)
    }

    /// Build a name from text, truncated to 32 bytes and space padded.
    pub fn from_text(text: &str) -> Self {
        let mut bytes = [b' '; NAME_LEN];
        let src = text.as_bytes();
        let n = src.len().min(NAME_LEN);
        bytes[..n].copy_from_slice(&src[..n]);
        PresetName(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NAME_LEN] {
        &self.0
    }

    /// Printable text: stops at the first NUL or 0xFF, replaces
    /// non-printable bytes with `?`, trims trailing spaces.
    pub fn text(&self) -> String {
        let end = self
            .0
            .iter()
            .position(|&b| b == 0 || b == 0xFF)
            .unwrap_or(NAME_LEN);
        let s: String = self.0[..end]
            .iter()
            .map(|&b| {
                if (0x20..=0x7E).contains(&b) {
                    b as char
                } else {
                    '?'
                }
            })
            .collect();
        s.trim_end().to_string()
    }

    /// First `width` characters of [`text`](Self::text), space padded to
    /// exactly `width` so a shorter name overwrites a longer one on screen.
    pub fn display_text(&self, width: usize) -> String {
        let text: String = self.text().chars().take(width).collect();
        format!("{text:<width$}")
    }
}

impl std::fmt::Debug for PresetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PresetName({:?})", self.text())
    }
}

impl std::fmt::Display for PresetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

impl Serialize for PresetName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text())
    }
}

/// One active preset: where it lives on the device and what it is called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// Device-native slot index (0-based).
    pub slot: u8,
    pub name: PresetName,
}

impl CatalogEntry {
    /// Human-facing preset number (1-based, Neuro Desktop range).
    pub fn preset_number(&self) -> u16 {
        self.slot as u16 + 1
    }
}

/// Ordered, fixed-capacity list of active presets.
#[derive(Clone)]
pub struct Catalog {
    entries: [CatalogEntry; SLOT_COUNT],
    len: usize,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            entries: [CatalogEntry::default(); SLOT_COUNT],
            len: 0,
        }
    }

    /// Number of active presets.
    pub fn count(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn entry_at(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries[..self.len].get(index)
    }

    /// Device slot of the entry at `index`.
    pub fn original_index_at(&self, index: usize) -> Option<u8> {
        self.entry_at(index).map(|e| e.slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries[..self.len].iter()
    }

    /// Append an entry. Returns `false` if the catalog is full.
    pub(crate) fn push(&mut self, entry: CatalogEntry) -> bool {
        if self.len == SLOT_COUNT {
            return false;
        }
        self.entries[self.len] = entry;
        self.len += 1;
        true
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(slot: u8, name: &str) -> CatalogEntry {
        CatalogEntry {
            slot,
            name: PresetName::from_text(name),
        }
    }

    // ── PresetName ──

    #[test]
    fn text_trims_space_padding() {
        assert_eq!(PresetName::from_text("Octave Fuzz").text(), "Octave Fuzz");
    }

    #[test]
    fn text_stops_at_nul() {
        let mut bytes = [b'x'; NAME_LEN];
        bytes[..3].copy_from_slice(b"Pad");
        bytes[3] = 0;
        assert_eq!(PresetName::from_bytes(bytes).text(), "Pad");
    }

    #[test]
    fn text_stops_at_ff_padding() {
        let mut bytes = [0xFF; NAME_LEN];
        bytes[..4].copy_from_slice(b"Lead");
        assert_eq!(PresetName::from_bytes(bytes).text(), "Lead");
    }

    #[test]
    fn text_replaces_non_printable() {
        let mut bytes = [b' '; NAME_LEN];
        bytes[..3].copy_from_slice(&[b'A', 0x07, b'B']);
        assert_eq!(PresetName::from_bytes(bytes).text(), "A?B");
    }

    #[test]
    fn text_uses_all_32_bytes_when_unpadded() {
        let name = PresetName::from_text("ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789");
        assert_eq!(name.text(), "ABCDEFGHIJKLMNOPQRSTUVWXYZ012345");
    }

    #[test]
    fn display_text_truncates_to_width() {
        let name = PresetName::from_text("A very long preset name indeed");
        assert_eq!(name.display_text(20), "A very long preset n");
    }

    #[test]
    fn display_text_pads_to_width() {
        let name = PresetName::from_text("Short");
        let shown = name.display_text(20);
        assert_eq!(shown.len(), 20);
        assert!(shown.starts_with("Short"));
    }

    #[test]
    fn name_serializes_as_text() {
        let json = serde_json::to_string(&PresetName::from_text("Synth")).unwrap();
        assert_eq!(json, "\"Synth\"");
    }

    // ── Catalog ──

    #[test]
    fn new_catalog_is_empty() {
        let c = Catalog::new();
        assert!(c.is_empty());
        assert_eq!(c.count(), 0);
        assert!(c.entry_at(0).is_none());
        assert!(c.original_index_at(0).is_none());
    }

    #[test]
    fn push_preserves_order() {
        let mut c = Catalog::new();
        c.push(entry(0, "A"));
        c.push(entry(2, "B"));
        c.push(entry(9, "C"));
        assert_eq!(c.count(), 3);
        let slots: Vec<u8> = c.iter().map(|e| e.slot).collect();
        assert_eq!(slots, vec![0, 2, 9]);
        assert_eq!(c.original_index_at(1), Some(2));
        assert_eq!(c.entry_at(2).unwrap().name.text(), "C");
    }

    #[test]
    fn push_refuses_past_capacity() {
        let mut c = Catalog::new();
        for slot in 0..SLOT_COUNT {
            assert!(c.push(entry(slot as u8, "x")));
        }
        assert!(!c.push(entry(0, "overflow")));
        assert_eq!(c.count(), SLOT_COUNT);
    }

    #[test]
    fn clear_empties() {
        let mut c = Catalog::new();
        c.push(entry(3, "A"));
        c.clear();
        assert!(c.is_empty());
        assert!(c.entry_at(0).is_none());
    }

    #[test]
    fn preset_number_is_one_based() {
        assert_eq!(entry(0, "A").preset_number(), 1);
        assert_eq!(entry(127, "A").preset_number(), 128);
    }

    #[test]
    fn catalog_serializes_as_list() {
        let mut c = Catalog::new();
        c.push(entry(4, "Bass"));
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"[{"slot":4,"name":"Bass"}]"#);
    }
}
