//! Card Catalog
//!
//! Static mapping from a controller-kind-qualified device/subsystem ID pair
//! to a canonical card name. Functions with neither role marker are only
//! allocatable when they match an entry here; a miss means "not a card we
//! register", never an error.

use std::collections::HashMap;

use super::ControllerKind;

/// Immutable lookup table of recognized CAPI2/OpenCAPI cards.
///
/// Constructed once at startup (or per test fixture) and injected into the
/// classifier. The controller kind is always part of the key: several cards
/// carry the same subsystem ID in CAPI2 and OpenCAPI mode.
#[derive(Debug, Clone)]
pub struct CardCatalog {
    cards: HashMap<(ControllerKind, String), String>,
}

impl CardCatalog {
    /// Build a catalog from explicit entries. Subsystem IDs are normalized
    /// to lowercase so sysfs content matches regardless of hex case.
    pub fn new(entries: impl IntoIterator<Item = (ControllerKind, &'static str, &'static str)>) -> Self {
        let cards = entries
            .into_iter()
            .map(|(kind, sub_id, name)| ((kind, sub_id.to_ascii_lowercase()), name.to_string()))
            .collect();
        Self { cards }
    }

    /// The hand-maintained table of cards known to this plugin.
    pub fn known_cards() -> Self {
        use ControllerKind::{Capi2, OpenCapi};
        Self::new([
            (Capi2, "0x0665", "u200_capi2"),
            (Capi2, "0x0669", "u50_capi2"),
            (Capi2, "0x060f", "ad9v3_capi2"),
            (Capi2, "0x0667", "ad9h3_capi2"),
            (Capi2, "0x0668", "ad9h7_capi2"),
            (OpenCapi, "0x060f", "ad9v3_ocapi"),
            (OpenCapi, "0x0667", "ad9h3_ocapi"),
            (OpenCapi, "0x0666", "ad9h7_ocapi"),
            (OpenCapi, "0x066a", "bw250soc_ocapi"),
        ])
    }

    /// Canonical card name for `(kind, subsystem ID)`, or `None` when the
    /// pair is not a recognized card.
    pub fn lookup(&self, kind: ControllerKind, subsystem_id: &str) -> Option<&str> {
        self.cards
            .get(&(kind, subsystem_id.to_ascii_lowercase()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl Default for CardCatalog {
    fn default() -> Self {
        Self::known_cards()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_cards_lookup() {
        let catalog = CardCatalog::known_cards();
        assert_eq!(
            catalog.lookup(ControllerKind::Capi2, "0x0665"),
            Some("u200_capi2")
        );
        assert_eq!(
            catalog.lookup(ControllerKind::OpenCapi, "0x066a"),
            Some("bw250soc_ocapi")
        );
    }

    #[test]
    fn test_kind_disambiguates_shared_subsystem_ids() {
        let catalog = CardCatalog::known_cards();
        // 0x0667 is the AD9H3 in both modes, under different names.
        assert_eq!(
            catalog.lookup(ControllerKind::Capi2, "0x0667"),
            Some("ad9h3_capi2")
        );
        assert_eq!(
            catalog.lookup(ControllerKind::OpenCapi, "0x0667"),
            Some("ad9h3_ocapi")
        );
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = CardCatalog::known_cards();
        assert_eq!(
            catalog.lookup(ControllerKind::Capi2, "0x060F"),
            Some("ad9v3_capi2")
        );
    }

    #[test]
    fn test_miss_returns_none() {
        let catalog = CardCatalog::known_cards();
        assert_eq!(catalog.lookup(ControllerKind::Capi2, "0xffff"), None);
        assert!(!catalog.is_empty());
    }
}
