/// Reference set of medicinal species the hub accepts. A classifier label
/// outside this set never reaches storage or the record store.
///
/// Common names as the classifier tends to report them, one canonical entry
/// per species. Matching is case-insensitive on the trimmed label.
const REFERENCE_SET: &[&str] = &[
    "Neem",
    "Tulsi",
    "Holy Basil",
    "Ashwagandha",
    "Brahmi",
    "Aloe Vera",
    "Turmeric",
    "Giloy",
    "Guduchi",
    "Amla",
    "Indian Gooseberry",
    "Ginger",
    "Shatavari",
    "Arjuna",
    "Lemongrass",
    "Peppermint",
    "Curry Leaf",
    "Moringa",
    "Drumstick Tree",
    "Fenugreek",
    "Cinnamon",
    "Cardamom",
    "Clove",
    "Black Pepper",
    "Betel",
    "Sandalwood",
    "Eucalyptus",
    "Hibiscus",
    "Henna",
    "Vetiver",
    "Bael",
    "Jamun",
    "Kalmegh",
    "Andrographis",
    "Sarpagandha",
    "Indian Snakeroot",
    "Safed Musli",
    "Mulethi",
    "Licorice",
    "Bhringraj",
    "Punarnava",
    "Shankhpushpi",
    "Vasaka",
    "Malabar Nut",
    "Chirata",
    "Kutki",
    "Manjistha",
    "Gotu Kola",
    "Stinging Nettle",
    "Valerian",
];

/// Whether the classifier's label names a species in the reference set.
pub fn is_recognized(label: &str) -> bool {
    let label = label.trim();
    if label.is_empty() {
        return false;
    }
    REFERENCE_SET
        .iter()
        .any(|entry| entry.eq_ignore_ascii_case(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizes_known_species() {
        assert!(is_recognized("Neem"));
        assert!(is_recognized("Tulsi"));
        assert!(is_recognized("Aloe Vera"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(is_recognized("neem"));
        assert!(is_recognized("ALOE VERA"));
        assert!(is_recognized("  turmeric  "));
    }

    #[test]
    fn test_rejects_unlisted_species() {
        assert!(!is_recognized("Rose"));
        assert!(!is_recognized("Common Rose"));
        assert!(!is_recognized("Unknown"));
        assert!(!is_recognized(""));
        assert!(!is_recognized("   "));
    }
}
