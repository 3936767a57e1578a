//! Bank registry: canonical names and the lowercase aliases seen in real
//! notifications (sender names, SMS headers, misspellings).

use crate::locale::{fold_turkish, turkish_lowercase};

pub const AKBANK: &str = "Akbank";
pub const YAPI_KREDI: &str = "Yapı Kredi";
pub const ZIRAAT: &str = "Ziraat Bankası";
pub const GARANTI_BONUS: &str = "Garanti BBVA Bonus";
pub const KUVEYT_TURK: &str = "Kuveyt Türk";
pub const IS_BANKASI: &str = "İş Bankası";
pub const QNB: &str = "QNB";

/// Garanti loan notices come from the bank itself, not the Bonus card brand.
pub const GARANTI_BBVA: &str = "Garanti BBVA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankEntry {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

pub const BANKS: &[BankEntry] = &[
    BankEntry { name: AKBANK, aliases: &["akbank"] },
    BankEntry { name: YAPI_KREDI, aliases: &["yapı kredi", "yapikredi"] },
    BankEntry { name: ZIRAAT, aliases: &["ziraat"] },
    BankEntry { name: GARANTI_BONUS, aliases: &["garanti"] },
    BankEntry { name: KUVEYT_TURK, aliases: &["kuveyt türk", "kuveytturk"] },
    BankEntry { name: IS_BANKASI, aliases: &["iş bankası", "isbank"] },
    BankEntry { name: QNB, aliases: &["qnb finansbank", "finansbank"] },
];

/// Canonical names in registry order.
pub fn canonical_names() -> impl Iterator<Item = &'static str> {
    BANKS.iter().map(|b| b.name)
}

/// Flattened lowercase pattern list: each canonical name followed by its aliases.
pub fn match_patterns() -> Vec<String> {
    BANKS
        .iter()
        .flat_map(|b| {
            std::iter::once(turkish_lowercase(b.name))
                .chain(b.aliases.iter().map(|a| a.to_string()))
        })
        .collect()
}

/// Case-insensitive substring match against every name and alias.
///
/// Both sides are diacritic-folded, so "ISBANK" and "İŞ BANKASI" match too.
pub fn is_known_bank_name(text: &str) -> bool {
    let folded = fold_turkish(text);
    match_patterns()
        .iter()
        .any(|p| folded.contains(&fold_turkish(p)))
}

/// Resolve free text (alias, sender name) to the first matching canonical name.
pub fn canonical_bank_name(text: &str) -> Option<&'static str> {
    let folded = fold_turkish(text);
    BANKS
        .iter()
        .find(|b| {
            folded.contains(&fold_turkish(b.name))
                || b.aliases.iter().any(|a| folded.contains(&fold_turkish(a)))
        })
        .map(|b| b.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_are_lowercase_and_complete() {
        let patterns = match_patterns();
        for p in &patterns {
            assert_eq!(p, &turkish_lowercase(p));
        }
        for expected in [
            "akbank", "yapı kredi", "yapikredi", "ziraat", "garanti", "kuveyt türk",
            "kuveytturk", "iş bankası", "isbank", "qnb", "finansbank",
        ] {
            assert!(patterns.iter().any(|p| p == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_known_names_and_aliases() {
        for name in canonical_names() {
            assert!(is_known_bank_name(name), "{name}");
        }
        assert!(is_known_bank_name("AKBANK"));
        assert!(is_known_bank_name("yapikredi"));
        assert!(is_known_bank_name("ISBANK"));
        assert!(is_known_bank_name("QNB Finansbank"));
        assert!(is_known_bank_name("Garanti BBVA Bonus ekstre"));
    }

    #[test]
    fn test_unknown_names() {
        assert!(!is_known_bank_name("Denizbank"));
        assert!(!is_known_bank_name("HSBC"));
        assert!(!is_known_bank_name("Kira Ödemesi"));
        assert!(!is_known_bank_name(""));
    }

    #[test]
    fn test_canonical_resolution() {
        assert_eq!(canonical_bank_name("finansbank"), Some(QNB));
        assert_eq!(canonical_bank_name("KUVEYTTURK"), Some(KUVEYT_TURK));
        assert_eq!(canonical_bank_name("İŞ BANKASI"), Some(IS_BANKASI));
        assert_eq!(canonical_bank_name("Garanti BBVA"), Some(GARANTI_BONUS));
        assert_eq!(canonical_bank_name("Denizbank"), None);
    }
}
