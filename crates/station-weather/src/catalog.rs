//! Weather condition catalog.
//!
//! Maps the provider's condition codes to display labels (Chinese and English)
//! and icon glyphs. The table is fixed; three lookup indices are derived from it
//! once and never mutated afterwards.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Icon returned for codes the catalog does not know.
pub const UNKNOWN_ICON: &str = "❓";

/// Label returned for codes the catalog does not know.
pub const UNKNOWN_LABEL: &str = "未知天氣";

/// One row of the condition table.
#[derive(Debug, Clone, Copy)]
pub struct CatalogRow {
    pub code: &'static str,
    pub label_zh: &'static str,
    pub label_en: &'static str,
    pub icon: &'static str,
}

const fn row(
    code: &'static str,
    label_zh: &'static str,
    label_en: &'static str,
    icon: &'static str,
) -> CatalogRow {
    CatalogRow {
        code,
        label_zh,
        label_en,
        icon,
    }
}

/// Condition table. Row order matters: the first icon seen for a code is its
/// canonical icon and the first Chinese label is its primary label.
const CONDITION_TABLE: &[CatalogRow] = &[
    row("01", "晴", "CLEAR", "☀️"),
    row("01", "晴天", "CLEAR", "☀️"),
    row("02", "晴時多雲", "MOSTLY CLEAR", "🌤️"),
    row("03", "多雲時晴", "PARTLY CLEAR", "⛅"),
    row("04", "多雲", "PARTLY CLOUDY", "☁️"),
    row("05", "多雲時陰", "CLOUDY", "🌥️"),
    row("06", "陰時多雲", "MOSTLY CLOUDY", "🌥️"),
    row("07", "陰", "CLOUDY", "☁️"),
    row("07", "陰天", "CLOUDY", "☁️"),
    row("08", "多雲陣雨", "PARTLY CLOUDY WITH SHOWERS", "🌦️"),
    row("08", "多雲短暫雨", "PARTLY CLOUDY WITH OCCASIONAL RAIN", "🌦️"),
    row("08", "多雲短暫陣雨", "PARTLY CLOUDY WITH OCCASIONAL SHOWERS", "🌦️"),
    row("08", "午後短暫陣雨", "OCCASIONAL AFTERNOON SHOWERS", "🌦️"),
    row("08", "短暫陣雨", "OCCASIONAL SHOWERS", "🌦️"),
    row("08", "短暫雨", "OCCASIONAL RAIN", "🌦️"),
    row("09", "多雲時陰短暫雨", "MOSTLY CLOUDY WITH OCCASIONAL RAIN", "🌧️"),
    row("09", "多雲時陰短暫陣雨", "MOSTLY CLOUDY WITH OCCASIONAL SHOWERS", "🌧️"),
    row("10", "陰時多雲短暫雨", "MOSTLY CLOUDY WITH OCCASIONAL RAIN", "🌧️"),
    row("10", "陰時多雲短暫陣雨", "MOSTLY CLOUDY WITH OCCASIONAL SHOWERS", "🌧️"),
    row("11", "雨", "RAINY", "🌧️"),
    row("11", "雨天", "RAINY", "🌧️"),
    row("11", "陰短暫雨", "CLOUDY WITH OCCASIONAL RAIN", "🌧️"),
    row("11", "陰短暫陣雨", "CLOUDY WITH OCCASIONAL SHOWERS", "🌧️"),
    row("12", "多雲時陰有雨", "MOSTLY CLOUDY WITH RAIN", "🌧️"),
    row("12", "多雲時陰陣雨", "MOSTLY CLOUDY WITH SHOWERS", "🌧️"),
    row("12", "晴時多雲陣雨", "MOSTLY CLEAR WITH SHOWERS", "🌦️"),
    row("13", "陰時多雲有雨", "MOSTLY CLOUDY WITH RAIN", "🌧️"),
    row("13", "陰時多雲有陣雨", "MOSTLY CLOUDY WITH SHOWERS", "🌧️"),
    row("14", "陰有雨", "RAINY", "🌧️"),
    row("14", "陰有陣雨", "CLOUDY WITH SHOWERS", "🌧️"),
    row("14", "陣雨", "SHOWERS", "🌧️"),
    row("15", "多雲陣雨或雷雨", "PARTLY CLOUDY WITH SHOWERS OR THUNDERSHOWERS", "⛈️"),
    row("15", "多雲短暫陣雨或雷雨", "PARTLY CLOUDY WITH OCCASIONAL SHOWERS OR THUNDERSHOWERS", "⛈️"),
    row("15", "多雲短暫雷陣雨", "PARTLY CLOUDY WITH OCCASIONAL THUNDERSHOWERS", "⛈️"),
    row("15", "短暫陣雨或雷雨", "OCCASIONAL SHOWERS OR THUNDERSTORMS", "⛈️"),
    row("16", "多雲時陰陣雨或雷雨", "PARTLY CLOUDY WITH SHOWERS OR THUNDERSTORMS", "⛈️"),
    row("16", "多雲時陰雷陣雨", "PARTLY CLOUDY WITH THUNDERSHOWERS", "⛈️"),
    row("17", "陰時多雲有雷陣雨", "MOSTLY CLOUDY WITH THUNDERSHOWERS", "⛈️"),
    row("17", "陰時多雲陣雨或雷雨", "MOSTLY CLOUDY WITH SHOWERS OR THUNDERSTORMS", "⛈️"),
    row("18", "雷雨", "THUNDERSTORMS", "⛈️"),
    row("18", "雷陣雨", "THUNDERSHOWERS", "⛈️"),
    row("18", "午後雷陣雨", "AFTERNOON THUNDERSHOWERS", "⛈️"),
    row("18", "陰有雷陣雨", "CLOUDY WITH THUNDERSHOWERS", "⛈️"),
    row("19", "晴午後多雲局部雨", "CLEAR BECOMING PARTLY CLOUDY WITH LOCAL RAIN IN THE AFTERNOON", "🌦️"),
    row("19", "晴午後局部雨", "CLEAR WITH LOCAL AFTERNOON RAIN", "🌦️"),
    row("19", "晴午後短暫雨", "CLEAR WITH OCCASIONAL AFTERNOON RAIN", "🌦️"),
    row("20", "多雲午後局部雨", "PARTLY CLOUDY WITH LOCAL AFTERNOON RAIN", "🌦️"),
    row("20", "多雲午後陣雨", "PARTLY CLOUDY WITH AFTERNOON SHOWERS", "🌦️"),
    row("21", "晴午後多雲雷陣雨", "CLEAR BECOMING PARTLY CLOUDY WITH THUNDERSHOWERS IN THE AFTERNOON", "⛈️"),
    row("21", "晴午後雷陣雨", "CLEAR WITH AFTERNOON THUNDERSHOWERS", "⛈️"),
    row("22", "多雲午後局部雷陣雨", "PARTLY CLOUDY WITH LOCAL AFTERNOON THUNDERSHOWERS", "⛈️"),
    row("22", "多雲午後雷陣雨", "PARTLY CLOUDY WITH AFTERNOON THUNDERSHOWERS", "⛈️"),
    row("23", "有雨或雪", "RAIN OR SNOW", "🌨️"),
    row("23", "陰有雨或雪", "CLOUDY WITH RAIN OR SNOW", "🌨️"),
    row("23", "短暫雨或雪", "OCCASIONAL RAIN OR SNOW", "🌨️"),
    row("23", "有雪", "SNOW", "❄️"),
    row("23", "下雪", "SNOW", "❄️"),
    row("24", "晴有霧", "CLEAR WITH FOG", "🌫️"),
    row("24", "晴晨霧", "CLEAR WITH MORNING FOG", "🌫️"),
    row("25", "晴時多雲有霧", "MOSTLY CLEAR WITH FOG", "🌫️"),
    row("26", "多雲時晴有霧", "PARTLY CLEAR WITH FOG", "🌫️"),
    row("27", "多雲有霧", "PARTLY CLOUDY WITH FOG", "🌫️"),
    row("27", "有霧", "WITH FOG", "🌫️"),
    row("28", "陰有霧", "CLOUDY WITH FOG", "🌫️"),
    row("28", "陰時多雲有霧", "MOSTLY CLOUDY WITH FOG", "🌫️"),
    row("29", "多雲局部雨", "PARTLY CLOUDY WITH LOCAL RAIN", "🌦️"),
    row("30", "多雲時陰局部雨", "MOSTLY CLOUDY WITH LOCAL RAIN", "🌧️"),
    row("30", "陰局部雨", "CLOUDY WITH LOCAL RAIN", "🌧️"),
    row("31", "多雲有霧有局部雨", "PARTLY CLOUDY WITH FOG AND LOCAL RAIN", "🌫️🌦️"),
    row("31", "多雲有霧有陣雨", "PARTLY CLOUDY WITH FOG AND RAIN", "🌫️🌦️"),
    row("32", "多雲時陰有霧有局部雨", "MOSTLY CLOUDY WITH FOG AND LOCAL RAIN", "🌫️🌧️"),
    row("32", "陰有霧有陣雨", "CLOUDY WITH FOG AND SHOWERS", "🌫️🌧️"),
    row("33", "多雲局部陣雨或雷雨", "PARTLY CLOUDY WITH LOCAL SHOWERS OR THUNDERSHOWERS", "⛈️"),
    row("33", "多雲局部雷陣雨", "PARTLY CLOUDY WITH LOCAL THUNDERSHOWERS", "⛈️"),
    row("34", "多雲時陰局部陣雨或雷雨", "PARTLY CLOUDY WITH LOCAL SHOWERS OR THUNDERSHOWERS", "⛈️"),
    row("34", "陰局部陣雨或雷雨", "CLOUDY WITH LOCAL SHOWERS OR THUNDERSTORMS", "⛈️"),
    row("35", "多雲有陣雨或雷雨有霧", "PARTLY CLOUDY WITH SHOWERS OR THUNDERSTORMS AND FOG", "⛈️🌫️"),
    row("35", "多雲有雷陣雨有霧", "PARTLY CLOUDY WITH THUNDERSHOWERS AND FOG", "⛈️🌫️"),
    row("36", "多雲時陰有陣雨或雷雨有霧", "MOSTLY CLOUDY WITH SHOWERS OR THUNDERSTORMS AND FOG", "⛈️🌫️"),
    row("36", "陰有雷陣雨有霧", "CLOUDY WITH THUNDERSHOWERS AND FOG", "⛈️🌫️"),
    row("37", "有雨或雪有霧", "RAIN OR SNOW WITH FOG", "🌨️🌫️"),
    row("38", "短暫陣雨有霧", "OCCASIONAL SHOWERS WITH FOG", "🌧️🌫️"),
    row("39", "有雨有霧", "RAIN WITH FOG", "🌧️🌫️"),
    row("39", "陣雨有霧", "SHOWERS WITH FOG", "🌧️🌫️"),
    row("41", "陣雨或雷雨有霧", "SHOWERS OR THUNDERSTORMS WITH FOG", "⛈️🌫️"),
    row("42", "下雪", "SNOW", "❄️"),
    row("42", "積冰", "ICE", "❄️"),
    row("42", "暴風雪", "SNOW FLURRIES", "🌨️"),
];

/// Normalized condition code.
///
/// Codes compare as integers, so `"01"`, `"1"` and `1` are the same key. A
/// blank or non-numeric code becomes [`CodeKey::Empty`], which never matches a
/// real code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CodeKey {
    Empty,
    Code(u32),
}

impl CodeKey {
    /// Parse a provider code, keeping only its leading digits.
    pub fn parse(raw: &str) -> Self {
        let digits: String = raw
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse::<u32>().map(Self::Code).unwrap_or(Self::Empty)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<&str> for CodeKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<&String> for CodeKey {
    fn from(raw: &String) -> Self {
        Self::parse(raw)
    }
}

impl From<u32> for CodeKey {
    fn from(code: u32) -> Self {
        Self::Code(code)
    }
}

impl<T: Into<CodeKey>> From<Option<T>> for CodeKey {
    fn from(code: Option<T>) -> Self {
        code.map(Into::into).unwrap_or(Self::Empty)
    }
}

impl std::fmt::Display for CodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Code(code) => write!(f, "{}", code),
        }
    }
}

impl Serialize for CodeKey {
    /// Serialized in the provider's two-digit form, e.g. `"04"`.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_str(""),
            Self::Code(code) => serializer.collect_str(&format_args!("{:02}", code)),
        }
    }
}

/// Label language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Traditional Chinese (ideographic, matched case-sensitively)
    Zh,
    /// English (Latin, matched case-insensitively)
    En,
}

impl Locale {
    /// Guess the locale of a free-text label: anything containing Latin
    /// letters is English.
    pub fn detect(label: &str) -> Self {
        if label.chars().any(|c| c.is_ascii_alphabetic()) {
            Self::En
        } else {
            Self::Zh
        }
    }

    fn normalize_label(&self, label: &str) -> String {
        match self {
            Self::Zh => label.trim().to_string(),
            Self::En => label.trim().to_uppercase(),
        }
    }
}

/// A single label for a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelEntry {
    pub label: &'static str,
    pub locale: Locale,
    pub icon: &'static str,
}

/// Everything the catalog knows about one code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionEntry {
    pub code: CodeKey,
    pub icon: &'static str,
    pub labels_by_locale: BTreeMap<Locale, Vec<&'static str>>,
}

/// Lookup service over the condition table.
#[derive(Debug)]
pub struct CodeCatalog {
    icons: HashMap<CodeKey, &'static str>,
    codes: HashMap<(Locale, String), CodeKey>,
    labels: HashMap<CodeKey, Vec<LabelEntry>>,
    canonical: Vec<CodeKey>,
}

impl CodeCatalog {
    /// Build the catalog indices from the fixed table.
    pub fn new() -> Self {
        Self::from_rows(CONDITION_TABLE)
    }

    /// Shared instance built on first use.
    pub fn global() -> &'static CodeCatalog {
        static CATALOG: OnceLock<CodeCatalog> = OnceLock::new();
        CATALOG.get_or_init(CodeCatalog::new)
    }

    fn from_rows(rows: &[CatalogRow]) -> Self {
        let mut icons = HashMap::new();
        let mut codes = HashMap::new();
        let mut labels: HashMap<CodeKey, Vec<LabelEntry>> = HashMap::new();
        let mut canonical = Vec::new();
        let mut seen = HashSet::new();

        for row in rows {
            let code = CodeKey::parse(row.code);

            if seen.insert(code) {
                canonical.push(code);
            }

            // First icon wins; later rows for the same code keep it.
            icons.entry(code).or_insert(row.icon);

            // Later rows overwrite earlier ones for a shared label.
            codes.insert((Locale::Zh, Locale::Zh.normalize_label(row.label_zh)), code);
            codes.insert((Locale::En, Locale::En.normalize_label(row.label_en)), code);

            let entries = labels.entry(code).or_default();
            entries.push(LabelEntry {
                label: row.label_zh,
                locale: Locale::Zh,
                icon: row.icon,
            });
            entries.push(LabelEntry {
                label: row.label_en,
                locale: Locale::En,
                icon: row.icon,
            });
        }

        Self {
            icons,
            codes,
            labels,
            canonical,
        }
    }

    /// Icon glyph for a code, or [`UNKNOWN_ICON`].
    pub fn icon_for(&self, code: impl Into<CodeKey>) -> &'static str {
        self.icons
            .get(&code.into())
            .copied()
            .unwrap_or(UNKNOWN_ICON)
    }

    /// Code for a label in the given locale. Returns `None` when nothing matches.
    pub fn code_for(&self, label: &str, locale: Locale) -> Option<CodeKey> {
        let key = locale.normalize_label(label);
        if key.is_empty() {
            return None;
        }
        self.codes.get(&(locale, key)).copied()
    }

    /// Code for a label whose locale is inferred from its script.
    pub fn code_for_label(&self, label: &str) -> Option<CodeKey> {
        self.code_for(label, Locale::detect(label))
    }

    /// All labels for a code in table order (Chinese then English per row).
    pub fn labels_for(&self, code: impl Into<CodeKey>) -> &[LabelEntry] {
        self.labels
            .get(&code.into())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First label listed for a code, or [`UNKNOWN_LABEL`].
    pub fn primary_label_for(&self, code: impl Into<CodeKey>) -> &'static str {
        self.labels_for(code)
            .first()
            .map(|entry| entry.label)
            .unwrap_or(UNKNOWN_LABEL)
    }

    /// Full entry for a code, grouped by locale.
    pub fn entry_for(&self, code: impl Into<CodeKey>) -> Option<ConditionEntry> {
        let code = code.into();
        let labels = self.labels.get(&code)?;

        let mut labels_by_locale: BTreeMap<Locale, Vec<&'static str>> = BTreeMap::new();
        for entry in labels {
            let bucket = labels_by_locale.entry(entry.locale).or_default();
            if !bucket.contains(&entry.label) {
                bucket.push(entry.label);
            }
        }

        Some(ConditionEntry {
            code,
            icon: self.icon_for(code),
            labels_by_locale,
        })
    }

    /// Distinct codes in table order.
    pub fn canonical_codes(&self) -> &[CodeKey] {
        &self.canonical
    }
}

impl Default for CodeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_code_normalization_strips_leading_zeros() {
        assert_eq!(CodeKey::parse("01"), CodeKey::Code(1));
        assert_eq!(CodeKey::parse("1"), CodeKey::Code(1));
        assert_eq!(CodeKey::parse(" 042 "), CodeKey::Code(42));
        assert_eq!(CodeKey::from(7u32), CodeKey::parse("07"));
    }

    #[test]
    fn test_empty_code_is_distinct() {
        assert_eq!(CodeKey::parse(""), CodeKey::Empty);
        assert_eq!(CodeKey::parse("   "), CodeKey::Empty);
        assert_eq!(CodeKey::from(None::<&str>), CodeKey::Empty);
        assert_ne!(CodeKey::Empty, CodeKey::Code(0));
        assert_eq!(CodeKey::Empty.to_string(), "");
    }

    #[test]
    fn test_icon_for_known_and_unknown_codes() {
        let catalog = CodeCatalog::new();
        assert_eq!(catalog.icon_for("01"), "☀️");
        assert_eq!(catalog.icon_for(1u32), "☀️");
        assert_eq!(catalog.icon_for("15"), "⛈️");
        assert_eq!(catalog.icon_for("99"), UNKNOWN_ICON);
        assert_eq!(catalog.icon_for(""), UNKNOWN_ICON);
    }

    #[test]
    fn test_first_icon_wins_for_shared_code() {
        // Code 12 lists 🌧️ before 🌦️.
        let catalog = CodeCatalog::new();
        assert_eq!(catalog.icon_for("12"), "🌧️");
        // Code 23 lists 🌨️ before ❄️.
        assert_eq!(catalog.icon_for("23"), "🌨️");
    }

    #[test]
    fn test_code_for_latin_labels_is_case_insensitive() {
        let catalog = CodeCatalog::new();
        assert_eq!(catalog.code_for("clear", Locale::En), Some(CodeKey::Code(1)));
        assert_eq!(catalog.code_for("  Mostly Clear ", Locale::En), Some(CodeKey::Code(2)));
        assert_eq!(catalog.code_for_label("thunderstorms"), Some(CodeKey::Code(18)));
    }

    #[test]
    fn test_code_for_chinese_labels() {
        let catalog = CodeCatalog::new();
        assert_eq!(catalog.code_for("晴時多雲", Locale::Zh), Some(CodeKey::Code(2)));
        assert_eq!(catalog.code_for_label("多雲"), Some(CodeKey::Code(4)));
        // Shared label resolves to the last row that lists it.
        assert_eq!(catalog.code_for_label("下雪"), Some(CodeKey::Code(42)));
    }

    #[test]
    fn test_code_for_miss_returns_none() {
        let catalog = CodeCatalog::new();
        assert_eq!(catalog.code_for("颱風", Locale::Zh), None);
        assert_eq!(catalog.code_for("", Locale::Zh), None);
        assert_eq!(catalog.code_for("晴", Locale::En), None);
    }

    #[test]
    fn test_labels_for_lists_every_row() {
        let catalog = CodeCatalog::new();
        let labels = catalog.labels_for("07");
        let zh: Vec<_> = labels
            .iter()
            .filter(|l| l.locale == Locale::Zh)
            .map(|l| l.label)
            .collect();
        assert_eq!(zh, vec!["陰", "陰天"]);
        assert_eq!(labels.len(), 4);
        assert!(catalog.labels_for("99").is_empty());
    }

    #[test]
    fn test_primary_label_for() {
        let catalog = CodeCatalog::new();
        assert_eq!(catalog.primary_label_for("01"), "晴");
        assert_eq!(catalog.primary_label_for("08"), "多雲陣雨");
        assert_eq!(catalog.primary_label_for("40"), UNKNOWN_LABEL);
        assert_eq!(catalog.primary_label_for(""), UNKNOWN_LABEL);
    }

    #[test]
    fn test_primary_label_round_trips_for_every_code() {
        let catalog = CodeCatalog::new();
        assert!(!catalog.canonical_codes().is_empty());
        for &code in catalog.canonical_codes() {
            let label = catalog.primary_label_for(code);
            assert_eq!(
                catalog.code_for_label(label),
                Some(code),
                "label {} did not map back to {}",
                label,
                code
            );
            assert_ne!(catalog.icon_for(code), UNKNOWN_ICON);
        }
    }

    #[test]
    fn test_entry_for_groups_labels() {
        let catalog = CodeCatalog::new();
        let entry = catalog.entry_for("11").unwrap();
        assert_eq!(entry.icon, "🌧️");
        assert_eq!(entry.labels_by_locale[&Locale::Zh][0], "雨");
        // "RAINY" appears twice for code 11 but is listed once.
        let en = &entry.labels_by_locale[&Locale::En];
        assert_eq!(en.iter().filter(|l| **l == "RAINY").count(), 1);
        assert!(catalog.entry_for("").is_none());
    }

    #[test]
    fn test_entry_serializes_provider_code() {
        let catalog = CodeCatalog::new();
        let entry = catalog.entry_for("1").unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["code"], "01");
        assert_eq!(json["labels_by_locale"]["zh"][0], "晴");
        assert_eq!(serde_json::to_value(CodeKey::Empty).unwrap(), "");
    }

    #[test]
    fn test_locale_detection() {
        assert_eq!(Locale::detect("CLEAR"), Locale::En);
        assert_eq!(Locale::detect("晴"), Locale::Zh);
    }
}
