//! Ingredient name and unit normalization.

/// Words describing preparation or size rather than the item itself.
const MODIFIERS: &[&str] = &[
    "fresh", "dried", "whole", "chopped", "diced", "minced", "sliced", "shredded", "grated",
    "crushed", "large", "medium", "small", "ripe", "raw", "cooked",
];

/// Common plurals and multi-word forms folded onto one name.
const NAME_FORMS: &[(&str, &str)] = &[
    ("garlic cloves", "garlic"),
    ("cloves garlic", "garlic"),
    ("cloves of garlic", "garlic"),
    ("apples", "apple"),
    ("onions", "onion"),
    ("tomatoes", "tomato"),
    ("potatoes", "potato"),
    ("carrots", "carrot"),
    ("peppers", "pepper"),
    ("eggs", "egg"),
    ("lemons", "lemon"),
    ("limes", "lime"),
];

const UNIT_ALIASES: &[(&str, &str)] = &[
    ("tablespoon", "tbsp"),
    ("tablespoons", "tbsp"),
    ("tbsps", "tbsp"),
    ("tbs", "tbsp"),
    ("teaspoon", "tsp"),
    ("teaspoons", "tsp"),
    ("tsps", "tsp"),
    ("cups", "cup"),
    ("c", "cup"),
    ("ounce", "oz"),
    ("ounces", "oz"),
    ("ozs", "oz"),
    ("pound", "lb"),
    ("pounds", "lb"),
    ("lbs", "lb"),
    ("gram", "g"),
    ("grams", "g"),
    ("kilogram", "kg"),
    ("kilograms", "kg"),
    ("kgs", "kg"),
    ("milliliter", "ml"),
    ("milliliters", "ml"),
    ("millilitre", "ml"),
    ("millilitres", "ml"),
    ("liter", "l"),
    ("liters", "l"),
    ("litre", "l"),
    ("litres", "l"),
    ("fluid ounce", "fl oz"),
    ("fluid ounces", "fl oz"),
    ("fl. oz", "fl oz"),
    ("floz", "fl oz"),
    ("clove", "cloves"),
    ("piece", "each"),
    ("pieces", "each"),
    ("whole", "each"),
    ("", "each"),
];

/// Measurement dimension of a convertible unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Mass,
    Volume,
}

/// Canonical form of an ingredient name: lowercase, modifiers dropped,
/// common plurals singularized.
pub fn normalize_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase().replace(',', " ");
    let kept: Vec<&str> = lowered
        .split_whitespace()
        .filter(|w| !MODIFIERS.contains(w))
        .collect();
    let name = if kept.is_empty() {
        lowered.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        kept.join(" ")
    };

    if let Some((_, canonical)) = NAME_FORMS.iter().find(|(form, _)| *form == name) {
        return (*canonical).to_owned();
    }
    // "roma tomatoes" -> "roma tomato"
    if let Some((head, last)) = name.rsplit_once(' ') {
        if let Some((_, canonical)) = NAME_FORMS.iter().find(|(form, _)| *form == last) {
            return format!("{head} {canonical}");
        }
    }
    name
}

/// Canonical unit spelling (`"Tablespoons"` -> `"tbsp"`). Unknown units are
/// lowercased and kept.
pub fn normalize_unit(raw: &str) -> String {
    let unit = raw.trim().trim_end_matches('.').to_lowercase();
    UNIT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == unit)
        .map(|(_, canonical)| (*canonical).to_owned())
        .unwrap_or(unit)
}

/// Dimension and size in base units (grams or millilitres) of a
/// normalized unit, or `None` for count-like units.
pub fn conversion(unit: &str) -> Option<(Dimension, f64)> {
    let factor = match unit {
        "g" => (Dimension::Mass, 1.0),
        "kg" => (Dimension::Mass, 1000.0),
        "oz" => (Dimension::Mass, 28.349_523_125),
        "lb" => (Dimension::Mass, 453.592_37),
        "ml" => (Dimension::Volume, 1.0),
        "l" => (Dimension::Volume, 1000.0),
        "tsp" => (Dimension::Volume, 4.928_921_593_75),
        "tbsp" => (Dimension::Volume, 14.786_764_781_25),
        "fl oz" => (Dimension::Volume, 29.573_529_562_5),
        "cup" => (Dimension::Volume, 236.588_236_5),
        _ => return None,
    };
    Some(factor)
}
