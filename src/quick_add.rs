//! # Quick Add Module
//!
//! Turns free-text lines such as `"500 g sugar"`, `"2 cups of milk"`,
//! `"1 1/2 kg flour"` or `"eggs 6"` into unpersisted [`InventoryItem`]s.
//!
//! - Quantities may be integers, decimals (`1.5`, `1,5`), simple fractions
//!   (`1/2`, `1 1/2`) or vulgar fractions (`½`)
//! - The unit is the longest known unit right after the quantity, glued or not
//!   (`500g`, `2 fl oz`)
//! - A quantity without a known unit is a count: `"3 eggs"` becomes `3 pcs eggs`
//!
//! Lists are split on newlines, semicolons and commas followed by a space, so
//! decimal commas survive.

use lazy_static::lazy_static;
use log::{debug, trace, warn};
use regex::Regex;

use crate::inventory_model::InventoryItem;
use crate::unit_taxonomy::UnitTable;

/// Unit given to quantities without a recognized unit
pub const DEFAULT_COUNT_UNIT: &str = "pcs";

const QUANTITY: &str = r"\d+\s+\d+/\d+|\d+/\d+|\d*\s*[½⅓⅔¼¾⅛]|\d+(?:[.,]\d+)?";

lazy_static! {
    static ref LEADING_QUANTITY: Regex = Regex::new(&format!(r"^(?P<qty>{QUANTITY})\s*(?P<rest>.+)$"))
        .expect("Leading quantity pattern should be valid");
    static ref TRAILING_QUANTITY: Regex = Regex::new(&format!(
        r"^(?P<name>.+?)[\s:]+(?P<qty>{QUANTITY})\s*(?P<unit>[^\d\s][^\s]*(?:\s[^\d\s][^\s]*)?)?$"
    ))
    .expect("Trailing quantity pattern should be valid");
    static ref LIST_SEPARATOR: Regex =
        Regex::new(r"\r?\n|;|,(?:\s+|$)").expect("List separator pattern should be valid");
    static ref CONNECTOR: Regex =
        Regex::new(r"(?i)^(?:of\s+|de\s+|d'|d’)").expect("Connector pattern should be valid");
    static ref BARE_QUANTITY: Regex =
        Regex::new(&format!(r"^(?:{QUANTITY})$")).expect("Bare quantity pattern should be valid");
}

/// Result of parsing a multi-line list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuickAddResult {
    pub items: Vec<InventoryItem>,
    /// Non-empty lines that could not be understood
    pub unparsed: Vec<String>,
}

fn vulgar_fraction(c: char) -> Option<f64> {
    match c {
        '½' => Some(0.5),
        '⅓' => Some(1.0 / 3.0),
        '⅔' => Some(2.0 / 3.0),
        '¼' => Some(0.25),
        '¾' => Some(0.75),
        '⅛' => Some(0.125),
        _ => None,
    }
}

/// Parse a quantity token produced by the quantity pattern
pub fn parse_quantity(text: &str) -> Option<f64> {
    let text = text.trim();

    if let Some(last) = text.chars().last() {
        if let Some(fraction) = vulgar_fraction(last) {
            let whole = text[..text.len() - last.len_utf8()].trim();
            let whole = if whole.is_empty() { 0.0 } else { whole.parse::<f64>().ok()? };
            return Some(whole + fraction);
        }
    }

    if let Some((whole, fraction)) = text.split_once(char::is_whitespace) {
        return Some(whole.parse::<f64>().ok()? + parse_quantity(fraction)?);
    }

    if let Some((num, den)) = text.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den != 0.0).then(|| num / den);
    }

    text.replace(',', ".").parse().ok()
}

/// Split `rest` into the longest known unit prefix and the remainder
fn split_unit<'a>(units: &UnitTable, rest: &'a str) -> Option<(&'a str, &'a str)> {
    let words: Vec<(usize, &str)> = rest
        .split_whitespace()
        .map(|w| (w.as_ptr() as usize - rest.as_ptr() as usize, w))
        .take(2)
        .collect();

    if words.len() == 2 {
        let end = words[1].0 + words[1].1.len();
        let candidate = &rest[..end];
        if units.is_known(candidate) {
            return Some((candidate, &rest[end..]));
        }
    }
    let (_, first) = *words.first()?;
    if units.is_known(first) {
        return Some((first, &rest[first.len()..]));
    }
    None
}

fn clean_name(name: &str) -> String {
    let name = name.trim();
    CONNECTOR.replace(name, "").trim().to_string()
}

fn build_item(units: &UnitTable, quantity: f64, rest: &str) -> Option<InventoryItem> {
    let (unit, name) = match split_unit(units, rest) {
        Some((unit, name)) => (unit.trim().trim_end_matches('.').to_string(), clean_name(name)),
        None => (DEFAULT_COUNT_UNIT.to_string(), clean_name(rest)),
    };
    if name.is_empty() || BARE_QUANTITY.is_match(&name) {
        return None;
    }
    Some(InventoryItem::new(&name, quantity, &unit))
}

/// Parse one line into an item
///
/// Returns `None` for lines without a usable quantity or name.
///
/// ```rust
/// use pantry::quick_add::parse_line;
/// use pantry::unit_taxonomy::UnitTable;
///
/// let units = UnitTable::standard();
/// let item = parse_line(&units, "500g sugar").unwrap();
/// assert_eq!((item.name.as_str(), item.quantity, item.unit.as_str()), ("sugar", 500.0, "g"));
/// ```
pub fn parse_line(units: &UnitTable, line: &str) -> Option<InventoryItem> {
    let line = line.trim().trim_start_matches(['-', '*', '•']).trim();
    if line.is_empty() {
        return None;
    }

    if let Some(caps) = LEADING_QUANTITY.captures(line) {
        // "500g sugar" is a quantity, "7up" is a name
        let glued = caps.name("qty").map(|m| m.end()) == caps.name("rest").map(|m| m.start());
        if !glued || split_unit(units, &caps["rest"]).is_some() {
            let quantity = parse_quantity(&caps["qty"])?;
            let item = build_item(units, quantity, &caps["rest"]);
            trace!("Parsed leading-quantity line '{}' as {:?}", line, item);
            return item;
        }
        trace!("'{}' starts with a name, trying a trailing quantity", line);
    }

    if let Some(caps) = TRAILING_QUANTITY.captures(line) {
        let quantity = parse_quantity(&caps["qty"])?;
        let name = clean_name(&caps["name"]);
        let unit = caps
            .name("unit")
            .map(|u| u.as_str().trim())
            .filter(|u| units.is_known(u))
            .unwrap_or(DEFAULT_COUNT_UNIT);
        if name.is_empty() || BARE_QUANTITY.is_match(&name) {
            return None;
        }
        trace!("Parsed trailing-quantity line '{}'", line);
        return Some(InventoryItem::new(&name, quantity, unit));
    }

    debug!("No quantity found in '{}'", line);
    None
}

/// Parse a list of lines
pub fn parse_list(units: &UnitTable, text: &str) -> QuickAddResult {
    let mut result = QuickAddResult::default();
    for line in LIST_SEPARATOR.split(text) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(units, line) {
            Some(item) => result.items.push(item),
            None => result.unparsed.push(line.to_string()),
        }
    }
    if !result.unparsed.is_empty() {
        warn!("{} lines could not be parsed", result.unparsed.len());
    }
    debug!("Parsed {} items from quick-add text", result.items.len());
    result
}
