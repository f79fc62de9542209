//! Line items: the rows of the output table.
//!
//! The model's reply is first read into a [`RawLineItem`], where every field
//! is optional and loosely typed. [`RawLineItem::repair`] is a pure, total
//! function that turns it into a fully populated [`LineItem`], substituting
//! the documented defaults and reporting which fields needed them.
//!
//! Repair is idempotent: a `LineItem` converted back to a `RawLineItem` and
//! repaired again comes out unchanged with no defaulted fields.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// Column header for the commodity name.
pub const COMMODITY_NAME: &str = "Commodity Name";
/// Column header for the quantity.
pub const QTY: &str = "Qty";
/// Column header for the unit of measure.
pub const UOM: &str = "UOM";

/// Header row of the output table, in column order.
pub const COLUMNS: [&str; 3] = [COMMODITY_NAME, QTY, UOM];

/// Quantity used when the model gives none, or one that is not a number.
pub const DEFAULT_QTY: u64 = 1;
/// Unit of measure used when the model gives none.
pub const DEFAULT_UOM: &str = "BOX";

/// One commodity row extracted from a page table. All fields always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "Commodity Name")]
    pub commodity_name: String,
    #[serde(rename = "Qty")]
    pub quantity: Number,
    #[serde(rename = "UOM")]
    pub unit_of_measure: String,
}

impl LineItem {
    pub fn new(
        commodity_name: impl Into<String>,
        quantity: impl Into<Number>,
        unit_of_measure: impl Into<String>,
    ) -> Self {
        Self {
            commodity_name: commodity_name.into(),
            quantity: quantity.into(),
            unit_of_measure: unit_of_measure.into(),
        }
    }

    /// The three cells of this row, in [`COLUMNS`] order.
    pub fn to_record(&self) -> [String; 3] {
        [
            self.commodity_name.clone(),
            self.quantity.to_string(),
            self.unit_of_measure.clone(),
        ]
    }
}

/// A field of [`LineItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Field {
    CommodityName,
    Qty,
    Uom,
}

impl Field {
    pub fn column(self) -> &'static str {
        match self {
            Field::CommodityName => COMMODITY_NAME,
            Field::Qty => QTY,
            Field::Uom => UOM,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A row object exactly as the model returned it.
///
/// JSON `null` deserialises to `None`, so it is treated like a missing key.
/// Keys other than the three columns are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawLineItem {
    #[serde(rename = "Commodity Name", default)]
    pub commodity_name: Option<Value>,
    #[serde(rename = "Qty", default)]
    pub qty: Option<Value>,
    #[serde(rename = "UOM", default)]
    pub uom: Option<Value>,
}

/// Result of [`RawLineItem::repair`].
#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub item: LineItem,
    /// Fields that were absent or unusable and got their default.
    pub defaulted: Vec<Field>,
}

impl Repaired {
    pub fn was_repaired(&self) -> bool {
        !self.defaulted.is_empty()
    }
}

impl RawLineItem {
    /// Complete this row, filling every missing or unusable field with its default.
    pub fn repair(&self) -> Repaired {
        let mut defaulted = Vec::new();

        let commodity_name = match self.commodity_name.as_ref().and_then(text_value) {
            Some(name) => name,
            None => {
                defaulted.push(Field::CommodityName);
                String::new()
            }
        };

        let quantity = match self.qty.as_ref().and_then(quantity_value) {
            Some(q) => q,
            None => {
                defaulted.push(Field::Qty);
                Number::from(DEFAULT_QTY)
            }
        };

        let unit_of_measure = match self.uom.as_ref().and_then(text_value) {
            Some(u) => u,
            None => {
                defaulted.push(Field::Uom);
                DEFAULT_UOM.to_string()
            }
        };

        Repaired {
            item: LineItem {
                commodity_name,
                quantity,
                unit_of_measure,
            },
            defaulted,
        }
    }
}

impl From<&LineItem> for RawLineItem {
    fn from(item: &LineItem) -> Self {
        Self {
            commodity_name: Some(Value::String(item.commodity_name.clone())),
            qty: Some(Value::Number(item.quantity.clone())),
            uom: Some(Value::String(item.unit_of_measure.clone())),
        }
    }
}

/// Text cells keep strings exactly as given; scalars are rendered as text.
fn text_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Quantities accept JSON numbers and numeric strings such as `"1,200"`.
fn quantity_value(v: &Value) -> Option<Number> {
    match v {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => parse_quantity(s),
        _ => None,
    }
}

fn parse_quantity(s: &str) -> Option<Number> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(i) = cleaned.parse::<i64>() {
        return Some(Number::from(i));
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}
