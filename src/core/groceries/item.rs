//! Grocery item and mutation types.

use serde::{Deserialize, Serialize};

/// A physical measurement attached to an item (weight or volume).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Numeric amount
    pub value: f64,
    /// Unit string ("g", "kg", "lb", "oz", "mL", "L", "fl oz", "cup")
    pub unit: String,
}

/// What a mutation does to the list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationAction {
    /// Add the item, or replace it in place if already present
    #[default]
    Add,
    /// Remove the item; no-op when absent
    Remove,
    /// Replace the item in place; no-op when absent
    Modify,
}

/// One mutation as it appears on the wire.
///
/// The flat shape matches the tool-call schema: `item` is the name, the
/// quantity defaults to 1, and a missing action means add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Item name in singular form
    #[serde(rename = "item")]
    pub name: String,
    /// Count of the item
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    /// What to do with the item
    #[serde(default)]
    pub action: MutationAction,
    /// Optional weight/volume measurement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<Measurement>,
}

fn default_quantity() -> f64 {
    1.0
}

/// An item as stored on the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryItem {
    /// Item name in singular form
    #[serde(rename = "item")]
    pub name: String,
    /// Count of the item
    pub quantity: f64,
    /// Optional weight/volume measurement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<Measurement>,
}

impl From<MutationRecord> for GroceryItem {
    fn from(record: MutationRecord) -> Self {
        Self {
            name: record.name,
            quantity: record.quantity,
            measurement: record.measurement,
        }
    }
}

impl GroceryItem {
    /// Bullet-point form used by the text export.
    ///
    /// Measurements take precedence over the bare quantity.
    pub fn display_line(&self) -> String {
        match &self.measurement {
            Some(m) => format!("- {} ({} {})", self.name, m.value, m.unit),
            None => format!("- {} ({})", self.name, format_quantity(self.quantity)),
        }
    }
}

/// Format a quantity without superfluous trailing zeros.
pub fn format_quantity(quantity: f64) -> String {
    if quantity == 0.0 {
        return "0".to_string();
    }
    if quantity.fract() == 0.0 {
        return format!("{}", quantity as i64);
    }
    let formatted = format!("{quantity:.2}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_record_defaults() {
        let record: MutationRecord = serde_json::from_str(r#"{"item": "milk"}"#).unwrap();
        assert_eq!(record.name, "milk");
        assert_eq!(record.quantity, 1.0);
        assert_eq!(record.action, MutationAction::Add);
        assert!(record.measurement.is_none());
    }

    #[test]
    fn test_mutation_record_full() {
        let record: MutationRecord = serde_json::from_str(
            r#"{"item": "milk", "quantity": 2, "action": "modify", "measurement": {"value": 2, "unit": "L"}}"#,
        )
        .unwrap();
        assert_eq!(record.action, MutationAction::Modify);
        assert_eq!(
            record.measurement,
            Some(Measurement {
                value: 2.0,
                unit: "L".to_string()
            })
        );
    }

    #[test]
    fn test_display_line_prefers_measurement() {
        let item = GroceryItem {
            name: "milk".to_string(),
            quantity: 1.0,
            measurement: Some(Measurement {
                value: 2.0,
                unit: "L".to_string(),
            }),
        };
        assert_eq!(item.display_line(), "- milk (2 L)");
    }

    #[test]
    fn test_format_quantity_trims_zeros() {
        assert_eq!(format_quantity(0.0), "0");
        assert_eq!(format_quantity(3.0), "3");
        assert_eq!(format_quantity(0.5), "0.5");
        assert_eq!(format_quantity(1.25), "1.25");
        assert_eq!(format_quantity(2.10), "2.1");
    }
}
