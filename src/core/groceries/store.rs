//! In-memory grocery list with batch mutation application.

use tracing::debug;

use super::item::{GroceryItem, MutationAction, MutationRecord};

/// Ordered grocery list keyed by case-insensitive item name.
///
/// Insertion order is preserved; mutations that replace an item keep its
/// position. Name matching uses Unicode lowercasing so non-ASCII item names
/// compare correctly.
#[derive(Debug, Default)]
pub struct GroceryListStore {
    items: Vec<GroceryItem>,
}

impl GroceryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current list, oldest first.
    pub fn items(&self) -> &[GroceryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        let needle = name.to_lowercase();
        self.items
            .iter()
            .position(|item| item.name.to_lowercase() == needle)
    }

    /// Apply one batch of mutations sequentially.
    ///
    /// Later mutations observe the effects of earlier ones, so a batch that
    /// adds then removes the same item leaves the list without it. Returns
    /// the number of mutations that changed the list.
    pub fn apply_batch(&mut self, batch: Vec<MutationRecord>) -> usize {
        let mut applied = 0;
        for record in batch {
            if self.apply(record) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply a single mutation. Returns true when the list changed.
    pub fn apply(&mut self, record: MutationRecord) -> bool {
        let existing = self.position_of(&record.name);
        match record.action {
            MutationAction::Remove => match existing {
                Some(index) => {
                    let removed = self.items.remove(index);
                    debug!("Removed item: {}", removed.name);
                    true
                }
                None => {
                    debug!("Remove of absent item {} is a no-op", record.name);
                    false
                }
            },
            MutationAction::Modify => match existing {
                Some(index) => {
                    self.items[index] = record.into();
                    true
                }
                None => {
                    debug!("Modify of absent item {} is a no-op", record.name);
                    false
                }
            },
            MutationAction::Add => match existing {
                // Add on an existing name replaces it in place
                Some(index) => {
                    self.items[index] = record.into();
                    true
                }
                None => {
                    self.items.push(record.into());
                    true
                }
            },
        }
    }

    /// Remove an item by name; no-op when absent.
    pub fn remove_item(&mut self, name: &str) -> bool {
        match self.position_of(name) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Set the quantity of an item by name; no-op when absent.
    pub fn update_quantity(&mut self, name: &str, quantity: f64) -> bool {
        match self.position_of(name) {
            Some(index) => {
                self.items[index].quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Format the list for text export, one bullet per item.
    pub fn export_text(&self, title: Option<&str>) -> String {
        if self.items.is_empty() {
            return String::new();
        }
        let body: Vec<String> = self.items.iter().map(GroceryItem::display_line).collect();
        match title {
            Some(title) => format!("{}\n\n{}", title, body.join("\n")),
            None => body.join("\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::groceries::item::Measurement;

    fn add(name: &str, quantity: f64) -> MutationRecord {
        MutationRecord {
            name: name.to_string(),
            quantity,
            action: MutationAction::Add,
            measurement: None,
        }
    }

    fn with_action(name: &str, action: MutationAction) -> MutationRecord {
        MutationRecord {
            name: name.to_string(),
            quantity: 1.0,
            action,
            measurement: None,
        }
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut store = GroceryListStore::new();
        store.apply_batch(vec![add("milk", 1.0), add("bread", 2.0), add("eggs", 12.0)]);
        let names: Vec<&str> = store.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["milk", "bread", "eggs"]);
    }

    #[test]
    fn test_add_existing_replaces_in_place() {
        let mut store = GroceryListStore::new();
        store.apply_batch(vec![add("milk", 1.0), add("bread", 1.0)]);
        store.apply(add("Milk", 3.0));
        assert_eq!(store.len(), 2);
        assert_eq!(store.items()[0].name, "Milk");
        assert_eq!(store.items()[0].quantity, 3.0);
        // Position unchanged
        assert_eq!(store.items()[1].name, "bread");
    }

    #[test]
    fn test_case_insensitive_matching_is_unicode() {
        let mut store = GroceryListStore::new();
        store.apply(add("Käse", 1.0));
        store.apply(add("KÄSE", 2.0));
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].quantity, 2.0);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut store = GroceryListStore::new();
        store.apply(add("milk", 1.0));
        let changed = store.apply(with_action("butter", MutationAction::Remove));
        assert!(!changed);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_modify_absent_is_noop() {
        let mut store = GroceryListStore::new();
        let changed = store.apply(with_action("butter", MutationAction::Modify));
        assert!(!changed);
        assert!(store.is_empty());
    }

    #[test]
    fn test_batch_applies_sequentially() {
        let mut store = GroceryListStore::new();
        // Add then remove within one batch leaves the list without the item.
        let applied = store.apply_batch(vec![
            add("milk", 1.0),
            with_action("milk", MutationAction::Remove),
        ]);
        assert_eq!(applied, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_modify_replaces_whole_item() {
        let mut store = GroceryListStore::new();
        store.apply(MutationRecord {
            name: "milk".to_string(),
            quantity: 1.0,
            action: MutationAction::Add,
            measurement: Some(Measurement {
                value: 1.0,
                unit: "L".to_string(),
            }),
        });
        store.apply(with_action("milk", MutationAction::Modify));
        // Modify without a measurement clears the old one
        assert!(store.items()[0].measurement.is_none());
    }

    #[test]
    fn test_update_quantity_and_remove_item() {
        let mut store = GroceryListStore::new();
        store.apply(add("milk", 1.0));
        assert!(store.update_quantity("MILK", 4.0));
        assert_eq!(store.items()[0].quantity, 4.0);
        assert!(store.remove_item("milk"));
        assert!(!store.remove_item("milk"));
    }

    #[test]
    fn test_export_text() {
        let mut store = GroceryListStore::new();
        assert_eq!(store.export_text(Some("Grocery List")), "");
        store.apply(add("milk", 2.0));
        store.apply(MutationRecord {
            name: "flour".to_string(),
            quantity: 1.0,
            action: MutationAction::Add,
            measurement: Some(Measurement {
                value: 500.0,
                unit: "g".to_string(),
            }),
        });
        let text = store.export_text(Some("Grocery List"));
        assert_eq!(text, "Grocery List\n\n- milk (2)\n- flour (500 g)");
    }
}
