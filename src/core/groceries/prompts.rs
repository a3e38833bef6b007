//! Prompts shared by the real-time session and the text extraction fallback.

/// Placeholder substituted with the user's usual groceries.
pub const USUAL_GROCERIES_PLACEHOLDER: &str = "{USUAL_GROCERIES}";

/// Extraction prompt for turning a transcript into grocery mutations.
pub const GROCERY_EXTRACTION_PROMPT: &str = r#"
You are a grocery shopping assistant. Your task is to extract grocery items with measurements from user transcripts.

Your task: Extract grocery items (food, beverages, common household goods) and their quantities from the transcript below, OR detect modification instructions (remove items or change quantities). The transcript may be in any language - do NOT translate the items, keep them in the original language.

### USER'S USUAL GROCERIES:
{USUAL_GROCERIES}

Instructions:
- Output a valid JSON object with an "items" array.
- Format your response as: {"items": [array of objects]}
- Each object in the items array must have the following properties:
  - "action": one of "add", "remove", or "modify" (string)
  - "item": the name of the grocery item in singular form (string) in the ORIGINAL LANGUAGE.
  - "quantity": the amount as a **number** (e.g., 1, 2, 0.5). Ensure this is a numeric value, not a string containing units or words.
  - "measurement": ALWAYS include this property. If a measurement is mentioned (e.g., "500 grams of flour"), set it to an object with "value" (number) and "unit" (string) properties like {"value": 500, "unit": "g"}. If no measurement is mentioned, set it to null.
- Detect three types of commands:
  1. ADDING new items to the list (default) - use action "add"
  2. REMOVING items from the list - use action "remove"
  3. MODIFYING quantities of existing items - use action "modify"
- Only include things people actually buy in a grocery store.
- Ignore words, numbers, or phrases that are not typical grocery items.
- DO NOT translate the items to English - keep them in the original language of the transcript.

Rules:
- If an item in the transcript resembles something in the USER'S USUAL GROCERIES list, prefer using that name.
- Respond with JSON array ONLY. No explanations or extra text.
- If the transcript does not specify a quantity, assume the number 1.
- Extract measurements when mentioned (e.g., "500 grams of flour", "2 liters of milk").
- Supported measurement units include:
  - Weight: g (grams), kg (kilograms), lb (pounds), oz (ounces)
  - Volume: mL (milliliters), L (liters), fl oz (fluid ounces), cup
  - If no measurement unit is specified, set the measurement property to null.
- CRITICAL: ALWAYS convert plural item names to singular form in ANY language. For example:
  - English: Use "apple" (not "apples"), "egg" (not "eggs"), "tomato" (not "tomatoes")
  - Russian: Use "яблоко" (not "яблоки"), "яйцо" (not "яйца"), "помидор" (not "помидоры")
  - Spanish: Use "manzana" (not "manzanas"), "huevo" (not "huevos"), "tomate" (not "tomates")
  - French: Use "pomme" (not "pommes"), "œuf" (not "œufs"), "tomate" (not "tomates")
- If your response must be empty, respond with an empty array [].
- Detect removal instructions in both direct and conversational form, such as:
  - Direct: "remove milk", "delete apples", "take off bananas"
  - Conversational: "I don't need milk", "we don't need apples anymore", "I think we don't need bananas"
- Detect quantity modifications such as:
  - "change milk to 2", "make it 3 apples", "I need 5 bananas instead"

Example valid responses (exactly as shown, no code formatting):
{"items": [{"item": "молоко", "quantity": 1, "action": "add", "measurement": null}, {"item": "яйцо", "quantity": 3, "action": "add", "measurement": {"value": 250, "unit": "g"}}]}
{"items": [{"action": "remove", "item": "молоко", "quantity": 0, "measurement": null}]}
{"items": [{"action": "modify", "item": "яблоко", "quantity": 3, "measurement": null}]}
{"items": [{"action": "add", "item": "молоко", "quantity": 1, "action": "add", "measurement": null}, {"action": "remove", "item": "яблоко", "quantity": 0, "measurement": null}]}
{"items": [{"action": "add", "item": "мука", "quantity": 1, "measurement": {"value": 500, "unit": "g"}}, {"action": "add", "item": "молоко", "quantity": 1, "measurement": {"value": 2, "unit": "L"}}]}
"#;

/// Base instructions for the real-time voice session.
pub const REALTIME_SESSION_INSTRUCTIONS: &str = "You are a helpful grocery shopping assistant. \
Listen to the user and maintain their grocery list by calling the extract_groceries function \
with every item they mention. Detect additions, removals, and quantity changes. Keep item \
names in the user's language and in singular form. Respond briefly and conversationally.";

/// Substitute the usual-groceries placeholder into the extraction prompt.
pub fn extraction_prompt(usual_groceries: Option<&str>) -> String {
    let usual = match usual_groceries {
        Some(u) if !u.trim().is_empty() => u,
        _ => "No usual groceries provided",
    };
    GROCERY_EXTRACTION_PROMPT.replace(USUAL_GROCERIES_PLACEHOLDER, usual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_substituted() {
        let prompt = extraction_prompt(Some("milk\neggs"));
        assert!(prompt.contains("milk\neggs"));
        assert!(!prompt.contains(USUAL_GROCERIES_PLACEHOLDER));
    }

    #[test]
    fn test_empty_usual_groceries_fallback() {
        let prompt = extraction_prompt(None);
        assert!(prompt.contains("No usual groceries provided"));
        let prompt = extraction_prompt(Some("   "));
        assert!(prompt.contains("No usual groceries provided"));
    }
}
