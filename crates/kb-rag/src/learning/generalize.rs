//! Query generalization for reusable correction patterns

/// Entity phrases and their placeholders; longer phrases must come first
const ENTITY_REPLACEMENTS: &[(&str, &str)] = &[
    ("sales orders", "[SALES_ENTITY]"),
    ("customers", "[CUSTOMER_ENTITY]"),
    ("products", "[PRODUCT_ENTITY]"),
    ("orders", "[ORDER_ENTITY]"),
    ("payments", "[PAYMENT_ENTITY]"),
];

/// Lowercase the query and replace known entity phrases with placeholders
pub fn generalize_query(query: &str) -> String {
    ENTITY_REPLACEMENTS
        .iter()
        .fold(query.to_lowercase(), |pattern, (term, placeholder)| {
            pattern.replace(term, placeholder)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacements_in_order() {
        assert_eq!(
            generalize_query("Show Sales Orders for CUSTOMERS"),
            "show [SALES_ENTITY] for [CUSTOMER_ENTITY]"
        );
        assert_eq!(
            generalize_query("orders with payments and products"),
            "[ORDER_ENTITY] with [PAYMENT_ENTITY] and [PRODUCT_ENTITY]"
        );
    }

    #[test]
    fn test_unrelated_text_only_lowercased() {
        assert_eq!(generalize_query("List Invoices"), "list invoices");
    }
}
