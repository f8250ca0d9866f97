//! Static tool schemas exposed to the LLM.

use vg_domain::tool::ToolDefinition;

/// Build the tool definitions for a voice session. The set is static —
/// every tenant sees the same tools; tenant data flows in through the
/// dispatcher, not the schema.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_menu".into(),
            description: "Return the restaurant's current menu. Use before answering \
                          any question about dishes or prices."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDefinition {
            name: "place_order".into(),
            description: "Place a takeout order once the caller has confirmed items \
                          and contact details."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "customer_name": { "type": "string", "description": "Caller's name" },
                    "customer_phone": { "type": "string", "description": "Callback phone number" },
                    "items": {
                        "type": "array",
                        "description": "Ordered items",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "quantity": { "type": "integer" },
                                "notes": { "type": "string", "description": "Modifiers, e.g. 'extra spicy'" }
                            },
                            "required": ["name", "quantity"]
                        }
                    },
                    "total": { "type": "string", "description": "Spoken order total, e.g. '$36'" }
                },
                "required": ["customer_name", "customer_phone", "items"]
            }),
        },
        ToolDefinition {
            name: "make_reservation".into(),
            description: "Book a table once the caller has confirmed the time and \
                          party size."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "customer_name": { "type": "string" },
                    "customer_phone": { "type": "string" },
                    "party_size": { "type": "integer" },
                    "time": { "type": "string", "description": "Requested time as spoken, e.g. 'Friday at 7pm'" },
                    "notes": { "type": "string" }
                },
                "required": ["customer_name", "customer_phone", "party_size", "time"]
            }),
        },
        ToolDefinition {
            name: "check_order_status".into(),
            description: "Look up the status of an existing order.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "order_id": { "type": "string" }
                }
            }),
        },
        ToolDefinition {
            name: "cancel_or_modify".into(),
            description: "Cancel or change an existing order or reservation.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "order_id": { "type": "string" },
                    "change": { "type": "string", "description": "What the caller wants changed" }
                }
            }),
        },
        ToolDefinition {
            name: "transfer_to_human".into(),
            description: "Hand the call to a staff member when the caller asks for a \
                          person or the request is out of scope."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "reason": { "type": "string" }
                }
            }),
        },
    ]
}
