//! Registry of the tables mirrored in remote mode.

/// Tables loaded into the cache at startup, in load order.
pub const TRACKED_TABLES: &[&str] = &[
    "services",
    "staff",
    "customers",
    "appointments",
    "business_hours",
    "blocked_slots",
    "settings",
    "conversations",
    "messages",
];

/// Returns true if `table` is one of the mirrored tables.
pub fn is_tracked(table: &str) -> bool {
    TRACKED_TABLES.iter().any(|t| t.eq_ignore_ascii_case(table))
}

/// Column that uniquely identifies a row of `table`.
pub fn identity_column(table: &str) -> &'static str {
    if table.eq_ignore_ascii_case("settings") {
        "key"
    } else {
        "id"
    }
}
