//! Table definitions shared by both engines.
//!
//! Only types both dialects accept are used: `TEXT`, `BIGINT` for integers
//! and flags, `DOUBLE PRECISION` for prices. Timestamps are ISO-8601 text.

/// Creates every tracked table. Idempotent.
pub const CREATE_TABLES: &str = r#"
-- Bookable services
CREATE TABLE IF NOT EXISTS services (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    duration_minutes BIGINT NOT NULL DEFAULT 30,
    price DOUBLE PRECISION,
    is_active BIGINT NOT NULL DEFAULT 1,
    created_at TEXT,
    updated_at TEXT
);

-- Staff members
CREATE TABLE IF NOT EXISTS staff (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    is_active BIGINT NOT NULL DEFAULT 1,
    created_at TEXT,
    updated_at TEXT
);

-- Customers
CREATE TABLE IF NOT EXISTS customers (
    id TEXT PRIMARY KEY,
    name TEXT,
    email TEXT,
    phone TEXT,
    created_at TEXT,
    updated_at TEXT
);

-- Appointments
CREATE TABLE IF NOT EXISTS appointments (
    id TEXT PRIMARY KEY,
    customer_id TEXT,
    service_id TEXT,
    staff_id TEXT,
    date TEXT,
    start_time TEXT,
    end_time TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    notes TEXT,
    created_at TEXT,
    updated_at TEXT
);

-- Weekly opening hours
CREATE TABLE IF NOT EXISTS business_hours (
    id TEXT PRIMARY KEY,
    day_of_week BIGINT NOT NULL,
    open_time TEXT,
    close_time TEXT,
    is_closed BIGINT NOT NULL DEFAULT 0
);

-- Manually blocked time ranges
CREATE TABLE IF NOT EXISTS blocked_slots (
    id TEXT PRIMARY KEY,
    staff_id TEXT,
    date TEXT NOT NULL,
    start_time TEXT,
    end_time TEXT,
    reason TEXT,
    created_at TEXT
);

-- Key/value settings
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT,
    updated_at TEXT
);

-- Chat conversations
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    customer_id TEXT,
    session_id TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT,
    updated_at TEXT
);

-- Chat messages
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT,
    role TEXT NOT NULL,
    content TEXT,
    created_at TEXT
);
"#;

/// Columns added after the first release, applied one statement at a time.
///
/// Engines reject re-adding a column, and callers swallow that error, which
/// is what makes rerunning these harmless.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE appointments ADD COLUMN reminder_sent BIGINT DEFAULT 0",
    "ALTER TABLE customers ADD COLUMN notes TEXT",
    "ALTER TABLE staff ADD COLUMN color TEXT",
    "ALTER TABLE services ADD COLUMN category TEXT",
];
