//! Database schema definitions

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Registered accounts
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    joined_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

-- Server-side session tokens (bearer auth)
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id),
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

-- Per-user search history (append-only)
CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    sickness TEXT NOT NULL,
    results_json TEXT NOT NULL,
    timestamp INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

-- Bulk-loaded prescription records, read-only at serving time.
-- No uniqueness constraint: duplicates drive the count-based ranking.
CREATE TABLE IF NOT EXISTS prescriptions (
    drug_name TEXT NOT NULL,
    condition TEXT NOT NULL,
    rating REAL NOT NULL
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_prescriptions_condition ON prescriptions(condition);
CREATE INDEX IF NOT EXISTS idx_history_user ON history(user_id, timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)
"#;
