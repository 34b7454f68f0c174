/// DuckDB initialization SQL.
///
/// Executed once at open time via `Connection::execute_batch`. Every
/// statement uses `IF NOT EXISTS` so it is safe to re-run on each startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `ATELIER_DUCKDB_MEMORY`, default `"1GB"`). The site stores a few
/// thousand rows at most; the limit only caps DuckDB's buffer pool.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- CONTACTS (contact form submissions)
-- ===========================================
CREATE TABLE IF NOT EXISTS contacts (
    id              VARCHAR PRIMARY KEY,           -- uuid v4
    first_name      VARCHAR NOT NULL,
    last_name       VARCHAR NOT NULL,
    email           VARCHAR NOT NULL,
    message         VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP  -- UTC
);
CREATE INDEX IF NOT EXISTS idx_contacts_created ON contacts(created_at);

-- ===========================================
-- JOKES (served by GET /api/random-joke)
-- ===========================================
CREATE SEQUENCE IF NOT EXISTS jokes_id_seq START 1;
CREATE TABLE IF NOT EXISTS jokes (
    id              BIGINT PRIMARY KEY DEFAULT nextval('jokes_id_seq'),
    setup           VARCHAR NOT NULL,
    punchline       VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#
    )
}
