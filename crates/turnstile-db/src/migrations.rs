use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE access_tokens (
                id            TEXT PRIMARY KEY,
                token         TEXT NOT NULL UNIQUE,
                user_id       TEXT NOT NULL,
                payment_ref   TEXT,
                offer_days    INTEGER,
                offer_hours   INTEGER,
                offer_minutes INTEGER,
                status        TEXT NOT NULL DEFAULT 'pending',
                external_id   TEXT,
                created_at    TEXT NOT NULL,
                expires_at    TEXT NOT NULL,
                used_at       TEXT
            );

            CREATE INDEX idx_tokens_sweep
                ON access_tokens(status, expires_at);

            CREATE TABLE channel_invites (
                id           TEXT PRIMARY KEY,
                token_id     TEXT NOT NULL REFERENCES access_tokens(id),
                user_id      TEXT NOT NULL,
                channel_id   TEXT NOT NULL,
                invite_link  TEXT NOT NULL,
                status       TEXT NOT NULL DEFAULT 'pending',
                external_id  TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                sent_at      TEXT,
                accepted_at  TEXT,
                expires_at   TEXT NOT NULL
            );

            CREATE INDEX idx_invites_identity
                ON channel_invites(external_id, channel_id, status);
            CREATE INDEX idx_invites_sweep
                ON channel_invites(status, expires_at);

            CREATE TABLE memberships (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                invite_id   TEXT REFERENCES channel_invites(id),
                channel_id  TEXT NOT NULL,
                external_id TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'active',
                joined_at   TEXT NOT NULL,
                expires_at  TEXT NOT NULL,
                ended_at    TEXT,
                UNIQUE(user_id, channel_id)
            );

            CREATE INDEX idx_memberships_identity
                ON memberships(external_id, channel_id);
            CREATE INDEX idx_memberships_sweep
                ON memberships(status, expires_at);

            CREATE TABLE notifications (
                id               TEXT PRIMARY KEY,
                user_id          TEXT NOT NULL,
                membership_id    TEXT REFERENCES memberships(id),
                kind             TEXT NOT NULL,
                offset_days      INTEGER,
                title            TEXT NOT NULL,
                body             TEXT NOT NULL,
                link             TEXT,
                site_delivery    INTEGER NOT NULL DEFAULT 0,
                email_delivery   INTEGER NOT NULL DEFAULT 0,
                channel_delivery INTEGER NOT NULL DEFAULT 0,
                metadata         TEXT,
                created_at       TEXT NOT NULL,
                sent_at          TEXT,
                UNIQUE(user_id, membership_id, kind, offset_days)
            );

            CREATE INDEX idx_notifications_retention
                ON notifications(created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
