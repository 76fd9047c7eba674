//! PostgreSQL schema for accounts, balances and ledger entries

use sqlx::PgPool;

const CREATE_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS accounts_tb (
    account_id      BIGSERIAL PRIMARY KEY,
    username        VARCHAR(32) NOT NULL UNIQUE,
    email           VARCHAR(128) NOT NULL,
    tier            SMALLINT NOT NULL,
    parent_id       BIGINT REFERENCES accounts_tb(account_id),
    external_id     BIGINT NOT NULL,
    currency        VARCHAR(8) NOT NULL,
    revenue_share   INTEGER NOT NULL DEFAULT 0,
    discount_limit  INTEGER NOT NULL DEFAULT 0,
    bet_limit       BIGINT NOT NULL DEFAULT 0,
    password_hash   VARCHAR(255) NOT NULL,
    phone           VARCHAR(32),
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_BALANCES: &str = r#"
CREATE TABLE IF NOT EXISTS balances_tb (
    account_id                BIGINT PRIMARY KEY REFERENCES accounts_tb(account_id) ON DELETE CASCADE,
    available_balance         BIGINT NOT NULL DEFAULT 0,
    additional_credit         BIGINT NOT NULL DEFAULT 0,
    discount_status           BOOLEAN NOT NULL DEFAULT FALSE,
    deposits_sent_count       BIGINT NOT NULL DEFAULT 0,
    deposits_sent_amount      BIGINT NOT NULL DEFAULT 0,
    deposits_received_count   BIGINT NOT NULL DEFAULT 0,
    deposits_received_amount  BIGINT NOT NULL DEFAULT 0,
    cashouts_sent_count       BIGINT NOT NULL DEFAULT 0,
    cashouts_sent_amount      BIGINT NOT NULL DEFAULT 0,
    cashouts_received_count   BIGINT NOT NULL DEFAULT 0,
    cashouts_received_amount  BIGINT NOT NULL DEFAULT 0,
    updated_at                TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT chk_available_non_negative CHECK (available_balance >= 0)
)
"#;

const CREATE_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries_tb (
    entry_id        BIGSERIAL PRIMARY KEY,
    movement_id     VARCHAR(26) NOT NULL UNIQUE,
    amount          BIGINT NOT NULL CHECK (amount > 0),
    sender_id       BIGINT NOT NULL REFERENCES accounts_tb(account_id),
    receiver_id     BIGINT NOT NULL REFERENCES accounts_tb(account_id),
    operator_id     BIGINT NOT NULL,
    withdraw_tx_id  BIGINT NOT NULL DEFAULT 0,
    deposit_tx_id   BIGINT NOT NULL DEFAULT 0,
    movement_type   SMALLINT NOT NULL,
    category        SMALLINT NOT NULL,
    currency        VARCHAR(8) NOT NULL,
    comment         TEXT NOT NULL DEFAULT '',
    origin          VARCHAR(64) NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_ledger_sender ON ledger_entries_tb (sender_id, entry_id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_ledger_receiver ON ledger_entries_tb (receiver_id, entry_id DESC)",
];

/// Create all tables if they do not exist yet
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in [CREATE_ACCOUNTS, CREATE_BALANCES, CREATE_ENTRIES]
        .into_iter()
        .chain(CREATE_INDEXES)
    {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("Ledger schema initialized");
    Ok(())
}
