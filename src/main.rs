//! tier_ledger operator console
//!
//! ```text
//! tier_ledger --env dev init-schema
//! tier_ledger deposit --operator 12 --target 40 --amount 25.50
//! tier_ledger settle --parent 3 --child 12 --adjustment -1500
//! tier_ledger history --account 40 --limit 10
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use tier_ledger::account::{AccountLimits, AccountProvisioner, NewAccountRequest, Tier};
use tier_ledger::config::AppConfig;
use tier_ledger::db::Database;
use tier_ledger::ledger::{LedgerEntry, LedgerStore, Origin, PgLedgerStore, schema};
use tier_ledger::money::{format_amount, parse_amount, parse_signed_amount};
use tier_ledger::reconciliation::{
    OperatorContext, ReconciliationEngine, ReconciliationError, SettlementKind,
};
use tier_ledger::remote::HttpRemoteLedger;
use tier_ledger::{AccountId, BalanceRecord};

#[derive(Parser, Debug)]
#[command(name = "tier_ledger")]
#[command(about = "Back-office money movements reconciled with the remote wagering platform")]
struct Cli {
    /// Config environment, reads config/<env>.yaml
    #[arg(long, default_value = "dev")]
    env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create tables if missing
    InitSchema,

    /// Fund an account outside the settlement cycle
    Deposit {
        #[arg(long)]
        operator: AccountId,
        #[arg(long)]
        target: AccountId,
        /// Major units, e.g. 25.50
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "")]
        comment: String,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long, default_value = "127.0.0.1")]
        origin: String,
    },

    /// Take funds back from an account
    CashOut {
        #[arg(long)]
        operator: AccountId,
        #[arg(long)]
        target: AccountId,
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "")]
        comment: String,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long, default_value = "127.0.0.1")]
        origin: String,
    },

    /// Weekly settlement between a parent and a child; negative funds the child
    Settle {
        #[arg(long)]
        parent: AccountId,
        #[arg(long)]
        child: AccountId,
        #[arg(long, allow_hyphen_values = true)]
        adjustment: String,
    },

    /// Create and fund a child account
    CreateAccount {
        #[arg(long)]
        operator: AccountId,
        /// player, agent or master
        #[arg(long)]
        tier: String,
        #[arg(long)]
        parent: Option<AccountId>,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        nickname: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, default_value = "0")]
        total_to_spend: String,
        #[arg(long, default_value_t = 0)]
        revenue_share: i32,
        #[arg(long, default_value_t = 0)]
        discount_limit: i32,
        #[arg(long, default_value = "0")]
        bet_limit: String,
        #[arg(long, default_value = "127.0.0.1")]
        origin: String,
    },

    /// Show the balance record of an account
    Balance {
        #[arg(long)]
        account: AccountId,
    },

    /// Latest ledger entries of an account
    History {
        #[arg(long)]
        account: AccountId,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

struct Console {
    config: AppConfig,
    store: Arc<PgLedgerStore>,
    engine: Arc<ReconciliationEngine>,
}

impl Console {
    async fn connect(config: AppConfig) -> Result<Self> {
        let url = config
            .postgres_url
            .clone()
            .context("postgres_url is not configured")?;
        let db = Database::connect(&url, config.db_max_connections)
            .await
            .context("Failed to connect to PostgreSQL")?;
        db.health_check()
            .await
            .context("PostgreSQL health check failed")?;
        let store = Arc::new(PgLedgerStore::new(db.pool().clone()));
        let remote = Arc::new(
            HttpRemoteLedger::new(&config.remote).context("Failed to build remote client")?,
        );
        let engine = Arc::new(ReconciliationEngine::new(store.clone(), remote));
        Ok(Self {
            config,
            store,
            engine,
        })
    }

    /// Operator plus the remote credentials of its root super agent
    async fn context(&self, operator_id: AccountId, origin: Origin) -> Result<OperatorContext> {
        let operator = self
            .store
            .account(operator_id)
            .await?
            .with_context(|| format!("Operator account {} not found", operator_id))?;
        let root = self.store.root_account(operator_id).await?;
        let credentials = self
            .config
            .remote
            .credentials_for(&root.username)
            .with_context(|| {
                format!(
                    "No remote credentials configured for super agent {}",
                    root.username
                )
            })?;
        Ok(OperatorContext::new(operator, origin, credentials))
    }
}

/// Zero allowed; sign checks are left to the creation policy
fn min_units(value: &str, what: &str) -> Result<i64> {
    parse_signed_amount(value).with_context(|| format!("Invalid {}: {}", what, value))
}

fn print_entry(entry: &LedgerEntry) {
    println!(
        "#{:<6} {} {:>8} {:>12} {:<4} {} -> {}  op={} withdraw_tx={} deposit_tx={} {} {}",
        entry.entry_id,
        entry.created_at.format("%Y-%m-%d %H:%M:%S"),
        entry.movement_type,
        format_amount(entry.amount),
        entry.currency,
        entry.sender_id,
        entry.receiver_id,
        entry.operator_id,
        entry.withdraw_tx_raw(),
        entry.deposit_tx_raw(),
        entry.category,
        entry.comment,
    );
}

fn print_balance(record: &BalanceRecord) {
    println!("Account {}", record.account_id);
    println!("  available:          {}", format_amount(record.available_balance));
    println!("  additional credit:  {}", format_amount(record.additional_credit));
    println!("  spendable:          {}", format_amount(record.spendable()));
    println!("  discount active:    {}", record.discount_status);
    println!(
        "  deposits sent:      {} ({})",
        record.deposits_sent_count,
        format_amount(record.deposits_sent_amount)
    );
    println!(
        "  deposits received:  {} ({})",
        record.deposits_received_count,
        format_amount(record.deposits_received_amount)
    );
    println!(
        "  cashouts sent:      {} ({})",
        record.cashouts_sent_count,
        format_amount(record.cashouts_sent_amount)
    );
    println!(
        "  cashouts received:  {} ({})",
        record.cashouts_received_count,
        format_amount(record.cashouts_received_amount)
    );
}

async fn run(command: Command, config: AppConfig) -> Result<()> {
    let command = match command {
        Command::InitSchema => {
            let url = config
                .postgres_url
                .as_deref()
                .context("postgres_url is not configured")?;
            let db = Database::connect(url, config.db_max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;
            schema::init_schema(db.pool()).await?;
            println!("Schema ready");
            return Ok(());
        }
        other => other,
    };

    let console = Console::connect(config).await?;

    match command {
        Command::InitSchema => {}
        Command::Deposit {
            operator,
            target,
            amount,
            comment,
            currency,
            origin,
        } => {
            let ctx = console.context(operator, Origin::parse(&origin)).await?;
            let amount = parse_amount(&amount).context("Invalid amount")?;
            let entry = console
                .engine
                .deposit(&ctx, target, amount, &comment, currency)
                .await?;
            print_entry(&entry);
        }
        Command::CashOut {
            operator,
            target,
            amount,
            comment,
            currency,
            origin,
        } => {
            let ctx = console.context(operator, Origin::parse(&origin)).await?;
            let amount = parse_amount(&amount).context("Invalid amount")?;
            let entry = console
                .engine
                .cash_out(&ctx, target, amount, &comment, currency)
                .await?;
            print_entry(&entry);
        }
        Command::Settle {
            parent,
            child,
            adjustment,
        } => {
            let root = console.store.root_account(parent).await?;
            let ctx = console.context(root.account_id, Origin::System).await?;
            let adjustment = parse_signed_amount(&adjustment).context("Invalid adjustment")?;
            match console
                .engine
                .settle_weekly(&ctx, parent, child, adjustment, SettlementKind::Periodic)
                .await?
            {
                Some(entry) => print_entry(&entry),
                None => println!("Nothing to settle"),
            }
        }
        Command::CreateAccount {
            operator,
            tier,
            parent,
            username,
            password,
            nickname,
            first_name,
            last_name,
            phone,
            total_to_spend,
            revenue_share,
            discount_limit,
            bet_limit,
            origin,
        } => {
            let ctx = console.context(operator, Origin::parse(&origin)).await?;
            let tier = Tier::parse(&tier).with_context(|| format!("Unknown tier: {}", tier))?;
            let req = NewAccountRequest {
                tier,
                parent_id: parent,
                username,
                password,
                nickname,
                first_name,
                last_name,
                phone,
                total_to_spend: min_units(&total_to_spend, "total to spend")?,
                limits: AccountLimits {
                    revenue_share_pct: revenue_share,
                    discount_limit_pct: discount_limit,
                    bet_limit: min_units(&bet_limit, "bet limit")?,
                },
            };
            let provisioner =
                AccountProvisioner::new(console.engine.clone(), console.config.backoffice.clone());
            let account = provisioner.create_account(&ctx, &req).await?;
            println!(
                "Created {} {} (id {}, external id {})",
                account.tier, account.username, account.account_id, account.external_id
            );
        }
        Command::Balance { account } => {
            let record = console
                .store
                .balance(account)
                .await?
                .with_context(|| format!("Account {} not found", account))?;
            print_balance(&record);
        }
        Command::History { account, limit } => {
            let entries = console.store.entries_for(account, limit).await?;
            if entries.is_empty() {
                println!("No ledger entries for account {}", account);
            }
            for entry in &entries {
                print_entry(entry);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.env) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(2);
        }
    };
    let log_guard = tier_ledger::logging::init_logging(&config);

    tracing::info!(
        "Starting tier_ledger {} ({}) in {} mode",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        cli.env
    );

    if let Err(e) = run(cli.command, config).await {
        match e.downcast_ref::<ReconciliationError>() {
            Some(re) => {
                tracing::error!(code = re.code(), state = %re.terminal_state(), "{}", re);
                eprintln!("{}: {}", re.code(), re);
            }
            None => eprintln!("Error: {:#}", e),
        }
        // exit skips destructors; flush the file appender first
        drop(log_guard);
        std::process::exit(1);
    }
}
