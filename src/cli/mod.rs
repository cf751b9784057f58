use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io;
use uuid::Uuid;

use crate::application::{CategoryReport, LedgerService, MonthlyReport};
use crate::domain::{
    Currency, CurrencyFormatter, Locale, MonthRange, NewTransaction, Role, SessionContext,
    TransactionKind, YearMonth, format_plain, parse_amount, parse_date, resolve_category,
};
use crate::io::{Exporter, ImportOptions, Importer};
use crate::settings::Settings;
use crate::storage::TransactionFilter;

/// Clarity - Personal Finance Tracker
#[derive(Parser)]
#[command(name = "clarity")]
#[command(about = "Track income and expenses, import receipts and review monthly rollups")]
#[command(version)]
pub struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Database file path (overrides settings)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Email of the user to act as
    #[arg(short, long, global = true, env = "CLARITY_USER")]
    pub user: Option<String>,

    /// Display locale, e.g. id-ID or en-US (overrides settings)
    #[arg(long, global = true)]
    pub locale: Option<String>,

    /// Ledger currency code, e.g. IDR or EUR (overrides settings)
    #[arg(long, global = true)]
    pub currency: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Feature flag commands
    #[command(subcommand)]
    Flag(FlagCommands),

    /// Category management commands
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Record, edit and list transactions
    #[command(subcommand)]
    Tx(TxCommands),

    /// Receipt commands
    #[command(subcommand)]
    Receipt(ReceiptCommands),

    /// Generate reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Export transactions to CSV
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// From date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// To date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },

    /// Import transactions from CSV
    Import {
        /// Input file (stdin if omitted)
        input: Option<String>,

        /// Validate without importing
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a user (the first user becomes admin)
    Add {
        email: String,

        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },

    /// List users (admin)
    List,

    /// Change a user's role (admin)
    Role {
        email: String,

        /// New role: user, admin
        role: String,
    },
}

#[derive(Subcommand)]
pub enum FlagCommands {
    /// Enable or disable a feature flag (admin)
    Set {
        name: String,

        /// on or off
        state: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// List feature flags
    List,
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a category
    Add {
        name: String,

        /// Kind of transactions it holds: income, expense
        #[arg(short, long, default_value = "expense")]
        kind: String,

        /// Display color, e.g. "#f97316"
        #[arg(long)]
        color: Option<String>,
    },

    /// List categories
    List,
}

#[derive(clap::Args)]
pub struct TxArgs {
    /// Amount (e.g., "50000" or "12.50")
    amount: String,

    /// Kind: income, expense
    #[arg(short, long, default_value = "expense")]
    kind: String,

    /// Category name
    #[arg(short, long)]
    category: String,

    /// Date (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    date: Option<String>,

    /// Description
    #[arg(short, long, default_value = "")]
    description: String,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Record a transaction
    Add(TxArgs),

    /// Replace a transaction with new values
    Edit {
        /// Transaction ID
        id: String,

        #[command(flatten)]
        args: TxArgs,
    },

    /// Delete a transaction
    Delete {
        /// Transaction ID
        id: String,
    },

    /// List transactions
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(clap::Args, Default)]
pub struct FilterArgs {
    /// From date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<String>,

    /// To date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<String>,

    /// Filter by kind: income, expense
    #[arg(long)]
    kind: Option<String>,

    /// Filter by category name
    #[arg(long)]
    category: Option<String>,

    /// Maximum number of transactions
    #[arg(short, long)]
    limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum ReceiptCommands {
    /// Import a parsed receipt (JSON) as expense transactions
    Import {
        /// Receipt JSON file (stdin if omitted)
        input: Option<String>,

        /// Show the parsed receipt without recording it
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Totals per category
    Categories {
        #[command(flatten)]
        filter: FilterArgs,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Income, expenses and balance per month
    Monthly {
        /// First month (YYYY-MM)
        #[arg(long)]
        from: Option<String>,

        /// Last month (YYYY-MM)
        #[arg(long)]
        to: Option<String>,

        /// Include months without transactions
        #[arg(long)]
        dense: bool,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
}

impl Cli {
    /// Resolve settings: file and environment, then command line overrides.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings =
            Settings::load(self.config.as_deref()).context("Failed to load settings")?;

        if let Some(database) = &self.database {
            settings.database = database.clone();
        }
        if let Some(locale) = &self.locale {
            settings.locale = Locale::parse(locale)?;
        }
        if let Some(currency) = &self.currency {
            settings.currency = Currency::from_code(currency)?.code().to_string();
        }
        if self.verbose {
            settings.log_level = "debug".to_string();
        }

        Ok(settings)
    }

    pub async fn run(self, settings: Settings) -> Result<()> {
        let database = settings.database.as_str();

        match self.command {
            Commands::Init => {
                let currency = settings.currency()?;
                LedgerService::init(database, &currency).await?;
                println!("Database initialized: {} ({})", database, currency);
            }

            Commands::User(cmd) => {
                let service = LedgerService::connect(database).await?;
                let ctx = match &self.user {
                    Some(email) => Some(service.session(email, &settings).await?),
                    None => None,
                };
                run_user_command(&service, ctx.as_ref(), cmd).await?;
            }

            Commands::Flag(cmd) => {
                let service = LedgerService::connect(database).await?;
                let ctx = session(&service, self.user.as_deref(), &settings).await?;
                run_flag_command(&service, &ctx, cmd).await?;
            }

            Commands::Category(cmd) => {
                let service = LedgerService::connect(database).await?;
                let ctx = session(&service, self.user.as_deref(), &settings).await?;
                run_category_command(&service, &ctx, cmd).await?;
            }

            Commands::Tx(cmd) => {
                let service = LedgerService::connect(database).await?;
                let ctx = session(&service, self.user.as_deref(), &settings).await?;
                run_tx_command(&service, &ctx, cmd).await?;
            }

            Commands::Receipt(ReceiptCommands::Import { input, dry_run }) => {
                let service = LedgerService::connect(database).await?;
                let ctx = session(&service, self.user.as_deref(), &settings).await?;
                run_receipt_import(&service, &ctx, input.as_deref(), dry_run).await?;
            }

            Commands::Report(cmd) => {
                let service = LedgerService::connect(database).await?;
                let ctx = session(&service, self.user.as_deref(), &settings).await?;
                run_report_command(&service, &ctx, cmd).await?;
            }

            Commands::Export { output, from, to } => {
                let service = LedgerService::connect(database).await?;
                let ctx = session(&service, self.user.as_deref(), &settings).await?;
                let filter = TransactionFilter {
                    from_date: from.as_deref().map(parse_date).transpose()?,
                    to_date: to.as_deref().map(parse_date).transpose()?,
                    ..Default::default()
                };

                let exporter = Exporter::new(&service, &ctx);
                let count = match output.as_deref() {
                    Some(path) => {
                        let file = File::create(path)
                            .with_context(|| format!("Failed to create output file: {}", path))?;
                        exporter.export_transactions_csv(file, &filter).await?
                    }
                    None => exporter.export_transactions_csv(io::stdout(), &filter).await?,
                };
                eprintln!("Exported {} transaction(s)", count);
            }

            Commands::Import { input, dry_run } => {
                let service = LedgerService::connect(database).await?;
                let ctx = session(&service, self.user.as_deref(), &settings).await?;
                let importer = Importer::new(&service, &ctx);
                let options = ImportOptions { dry_run };

                let result = match input.as_deref() {
                    Some(path) => {
                        let file = File::open(path)
                            .with_context(|| format!("Failed to open input file: {}", path))?;
                        importer.import_transactions_csv(file, options).await?
                    }
                    None => importer.import_transactions_csv(io::stdin(), options).await?,
                };

                let verb = if dry_run { "Validated" } else { "Imported" };
                println!("{} {} transaction(s)", verb, result.imported);
                if !result.errors.is_empty() {
                    println!("{} error(s):", result.errors.len());
                    for err in &result.errors {
                        println!(
                            "  line {}: {}{}",
                            err.line,
                            err.field
                                .as_ref()
                                .map(|f| format!("{}: ", f))
                                .unwrap_or_default(),
                            err.error
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

async fn session(
    service: &LedgerService,
    user: Option<&str>,
    settings: &Settings,
) -> Result<SessionContext> {
    let Some(email) = user else {
        bail!("No user selected. Pass --user EMAIL or set CLARITY_USER");
    };
    Ok(service.session(email, settings).await?)
}

async fn run_user_command(
    service: &LedgerService,
    ctx: Option<&SessionContext>,
    cmd: UserCommands,
) -> Result<()> {
    match cmd {
        UserCommands::Add { email, admin } => {
            let role = if admin { Role::Admin } else { Role::User };
            let user = service.register_user(ctx, &email, role).await?;
            println!("Registered {} ({})", user.email, user.role);
        }

        UserCommands::List => {
            let ctx = ctx.context("Listing users requires --user")?;
            let users = service.list_users(ctx).await?;
            println!("{:<36} {:<8} {:<10}", "EMAIL", "ROLE", "SINCE");
            println!("{}", "-".repeat(56));
            for user in users {
                println!(
                    "{:<36} {:<8} {:<10}",
                    truncate(&user.email, 36),
                    user.role,
                    user.created_at.format("%Y-%m-%d")
                );
            }
        }

        UserCommands::Role { email, role } => {
            let ctx = ctx.context("Changing roles requires --user")?;
            let user = service.set_role(ctx, &email, Role::parse(&role)?).await?;
            println!("{} is now {}", user.email, user.role);
        }
    }
    Ok(())
}

async fn run_flag_command(
    service: &LedgerService,
    ctx: &SessionContext,
    cmd: FlagCommands,
) -> Result<()> {
    match cmd {
        FlagCommands::Set {
            name,
            state,
            description,
        } => {
            let enabled = match state.to_lowercase().as_str() {
                "on" | "true" | "enable" | "enabled" => true,
                "off" | "false" | "disable" | "disabled" => false,
                other => bail!("Invalid flag state '{}'. Use on or off", other),
            };
            let flag = service
                .set_feature_flag(ctx, &name, enabled, description)
                .await?;
            println!(
                "Feature '{}' is {}",
                flag.name,
                if flag.enabled { "on" } else { "off" }
            );
        }

        FlagCommands::List => {
            let flags = service.list_feature_flags(ctx).await?;
            if flags.is_empty() {
                println!("No feature flags defined.");
                return Ok(());
            }
            println!("{:<24} {:<6} DESCRIPTION", "FLAG", "STATE");
            println!("{}", "-".repeat(56));
            for flag in flags {
                println!(
                    "{:<24} {:<6} {}",
                    truncate(&flag.name, 24),
                    if flag.enabled { "on" } else { "off" },
                    flag.description.unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

async fn run_category_command(
    service: &LedgerService,
    ctx: &SessionContext,
    cmd: CategoryCommands,
) -> Result<()> {
    match cmd {
        CategoryCommands::Add { name, kind, color } => {
            let kind = TransactionKind::parse(&kind)?;
            let category = service.create_category(ctx, &name, color, kind).await?;
            println!(
                "Created category: {} ({}, {})",
                category.name, category.kind, category.color
            );
        }

        CategoryCommands::List => {
            let categories = service.list_categories(ctx).await?;
            if categories.is_empty() {
                println!("No categories found.");
                return Ok(());
            }
            println!("{:<24} {:<8} {:<10}", "CATEGORY", "KIND", "COLOR");
            println!("{}", "-".repeat(44));
            for category in categories {
                println!(
                    "{:<24} {:<8} {:<10}",
                    truncate(&category.name, 24),
                    category.kind,
                    category.color
                );
            }
        }
    }
    Ok(())
}

fn tx_input(ctx: &SessionContext, args: TxArgs) -> Result<NewTransaction> {
    let amount = parse_amount(&args.amount, &ctx.currency)
        .with_context(|| format!("Invalid amount '{}'", args.amount))?;
    let date = match args.date {
        Some(date) => parse_date(&date)?,
        None => Utc::now().date_naive(),
    };

    Ok(NewTransaction {
        amount,
        kind: TransactionKind::parse(&args.kind)?,
        category_id: args.category,
        date,
        description: args.description,
    })
}

async fn run_tx_command(
    service: &LedgerService,
    ctx: &SessionContext,
    cmd: TxCommands,
) -> Result<()> {
    let formatter = ctx.formatter();

    match cmd {
        TxCommands::Add(args) => {
            let record = service.record_transaction(ctx, tx_input(ctx, args)?).await?;
            println!(
                "Recorded {} on {} ({})",
                formatter.format_signed(record.amount(), record.kind()),
                record.date(),
                record.id()
            );
        }

        TxCommands::Edit { id, args } => {
            let id = parse_id(&id)?;
            let record = service
                .edit_transaction(ctx, id, tx_input(ctx, args)?)
                .await?;
            println!(
                "Updated {}: {} on {}",
                record.id(),
                formatter.format_signed(record.amount(), record.kind()),
                record.date()
            );
        }

        TxCommands::Delete { id } => {
            let id = parse_id(&id)?;
            service.delete_transaction(ctx, id).await?;
            println!("Deleted transaction {}", id);
        }

        TxCommands::List { filter } => {
            let filter = build_filter(service, ctx, filter).await?;
            let transactions = service.list_transactions(ctx, &filter).await?;
            let categories = service.list_categories(ctx).await?;

            if transactions.is_empty() {
                println!("No transactions found.");
                return Ok(());
            }

            println!(
                "{:<10} {:<20} {:>18}  {:<30} {}",
                "DATE", "CATEGORY", "AMOUNT", "DESCRIPTION", "ID"
            );
            println!("{}", "-".repeat(118));
            for tx in transactions {
                let category = resolve_category(tx.category_id(), &categories)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| tx.category_id().to_string());
                println!(
                    "{:<10} {:<20} {:>18}  {:<30} {}",
                    tx.date(),
                    truncate(&category, 20),
                    formatter.format_signed(tx.amount(), tx.kind()),
                    truncate(tx.description(), 30),
                    tx.id()
                );
            }
        }
    }
    Ok(())
}

async fn run_receipt_import(
    service: &LedgerService,
    ctx: &SessionContext,
    input: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let importer = Importer::new(service, ctx);
    let options = ImportOptions { dry_run };

    let import = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open receipt: {}", path))?;
            importer.import_receipt_json(file, options).await?
        }
        None => importer.import_receipt_json(io::stdin(), options).await?,
    };

    let receipt = &import.receipt;
    let formatter = CurrencyFormatter::new(receipt.currency.clone(), ctx.locale);

    println!(
        "Receipt: {} item(s), {}",
        receipt.items.len(),
        receipt
            .timestamp
            .as_ref()
            .map(|t| t.as_str().to_string())
            .unwrap_or_else(|| "no timestamp".to_string())
    );
    for (idx, item) in receipt.items.iter().enumerate() {
        println!(
            "  {:>2}. {:<24} {:<16} {:>16}",
            idx + 1,
            truncate(&item.description, 24),
            truncate(&item.category, 16),
            formatter.format(item.net_amount())
        );
    }
    println!("  Total:       {:>16}", formatter.format(receipt.total()));
    if receipt.rounding != 0 {
        println!("  Rounding:    {:>16}", formatter.format(receipt.rounding));
        println!("  Paid:        {:>16}", formatter.format(receipt.grand_total()));
    }

    match import.recorded {
        Some(result) => println!(
            "Recorded {} expense transaction(s) totalling {}",
            result.transactions.len(),
            formatter.format(result.total)
        ),
        None => println!("Dry run: nothing recorded"),
    }
    Ok(())
}

async fn run_report_command(
    service: &LedgerService,
    ctx: &SessionContext,
    cmd: ReportCommands,
) -> Result<()> {
    match cmd {
        ReportCommands::Categories { filter, format } => {
            let mut filter = build_filter(service, ctx, filter).await?;
            if filter.kind.is_none() {
                filter.kind = Some(TransactionKind::Expense);
            }
            let report = service.category_report(ctx, &filter).await?;
            print_category_report(ctx, &report, &format)?;
        }

        ReportCommands::Monthly {
            from,
            to,
            dense,
            format,
        } => {
            let from = from.as_deref().map(YearMonth::parse).transpose()?;
            let to = to.as_deref().map(YearMonth::parse).transpose()?;

            let range = if dense {
                let end = to.unwrap_or_else(|| YearMonth::of(Utc::now().date_naive()));
                let start = from.unwrap_or_else(|| end.offset(-11));
                Some(MonthRange::new(start, end).context("--from must not be after --to")?)
            } else {
                None
            };

            let filter = TransactionFilter {
                from_date: range
                    .map(|r| r.start)
                    .or(from)
                    .and_then(YearMonth::first_day),
                to_date: range.map(|r| r.end).or(to).and_then(YearMonth::last_day),
                ..Default::default()
            };

            let report = service.monthly_report(ctx, &filter, range).await?;
            if format == "json" {
                Exporter::new(service, ctx).export_monthly_json(io::stdout(), &report)?;
                println!();
            } else {
                print_monthly_report(ctx, &report, &format);
            }
        }
    }
    Ok(())
}

fn print_category_report(
    ctx: &SessionContext,
    report: &CategoryReport,
    format: &str,
) -> Result<()> {
    let formatter = ctx.formatter();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        "csv" => {
            println!("category,color,total,count,percentage");
            for cat in &report.categories {
                println!(
                    "{},{},{},{},{:.2}",
                    cat.summary.label,
                    cat.summary.color,
                    format_plain(cat.summary.total, &ctx.currency),
                    cat.summary.count,
                    cat.percentage
                );
            }
        }
        _ => {
            // Table format
            println!(
                "Category Report ({})",
                report.kind.map(|k| k.as_str()).unwrap_or("all")
            );
            println!(
                "Period: {} to {}",
                display_date(report.from_date),
                display_date(report.to_date)
            );
            println!();
            println!(
                "{:<20} {:<8} {:>18} {:>6} {:>8}",
                "CATEGORY", "COLOR", "TOTAL", "COUNT", "PERCENT"
            );
            println!("{}", "-".repeat(64));

            for cat in &report.categories {
                println!(
                    "{:<20} {:<8} {:>18} {:>6} {:>7.1}%",
                    truncate(&cat.summary.label, 20),
                    cat.summary.color,
                    formatter.format(cat.summary.total),
                    cat.summary.count,
                    cat.percentage
                );
            }

            println!("{}", "-".repeat(64));
            println!("{:<29} {:>18}", "TOTAL", formatter.format(report.total));
        }
    }
    Ok(())
}

fn print_monthly_report(ctx: &SessionContext, report: &MonthlyReport, format: &str) {
    let formatter = ctx.formatter();

    match format {
        "csv" => {
            println!("month,income,expenses,balance");
            for m in &report.months {
                println!(
                    "{},{},{},{}",
                    m.month(),
                    format_plain(m.income(), &ctx.currency),
                    format_plain(m.expenses(), &ctx.currency),
                    format_plain(m.balance(), &ctx.currency)
                );
            }
        }
        _ => {
            // Table format
            println!(
                "{:<8} {:>18} {:>18} {:>18}",
                "MONTH", "INCOME", "EXPENSES", "BALANCE"
            );
            println!("{}", "-".repeat(65));
            for m in &report.months {
                println!(
                    "{:<8} {:>18} {:>18} {:>18}",
                    m.month().to_string(),
                    formatter.format(m.income()),
                    formatter.format(m.expenses()),
                    formatter.format(m.balance())
                );
            }
            println!("{}", "-".repeat(65));
            println!(
                "{:<8} {:>18} {:>18} {:>18}",
                "TOTAL",
                formatter.format(report.totals.income),
                formatter.format(report.totals.expenses),
                formatter.format(report.totals.balance)
            );
        }
    }
}

async fn build_filter(
    service: &LedgerService,
    ctx: &SessionContext,
    args: FilterArgs,
) -> Result<TransactionFilter> {
    let category_keys = match args.category.as_deref() {
        Some(name) => service.category_keys(ctx, name).await?,
        None => Vec::new(),
    };

    Ok(TransactionFilter {
        kind: args
            .kind
            .as_deref()
            .map(TransactionKind::parse)
            .transpose()?,
        category_keys,
        from_date: args.from.as_deref().map(parse_date).transpose()?,
        to_date: args.to.as_deref().map(parse_date).transpose()?,
        limit: args.limit,
    })
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).context("Invalid transaction ID format (expected UUID)")
}

fn display_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
