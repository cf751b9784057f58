use chrono::Utc;
use tracing::{debug, info};

use crate::domain::{
    Category, Currency, FeatureFlag, LedgerTotals, Locale, MinorUnits, MonthRange,
    MonthlySummary, NewTransaction, ParsedReceipt, Role, SessionContext, TransactionId,
    TransactionKind, TransactionRecord, User, ValidationError, compute_totals, resolve_category,
    summarize_by_category, summarize_by_month, summarize_by_month_dense,
};
use crate::settings::Settings;
use crate::storage::{Repository, TransactionFilter};

use super::{AppError, CategoryReport, MonthlyReport};

const CURRENCY_KEY: &str = "currency";

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
/// Every user-scoped operation takes the caller's [`SessionContext`].
pub struct LedgerService {
    repo: Repository,
}

/// Result of importing a parsed receipt
pub struct ReceiptImportResult {
    pub transactions: Vec<TransactionRecord>,
    /// Sum of line items.
    pub total: MinorUnits,
    /// Line items plus rounding.
    pub grand_total: MinorUnits,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path. Amounts are stored in
    /// minor units of `currency`, which is fixed for the life of the ledger;
    /// re-initializing with another currency fails.
    pub async fn init(database_path: &str, currency: &Currency) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        repo.insert_meta_if_absent(CURRENCY_KEY, currency.code()).await?;

        let service = Self::new(repo);
        service.ensure_ledger_currency(currency).await?;
        info!(database = database_path, currency = %currency, "database initialized");
        Ok(service)
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Users and sessions
    // ========================

    /// Register a user. The very first user becomes an admin regardless of
    /// `role`; after that only admins may register users.
    pub async fn register_user(
        &self,
        ctx: Option<&SessionContext>,
        email: &str,
        role: Role,
    ) -> Result<User, AppError> {
        let is_first = self.repo.count_users().await? == 0;
        let role = if is_first {
            Role::Admin
        } else {
            require_admin(ctx, "register users")?;
            role
        };

        let user = User::new(email, role)?;
        if self.repo.get_user_by_email(&user.email).await?.is_some() {
            return Err(AppError::UserAlreadyExists(user.email));
        }

        self.repo.save_user(&user).await?;
        info!(email = %user.email, role = %user.role, "user registered");
        Ok(user)
    }

    /// Build the session for `email` with display preferences from `settings`.
    pub async fn session(
        &self,
        email: &str,
        settings: &Settings,
    ) -> Result<SessionContext, AppError> {
        self.session_with(email, settings.locale, settings.currency()?).await
    }

    /// Session with explicit preferences, bypassing settings. `currency`
    /// must be the ledger currency.
    pub async fn session_with(
        &self,
        email: &str,
        locale: Locale,
        currency: Currency,
    ) -> Result<SessionContext, AppError> {
        self.ensure_ledger_currency(&currency).await?;

        let email = email.trim().to_lowercase();
        let user = self
            .repo
            .get_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::UserNotFound(email.clone()))?;
        Ok(SessionContext::new(user, locale, currency))
    }

    /// Currency recorded at init. `None` for ledgers created before the
    /// currency was recorded.
    pub async fn ledger_currency(&self) -> Result<Option<Currency>, AppError> {
        match self.repo.get_meta(CURRENCY_KEY).await? {
            Some(code) => Ok(Some(Currency::from_code(&code)?)),
            None => Ok(None),
        }
    }

    async fn ensure_ledger_currency(&self, currency: &Currency) -> Result<(), AppError> {
        match self.ledger_currency().await? {
            Some(ledger) if ledger != *currency => Err(AppError::CurrencyMismatch {
                found: currency.code().to_string(),
                ledger: ledger.code().to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub async fn list_users(&self, ctx: &SessionContext) -> Result<Vec<User>, AppError> {
        require_admin(Some(ctx), "list users")?;
        Ok(self.repo.list_users().await?)
    }

    /// Change a user's role. Admins cannot demote themselves, so there is
    /// always at least one admin left.
    pub async fn set_role(
        &self,
        ctx: &SessionContext,
        email: &str,
        role: Role,
    ) -> Result<User, AppError> {
        require_admin(Some(ctx), "change roles")?;

        let email = email.trim().to_lowercase();
        let mut user = self
            .repo
            .get_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::UserNotFound(email.clone()))?;

        if user.id == ctx.user_id() && role != Role::Admin {
            return Err(AppError::Forbidden(
                "admins cannot remove their own admin role".into(),
            ));
        }

        self.repo.update_user_role(user.id, role).await?;
        info!(email = %user.email, from = %user.role, to = %role, "role changed");
        user.role = role;
        Ok(user)
    }

    // ========================
    // Feature flags
    // ========================

    pub async fn set_feature_flag(
        &self,
        ctx: &SessionContext,
        name: &str,
        enabled: bool,
        description: Option<String>,
    ) -> Result<FeatureFlag, AppError> {
        require_admin(Some(ctx), "manage feature flags")?;

        let flag = FeatureFlag::new(name, enabled, description);
        if flag.name.is_empty() {
            return Err(ValidationError::MissingField("name").into());
        }

        self.repo.upsert_feature_flag(&flag).await?;
        info!(flag = %flag.name, enabled, "feature flag updated");

        // Re-read so a kept description is reflected.
        Ok(self
            .repo
            .get_feature_flag(&flag.name)
            .await?
            .unwrap_or(flag))
    }

    pub async fn list_feature_flags(
        &self,
        _ctx: &SessionContext,
    ) -> Result<Vec<FeatureFlag>, AppError> {
        Ok(self.repo.list_feature_flags().await?)
    }

    /// Unknown flags are disabled.
    pub async fn is_feature_enabled(&self, name: &str) -> Result<bool, AppError> {
        let name = name.trim().to_lowercase();
        Ok(self
            .repo
            .get_feature_flag(&name)
            .await?
            .is_some_and(|f| f.enabled))
    }

    // ========================
    // Categories
    // ========================

    pub async fn create_category(
        &self,
        ctx: &SessionContext,
        name: &str,
        color: Option<String>,
        kind: TransactionKind,
    ) -> Result<Category, AppError> {
        let category = Category::new(ctx.user_id(), name, color, kind)?;
        if self
            .repo
            .get_category_by_name(ctx.user_id(), &category.name)
            .await?
            .is_some()
        {
            return Err(AppError::CategoryAlreadyExists(category.name));
        }

        self.repo.save_category(&category).await?;
        info!(category = %category.name, kind = %category.kind, "category created");
        Ok(category)
    }

    pub async fn list_categories(&self, ctx: &SessionContext) -> Result<Vec<Category>, AppError> {
        Ok(self.repo.list_categories(ctx.user_id()).await?)
    }

    /// Look up one of the session user's categories by name, ignoring case.
    pub async fn find_category(
        &self,
        ctx: &SessionContext,
        name: &str,
    ) -> Result<Category, AppError> {
        self.repo
            .get_category_by_name(ctx.user_id(), name)
            .await?
            .ok_or_else(|| AppError::CategoryNotFound(name.trim().to_string()))
    }

    /// Keys that select the category called `name` in a transaction
    /// filter: its id plus its name, since records imported before the
    /// category existed carry the raw text. Unknown names match by text only.
    pub async fn category_keys(
        &self,
        ctx: &SessionContext,
        name: &str,
    ) -> Result<Vec<String>, AppError> {
        match self.find_category(ctx, name).await {
            Ok(category) => Ok(vec![category.id.to_string(), category.name]),
            Err(AppError::CategoryNotFound(raw)) => Ok(vec![raw]),
            Err(e) => Err(e),
        }
    }

    // ========================
    // Transactions
    // ========================

    /// Record a transaction. `category_id` may be a category name, which is
    /// resolved (case-insensitively) to the category's id.
    pub async fn record_transaction(
        &self,
        ctx: &SessionContext,
        input: NewTransaction,
    ) -> Result<TransactionRecord, AppError> {
        let input = self.resolve_category_key(ctx, input).await?;
        let record = TransactionRecord::create(ctx.user_id(), input)?;
        self.repo.save_transaction(&record).await?;
        info!(
            id = %record.id(),
            kind = %record.kind(),
            amount = record.amount(),
            "transaction recorded"
        );
        Ok(record)
    }

    /// Replace a transaction with a new version carrying the same id.
    pub async fn edit_transaction(
        &self,
        ctx: &SessionContext,
        id: TransactionId,
        input: NewTransaction,
    ) -> Result<TransactionRecord, AppError> {
        let existing = self
            .repo
            .get_transaction(ctx.user_id(), id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))?;

        let input = self.resolve_category_key(ctx, input).await?;
        let replacement = existing.replacement(input)?;
        self.repo.replace_transaction(&replacement).await?;
        info!(id = %replacement.id(), "transaction replaced");
        Ok(replacement)
    }

    pub async fn delete_transaction(
        &self,
        ctx: &SessionContext,
        id: TransactionId,
    ) -> Result<(), AppError> {
        if !self.repo.delete_transaction(ctx.user_id(), id).await? {
            return Err(AppError::TransactionNotFound(id.to_string()));
        }
        info!(%id, "transaction deleted");
        Ok(())
    }

    pub async fn list_transactions(
        &self,
        ctx: &SessionContext,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        Ok(self.repo.list_transactions(ctx.user_id(), filter).await?)
    }

    async fn resolve_category_key(
        &self,
        ctx: &SessionContext,
        mut input: NewTransaction,
    ) -> Result<NewTransaction, AppError> {
        let categories = self.repo.list_categories(ctx.user_id()).await?;
        if let Some(category) = resolve_category(input.category_id.trim(), &categories) {
            input.category_id = category.id.to_string();
        }
        Ok(input)
    }

    // ========================
    // Receipts
    // ========================

    /// Turn each receipt line into an expense transaction. Lines are
    /// recorded atomically: either every line is saved or none is.
    pub async fn import_receipt(
        &self,
        ctx: &SessionContext,
        receipt: &ParsedReceipt,
    ) -> Result<ReceiptImportResult, AppError> {
        if receipt.currency != ctx.currency {
            return Err(AppError::CurrencyMismatch {
                found: receipt.currency.code().to_string(),
                ledger: ctx.currency.code().to_string(),
            });
        }

        let categories = self.repo.list_categories(ctx.user_id()).await?;
        let date = receipt.date().unwrap_or_else(|| Utc::now().date_naive());

        let transactions = receipt
            .items
            .iter()
            .map(|item| {
                let category_id = resolve_category(&item.category, &categories)
                    .map(|c| c.id.to_string())
                    .unwrap_or_else(|| item.category.clone());
                let description = match (&receipt.note, item.description.is_empty()) {
                    (Some(note), true) => note.clone(),
                    _ => item.description.clone(),
                };

                TransactionRecord::create(
                    ctx.user_id(),
                    NewTransaction {
                        amount: item.net_amount(),
                        kind: TransactionKind::Expense,
                        category_id,
                        date,
                        description,
                    },
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.repo.save_transactions(&transactions).await?;
        info!(
            items = transactions.len(),
            total = receipt.total(),
            timestamp = receipt.timestamp.as_ref().map(|t| t.as_str()).unwrap_or("-"),
            "receipt imported"
        );

        Ok(ReceiptImportResult {
            transactions,
            total: receipt.total(),
            grand_total: receipt.grand_total(),
        })
    }

    // ========================
    // Reports
    // ========================

    /// Spending (or income) per category over the filtered transactions.
    pub async fn category_report(
        &self,
        ctx: &SessionContext,
        filter: &TransactionFilter,
    ) -> Result<CategoryReport, AppError> {
        let transactions = self.repo.list_transactions(ctx.user_id(), filter).await?;
        let categories = self.repo.list_categories(ctx.user_id()).await?;

        let summaries = summarize_by_category(&transactions, &categories);
        let totals = compute_totals(&transactions);
        debug!(groups = summaries.len(), "category report computed");

        Ok(CategoryReport::new(filter, summaries, totals))
    }

    /// Monthly rollup. With `dense`, every month of `range` is present.
    pub async fn monthly_report(
        &self,
        ctx: &SessionContext,
        filter: &TransactionFilter,
        range: Option<MonthRange>,
    ) -> Result<MonthlyReport, AppError> {
        let transactions = self.repo.list_transactions(ctx.user_id(), filter).await?;

        let months: Vec<MonthlySummary> = match range {
            Some(range) => summarize_by_month_dense(&transactions, range),
            None => summarize_by_month(&transactions),
        };
        let totals: LedgerTotals = compute_totals(&transactions);
        debug!(months = months.len(), "monthly report computed");

        Ok(MonthlyReport { months, totals })
    }
}

/// Flat role guard shared by admin operations.
fn require_admin(ctx: Option<&SessionContext>, action: &str) -> Result<(), AppError> {
    match ctx {
        Some(ctx) if ctx.is_admin() => Ok(()),
        Some(ctx) => Err(AppError::Forbidden(format!(
            "{} is not allowed to {}",
            ctx.user.email, action
        ))),
        None => Err(AppError::Forbidden(format!(
            "sign in as an admin to {}",
            action
        ))),
    }
}
