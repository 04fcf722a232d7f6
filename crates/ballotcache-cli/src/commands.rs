use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use serde_json::Value;
use tracing::{info, warn};

use ballotcache_core::api::{ApiQuery, FecClient};
use ballotcache_core::auth::{mask_api_key, AdminAuth, ApiKeyStore, CurrentUser};
use ballotcache_core::cache::{Cache, QueryParams};
use ballotcache_core::config::Config;
use ballotcache_core::elections::ElectionData;
use ballotcache_core::finance::{FecFinance, FinanceEstimator};
use ballotcache_core::models::ElectionRecord;
use ballotcache_core::notify::{BroadcastNotifier, NotifierRef};
use ballotcache_core::query::{QueryClient, QueryState};
use ballotcache_core::staleness::StalenessTracker;
use ballotcache_core::store::{DatasetKey, FileMedium, Store};
use ballotcache_core::sync::{StaticDatasetSource, SyncService};
use ballotcache_core::utils::{format_currency, format_date, format_votes};

const ADMIN_PASSWORD_ENV: &str = "BALLOTCACHE_ADMIN_PASSWORD";
const ADMIN_EMAIL_ENV: &str = "BALLOTCACHE_ADMIN_EMAIL";
const DEFAULT_ADMIN_EMAIL: &str = "admin@localhost";

pub struct Context {
    config: Config,
    config_path: PathBuf,
    store: Store,
    notifier: NotifierRef,
}

impl Context {
    pub fn open(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => Config::config_path()?,
        };
        let config = Config::load_from(&config_path)?;
        let storage = config.storage_path()?;
        let medium = FileMedium::open(&storage)
            .with_context(|| format!("Failed to open storage at {}", storage.display()))?;
        info!(storage = %storage.display(), "Storage opened");

        Ok(Self {
            config,
            config_path,
            store: Store::new(Arc::new(medium)),
            notifier: Arc::new(BroadcastNotifier::new()),
        })
    }

    fn admin(&mut self) -> Result<AdminAuth> {
        let (secret, generated) = self.config.ensure_session_secret();
        if generated {
            self.config
                .save_to(&self.config_path)
                .context("Failed to save generated session secret")?;
        }
        let mut auth = AdminAuth::new(&self.store, &secret)?;
        if let Ok(password) = std::env::var(ADMIN_PASSWORD_ENV) {
            let email = std::env::var(ADMIN_EMAIL_ENV).unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string());
            auth = auth.with_default_admin(email, password);
        }
        Ok(auth)
    }

    fn require_admin(&mut self) -> Result<CurrentUser> {
        match self.admin()?.current_user() {
            Some(user) => Ok(user),
            None => bail!("Not logged in. Run `ballotcache admin login <email>` first."),
        }
    }

    fn query_client(&self) -> Result<QueryClient<FecClient>> {
        let client = FecClient::new(self.config.api_base_url.clone(), Config::api_key())?;
        Ok(QueryClient::new(
            Arc::new(client),
            self.store.clone(),
            self.config.cache_duration(),
        ))
    }
}

fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read password")
}

fn prompt_new_password() -> Result<String> {
    let password = prompt_password("New password: ")?;
    let confirm = prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    Ok(password)
}

pub async fn sync(ctx: &mut Context) -> Result<()> {
    let user = ctx.require_admin()?;
    info!(email = %user.email, "Sync requested");

    let service = SyncService::new(StaticDatasetSource, ctx.store.clone(), Arc::clone(&ctx.notifier));
    let elections = service.sync().await?;
    println!("{}", sync_report(&elections));
    Ok(())
}

/// Change events only reach this process; other processes sharing the
/// storage file pick up the new dataset when they next read it.
fn sync_report(elections: &[ElectionRecord]) -> String {
    let years: Vec<String> = elections.iter().map(|e| e.year.to_string()).collect();
    format!(
        "Synced {} elections: {}\n\
         Other processes using this storage file see the new data on their next read.",
        elections.len(),
        years.join(", ")
    )
}

pub fn status(ctx: &Context) -> Result<()> {
    let staleness = StalenessTracker::new(ctx.store.clone(), ctx.config.stale_threshold()).current();
    match &staleness.last_update {
        Some(at) => println!("Last update:  {}", format_date(at)),
        None => println!("Last update:  never"),
    }
    println!(
        "Data status:  {}",
        if staleness.is_stale { "stale" } else { "fresh" }
    );

    let last_sync = ctx.store.dataset().get_raw(DatasetKey::LastSync)?;
    println!(
        "Last sync:    {}",
        last_sync.as_deref().map(format_date).unwrap_or_else(|| "never".to_string())
    );

    let stats = Cache::<Value>::new(&ctx.store, ctx.config.cache_duration()).stats();
    println!("Cached items: {}", stats.items);
    println!("Cache size:   {} KB", stats.size_kb());
    Ok(())
}

fn parse_params(params: &[String]) -> Result<QueryParams> {
    let mut out = QueryParams::new();
    for param in params {
        let Some((key, value)) = param.split_once('=') else {
            bail!("Invalid parameter '{}', expected key=value", param);
        };
        out.insert(key, value);
    }
    Ok(out)
}

pub async fn query(ctx: &Context, endpoint: &str, params: &[String], refetch: bool) -> Result<()> {
    let client = ctx.query_client()?;
    let query = client.query::<Value>(&ApiQuery::new(endpoint, parse_params(params)?));

    let state = if refetch { query.refetch().await } else { query.run().await };
    match state {
        QueryState::Success(data) => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        QueryState::Error(err) => {
            if err.is_retryable() {
                warn!("Request failed before reaching the API; retrying may help");
            }
            bail!("{}", err)
        }
        QueryState::Idle | QueryState::Loading => bail!("No endpoint given"),
    }
}

pub fn elections(ctx: &Context, pair: Option<(u16, u16)>) -> Result<()> {
    let data = ElectionData::load(&ctx.store);

    let Some((primary, comparison)) = pair else {
        println!("Source: {:?}", data.origin);
        for e in &data.elections {
            println!(
                "{}  {} ({:?}) {} EV, {} votes  def. {} ({:?}) {} EV  turnout {:.1}%",
                e.year,
                e.winner.name,
                e.winner.party,
                e.winner.electoral_votes,
                format_votes(e.winner.popular_votes),
                e.runner_up.name,
                e.runner_up.party,
                e.runner_up.electoral_votes,
                e.turnout_percentage,
            );
        }
        return Ok(());
    };

    let pair = data.select(primary, comparison)?;
    for e in [pair.primary, pair.comparison] {
        println!(
            "{}: {} def. {}, EV margin {}, popular margin {:+.1} pts",
            e.year,
            e.winner.name,
            e.runner_up.name,
            e.electoral_margin(),
            e.popular_margin(),
        );
    }
    println!("Turnout change:   {:+.1} pts", pair.turnout_change());
    println!("Total vote change: {:+}", pair.popular_vote_growth());
    println!(
        "Winning party:    {}",
        if pair.same_winning_party() { "held" } else { "flipped" }
    );
    Ok(())
}

pub async fn finance(ctx: &Context, candidate_id: &str, year: u16, committee: Option<&str>) -> Result<()> {
    let finance = FecFinance::new(ctx.query_client()?);

    let (totals, outside) = finance.candidate_overview(candidate_id, year).await?;
    println!("Total raised:  {}", format_currency(totals.total_raised));
    println!("Total spent:   {}", format_currency(totals.total_spent));
    println!("Cash on hand:  {}", format_currency(totals.cash_on_hand));
    println!("Debts:         {}", format_currency(totals.debts));

    println!("Outside support: {}", format_currency(outside.support_total));
    println!("Outside oppose:  {}", format_currency(outside.oppose_total));

    if let Some(committee_id) = committee {
        let summary = finance.disbursements(committee_id, year).await?;
        println!("Top disbursements: {}", format_currency(summary.total));
        let mut categories: Vec<_> = summary.categories.into_iter().collect();
        categories.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (category, amount) in categories {
            println!("  {:<40} {}", category, format_currency(amount));
        }
    }
    Ok(())
}

pub fn cache_clear(ctx: &mut Context) -> Result<()> {
    ctx.require_admin()?;
    let cleared = Cache::<Value>::new(&ctx.store, ctx.config.cache_duration()).clear("")?;
    println!("Removed {} cached responses", cleared);
    Ok(())
}

pub fn admin_register(ctx: &mut Context, email: &str, role: &str) -> Result<()> {
    let auth = ctx.admin()?;
    let password = prompt_new_password()?;
    auth.register(email, &password, role)?;
    println!("Registered {}", email);
    Ok(())
}

pub fn admin_login(ctx: &mut Context, email: &str) -> Result<()> {
    let auth = ctx.admin()?;
    let password = prompt_password("Password: ")?;
    let session = auth.login(email, &password)?;
    println!(
        "Logged in as {} (expires in {} minutes)",
        session.email,
        session.minutes_until_expiry()
    );
    Ok(())
}

pub fn admin_logout(ctx: &mut Context) -> Result<()> {
    ctx.admin()?.logout()?;
    println!("Logged out");
    Ok(())
}

pub fn admin_whoami(ctx: &mut Context) -> Result<()> {
    match ctx.admin()?.current_user() {
        Some(user) => println!("{} ({})", user.email, user.role),
        None => println!("Not logged in"),
    }
    Ok(())
}

pub fn admin_passwd(ctx: &mut Context) -> Result<()> {
    let user = ctx.require_admin()?;
    let auth = ctx.admin()?;
    let old = prompt_password("Current password: ")?;
    let new = prompt_new_password()?;
    auth.change_password(&user.email, &old, &new)?;
    println!("Password changed");
    Ok(())
}

pub fn api_key_set(ctx: &mut Context, key: Option<String>) -> Result<()> {
    ctx.require_admin()?;
    let key = match key {
        Some(key) => key,
        None => prompt_password("FEC API key: ")?,
    };
    if key.trim().is_empty() {
        bail!("API key cannot be empty");
    }
    ApiKeyStore::store(key.trim())?;
    println!("API key saved ({})", mask_api_key(key.trim()));
    Ok(())
}

pub fn api_key_show() -> Result<()> {
    match Config::api_key() {
        Some(key) => println!("{}", mask_api_key(&key)),
        None => println!("No API key configured"),
    }
    Ok(())
}

pub fn api_key_clear(ctx: &mut Context) -> Result<()> {
    ctx.require_admin()?;
    ApiKeyStore::delete()?;
    println!("API key removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&["per_page=20".to_string(), "q=a=b".to_string()]).unwrap();
        assert_eq!(params.get("per_page"), Some("20"));
        assert_eq!(params.get("q"), Some("a=b"));
        assert!(parse_params(&["missing".to_string()]).is_err());
    }

    #[test]
    fn test_sync_report_mentions_other_processes() {
        let elections = ballotcache_core::sync::static_data::static_elections();
        let report = sync_report(&elections[..2]);
        assert!(report.starts_with("Synced 2 elections: 2004, 2008"));
        assert!(report.contains("see the new data on their next read"));
    }
}
