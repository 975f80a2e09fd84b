//! JIT Access CLI: `jit` command.
//!
//! Request, inspect, reclaim and revoke time-boxed firewall grants held in
//! a local rule store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use jit_access::config::{
    ENV_RESOURCE_GROUP, ENV_SERVER_NAME, ENV_STORE_DIR, ENV_SUBSCRIPTION_ID, MAX_GRANT_TTL,
};
use jit_access::grant::{decode, TokenDecode};
use jit_access::time::to_rfc3339;
use jit_access::{
    AllowListStore, FileStore, GrantIssuer, GrantReclaimer, ServiceConfig, Subject, Ticks,
};

// ── Time formatting helpers ───────────────────────────────────────────────────

fn fmt_time(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Parse a duration string like "30m", "1h", "1h30m", "90s", or a bare
/// number of hours.
fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if let Ok(n) = s.parse::<u64>() {
        if n == 0 {
            return Err(anyhow!("duration must be > 0"));
        }
        let secs = n
            .checked_mul(3600)
            .ok_or_else(|| anyhow!("duration too large: {s}"))?;
        return Ok(Duration::from_secs(secs));
    }

    let mut total_secs: u64 = 0;
    let mut current = String::new();

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            current.push(ch);
        } else {
            let val: u64 = current
                .parse()
                .map_err(|_| anyhow!("invalid duration: {s}"))?;
            current.clear();
            let unit: u64 = match ch {
                'd' => 86400,
                'h' => 3600,
                'm' => 60,
                's' => 1,
                _ => return Err(anyhow!("unknown duration unit '{}' in '{s}'", ch)),
            };
            total_secs = val
                .checked_mul(unit)
                .and_then(|secs| total_secs.checked_add(secs))
                .ok_or_else(|| anyhow!("duration too large: {s}"))?;
        }
    }

    if !current.is_empty() {
        return Err(anyhow!("duration '{s}' is missing a unit (d/h/m/s)"));
    }

    if total_secs == 0 {
        return Err(anyhow!("duration must be > 0"));
    }

    Ok(Duration::from_secs(total_secs))
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// JIT Access CLI: grant temporary firewall access and reclaim it on expiry.
#[derive(Parser, Debug)]
#[command(
    name = "jit",
    about = "JIT Access CLI",
    version,
    long_about = "jit: JIT Access CLI\n\nRequest time-boxed firewall grants, list allow-list rules,\nrun reclaim scans and revoke grants early.\n\nThe target resource comes from flags or the JIT_SUBSCRIPTION_ID,\nJIT_RESOURCE_GROUP and JIT_SERVER_NAME environment variables."
)]
struct Cli {
    /// Rule store directory (default: JIT_STORE_DIR or ./jit-store)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Target subscription (overrides JIT_SUBSCRIPTION_ID)
    #[arg(long, global = true)]
    subscription_id: Option<String>,

    /// Target resource group (overrides JIT_RESOURCE_GROUP)
    #[arg(long, global = true)]
    resource_group: Option<String>,

    /// Target server (overrides JIT_SERVER_NAME)
    #[arg(long, global = true)]
    server_name: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Grant temporary access to an address or range
    Request {
        /// Address or inclusive range (a.b.c.d or a.b.c.d-e.f.g.h)
        #[arg(long)]
        ip: String,

        /// Grant lifetime, e.g. 30m, 1h, 1h30m (default: JIT_GRANT_TTL_SECS or 1h)
        #[arg(long)]
        ttl: Option<String>,
    },

    /// List every rule in the store with its grant status
    List,

    /// Run one reclaim scan now
    Scan,

    /// Revoke a managed grant before its deadline
    Revoke {
        /// Rule name to remove
        #[arg(long)]
        rule: String,
    },
}

// ── Main entry point ──────────────────────────────────────────────────────────

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")
        .and_then(|runtime| runtime.block_on(run(cli)));

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    log::debug!("using store {}", config.store_dir.display());

    match cli.command {
        Commands::Request { ip, ttl } => {
            cmd_request(&config, &ip, ttl.as_deref(), cli.json, cli.verbose).await
        }
        Commands::List => cmd_list(&config, cli.json, cli.verbose).await,
        Commands::Scan => cmd_scan(&config, cli.json).await,
        Commands::Revoke { rule } => cmd_revoke(&config, &rule, cli.json).await,
    }
}

/// Resolve configuration, letting flags shadow environment variables.
fn load_config(cli: &Cli) -> Result<ServiceConfig> {
    ServiceConfig::from_lookup(|key| {
        let flag = match key {
            ENV_SUBSCRIPTION_ID => cli.subscription_id.clone(),
            ENV_RESOURCE_GROUP => cli.resource_group.clone(),
            ENV_SERVER_NAME => cli.server_name.clone(),
            ENV_STORE_DIR => cli
                .store_dir
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    })
    .context("incomplete configuration")
}

fn open_store(config: &ServiceConfig) -> Result<Arc<FileStore>> {
    let store = FileStore::open(&config.store_dir, &config.target).with_context(|| {
        format!("failed to open rule store at {}", config.store_dir.display())
    })?;
    Ok(Arc::new(store))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── Command implementations ───────────────────────────────────────────────────

/// `jit request --ip ADDR [--ttl DURATION]`
async fn cmd_request(
    config: &ServiceConfig,
    ip: &str,
    ttl: Option<&str>,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let mut policy = config.access;
    if let Some(ttl) = ttl {
        let ttl = parse_duration(ttl)?;
        if ttl > MAX_GRANT_TTL {
            bail!("--ttl must not exceed {} days", MAX_GRANT_TTL.as_secs() / 86400);
        }
        policy = policy.with_ttl(ttl);
    }
    let subject = Subject::parse(ip)?;

    let issuer = GrantIssuer::new(open_store(config)?, config.target.clone(), policy);
    let grant = issuer.request_access(subject).await?;

    if json {
        return print_json(&grant);
    }

    println!("Access granted");
    println!("  Rule:     {}", grant.rule);
    println!("  Subject:  {}", grant.subject);
    println!("  Expires:  {}", fmt_time(grant.expires));
    if verbose {
        println!("  Server:   {}", config.target.server_name);
        println!("  TTL:      {}s", policy.ttl.as_secs());
    }
    Ok(())
}

/// `jit list`
async fn cmd_list(config: &ServiceConfig, json: bool, verbose: bool) -> Result<()> {
    let store = open_store(config)?;
    let rules = store.list_all().await.context("failed to list rules")?;
    let now = Ticks::from_datetime(Utc::now())
        .ok_or_else(|| anyhow!("system clock outside the supported range"))?;

    let rows: Vec<(String, String, String)> = rules
        .iter()
        .map(|rule| {
            let status = match decode(&rule.name) {
                TokenDecode::Managed(name) if name.is_expired_at(now) => {
                    format!("expired {}", fmt_time(name.expires_at()))
                }
                TokenDecode::Managed(name) => format!("active until {}", fmt_time(name.expires_at())),
                TokenDecode::Foreign => "foreign".to_string(),
                TokenDecode::Malformed(reason) => format!("malformed ({reason})"),
            };
            (rule.name.clone(), rule.subject().to_string(), status)
        })
        .collect();

    if json {
        let values: Vec<_> = rows
            .iter()
            .map(|(name, subject, status)| {
                serde_json::json!({"rule": name, "subject": subject, "status": status})
            })
            .collect();
        return print_json(&values);
    }

    println!("Rules ({}):", rows.len());
    if rows.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    println!("  {:<44} {:<32} STATUS", "RULE", "SUBJECT");
    println!("  {}", "-".repeat(100));
    for (name, subject, status) in &rows {
        println!("  {name:<44} {subject:<32} {status}");
    }
    if verbose {
        println!();
        println!("  Store: {}", store.rules_dir().display());
    }
    Ok(())
}

/// `jit scan`
async fn cmd_scan(config: &ServiceConfig, json: bool) -> Result<()> {
    let reclaimer =
        GrantReclaimer::new(open_store(config)?).with_store_timeout(config.reclaim.store_timeout);
    let report = reclaimer.run_scan().await?;

    if json {
        return print_json(&report);
    }

    println!("Reclaim scan at {}", to_rfc3339(report.started_at));
    println!("  Scanned:         {}", report.scanned);
    println!("  Deleted:         {}", report.expired_deleted);
    println!("  Delete failed:   {}", report.expired_delete_failed);
    println!("  Still active:    {}", report.active_remaining);
    println!("  Foreign:         {}", report.skipped_foreign);
    println!("  Malformed:       {}", report.skipped_malformed);

    if !report.is_clean() {
        bail!(
            "{} expired rule(s) could not be deleted",
            report.expired_delete_failed
        );
    }
    Ok(())
}

/// `jit revoke --rule NAME`
async fn cmd_revoke(config: &ServiceConfig, rule: &str, json: bool) -> Result<()> {
    let name = match decode(rule) {
        TokenDecode::Managed(name) => name,
        TokenDecode::Foreign => bail!("refusing to revoke '{rule}': not a JIT-managed rule"),
        TokenDecode::Malformed(reason) => {
            bail!("refusing to revoke '{rule}': malformed managed name ({reason})")
        }
    };

    let store = open_store(config)?;
    store
        .delete(rule)
        .await
        .with_context(|| format!("failed to delete rule '{rule}'"))?;

    if json {
        return print_json(&serde_json::json!({
            "rule": rule,
            "status": "Revoked",
            "deadline": to_rfc3339(name.expires_at()),
        }));
    }

    println!("Grant revoked");
    println!("  Rule:     {rule}");
    println!("  Deadline: {}", fmt_time(name.expires_at()));
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
