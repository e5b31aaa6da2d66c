//! Demo server wiring the request-context layer into a small axum app.
//!
//! Routes:
//! - `/` greets the signed-in user and shows queued flash messages
//! - `/search?q=` searches a fixed customer directory
//! - `/login?user=` signs in and redirects home
//! - `/customer/{id}` focuses a customer and loads their record

use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::header::HeaderName;
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use scopeweb_core::i18n::AssetCatalogLoader;
use scopeweb_core::{
    CustomerRecord, CustomerScope, CustomerSummary, I18n, I18nConfig, ProfileIdentity, RenderData, RenderValue,
    SearchScope, TranslationArgs, Voucher, Wallet,
};
use scopeweb_server::helpers::{first_letter, format_money, is_checked, percentage, voucher_class};
use scopeweb_server::{
    AppConfig, ContextError, ContextHandle, CookieSessionStore, CustomerSource, Page, RequestContext,
    RequestContextLayer, Secret, SessionConfig, SessionPersistence, StaticPaths, TemplateConfig, TemplateEngine,
    TemplateRenderError,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "demo-server", about = "Request-context demo server")]
struct Cli {
    #[arg(long, env = "SCOPEWEB_HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "SCOPEWEB_PORT", default_value = "8080")]
    port: u16,

    /// Secret the session cookie MAC key is derived from
    #[arg(long, env = "SCOPEWEB_SESSION_SECRET", hide_env_values = true)]
    session_secret: String,

    /// Session lifetime in seconds (browser-session cookie if unset)
    #[arg(long, env = "SCOPEWEB_SESSION_MAX_AGE")]
    session_max_age: Option<u64>,

    #[arg(long, env = "SCOPEWEB_SECURE_COOKIES")]
    secure_cookies: bool,

    /// Directory holding `<resources>/<locale>.all.json`; built-in catalogs if unset
    #[arg(long, env = "SCOPEWEB_I18N_DIR")]
    i18n_dir: Option<PathBuf>,

    #[arg(long, env = "SCOPEWEB_DEFAULT_LANGUAGE", default_value = "en")]
    default_language: String,

    #[arg(long, env = "SCOPEWEB_LANGUAGES", value_delimiter = ',', default_value = "en,de")]
    languages: Vec<String>,

    #[arg(long, env = "SCOPEWEB_ROOT", default_value = "/")]
    root: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn app_config(&self) -> AppConfig {
        AppConfig {
            session: SessionConfig {
                secret: Secret::new(self.session_secret.clone()),
                max_age: self.session_max_age.map(Duration::from_secs),
                secure: self.secure_cookies,
                ..SessionConfig::default()
            },
            i18n: I18nConfig {
                default_language: self.default_language.clone(),
                languages: self.languages.clone(),
                ..I18nConfig::default()
            },
            templates: TemplateConfig {
                root: self.root.clone(),
            },
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ---------------------------------------------------------------------------
// Built-in collaborators
// ---------------------------------------------------------------------------

fn builtin_catalog(key: &str) -> io::Result<Vec<u8>> {
    let messages = match key.rsplit('/').next() {
        Some("en.all.json") => json!({
            "greeting": "Hello {{.name}}",
            "guest": "guest",
            "welcome": "Welcome back, {{.name}}",
            "results": {
                "one": "{{.Count}} customer matches \"{{.query}}\"",
                "other": "{{.Count}} customers match \"{{.query}}\"",
            },
            "footer": "You are viewing {{.request_uri}}",
            "balance": "Balance: {{.amount}}",
        }),
        Some("de.all.json") => json!({
            "greeting": "Hallo {{.name}}",
            "guest": "Gast",
            "welcome": "Willkommen zurück, {{.name}}",
            "results": {
                "one": "{{.Count}} Kunde passt zu \"{{.query}}\"",
                "other": "{{.Count}} Kunden passen zu \"{{.query}}\"",
            },
            "footer": "Sie sehen {{.request_uri}}",
            "balance": "Guthaben: {{.amount}}",
        }),
        _ => return Err(io::Error::new(io::ErrorKind::NotFound, key.to_string())),
    };
    Ok(messages.to_string().into_bytes())
}

/// Lists every safe entry of the render data; enough to see the pipeline work.
struct PlaceholderEngine {
    static_paths: StaticPaths,
}

impl TemplateEngine for PlaceholderEngine {
    fn render(&self, template: &str, data: &RenderData) -> Result<String, TemplateRenderError> {
        let mut html = format!(
            "<!doctype html><html><head><title>{template}</title><link rel=\"stylesheet\" href=\"{}\"></head><body><dl>",
            self.static_paths.path("css/site.css")
        );
        for (key, value) in data {
            match value {
                RenderValue::Safe(markup) => html.push_str(&format!("<dt>{key}</dt><dd>{markup}</dd>")),
                RenderValue::SafeData(value) => {
                    html.push_str(&format!("<dt>{key}</dt><dd><code>{value}</code></dd>"));
                }
                RenderValue::Raw(_) | RenderValue::Deferred(_) | RenderValue::Data(_) => {
                    return Err(TemplateRenderError::Execution(format!("{key} was not sanitized")));
                }
                RenderValue::Translator(_) => {}
            }
        }
        html.push_str("</dl></body></html>");
        Ok(html)
    }
}

/// Points needed for the next loyalty tier.
const TIER_POINTS: f64 = 1000.0;

/// Fixed customer directory backing search and enrichment.
struct Directory {
    customers: BTreeMap<i64, CustomerRecord>,
}

impl Directory {
    fn demo() -> Self {
        let customers = [(1, "C-001", "Ana", "Lima"), (2, "C-002", "Bruno", "Diaz"), (3, "C-003", "Ana", "Berg")]
            .into_iter()
            .map(|(id, code, first, last)| {
                let record = CustomerRecord {
                    id,
                    entity_code: code.to_string(),
                    first_name: first.to_string(),
                    last_name: last.to_string(),
                    email: format!("{}@example.com", first.to_lowercase()),
                    ..CustomerRecord::default()
                };
                (id, record)
            })
            .collect();
        Self { customers }
    }

    fn search(&self, query: &str) -> Vec<CustomerSummary> {
        let needle = query.to_lowercase();
        self.customers
            .values()
            .filter(|c| format!("{} {}", c.first_name, c.last_name).to_lowercase().contains(&needle))
            .map(|c| CustomerSummary {
                id: c.id,
                entity_code: c.entity_code.clone(),
                name: format!("{} {}", c.first_name, c.last_name),
                email: c.email.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl CustomerSource for Directory {
    async fn load_customer(&self, identity: &ProfileIdentity) -> anyhow::Result<CustomerScope> {
        let record = self
            .customers
            .get(&identity.customer_id)
            .filter(|r| r.entity_code == identity.entity_code)
            .cloned()
            .with_context(|| format!("no customer {}", identity.customer_id))?;
        Ok(CustomerScope {
            wallet: Some(Wallet {
                points: record.id * 100,
                balance: 12.5,
            }),
            vouchers: vec![Voucher {
                code: format!("WELCOME-{}", record.id),
                value: 5.0,
                active: true,
            }],
            record: Some(record),
            promotions: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn args(value: serde_json::Value) -> TranslationArgs {
    match value {
        serde_json::Value::Object(map) => map,
        _ => TranslationArgs::new(),
    }
}

async fn home(ctx: ContextHandle) -> Result<Page, ContextError> {
    ctx.with(|bundle| {
        let name = if bundle.session.is_authenticated() {
            bundle.session.username.clone()
        } else {
            bundle.data.t("guest", &[])?
        };
        let greeting = bundle.data.t("greeting", &[args(json!({ "name": name }))])?;
        let footer = bundle.data.t_deferred("footer", &[])?;
        bundle.data.insert("greeting", greeting);
        bundle.data.insert("flashes", bundle.session.flashes.join(" / "));
        bundle.data.insert("footer", footer);
        Ok::<_, ContextError>(())
    })?;
    Ok(Page::new("home"))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search(
    State(directory): State<Arc<Directory>>,
    Query(params): Query<SearchParams>,
    ctx: ContextHandle,
) -> Result<Page, ContextError> {
    if !params.q.is_empty() {
        ctx.set_search_scope(SearchScope::new(params.q.clone(), directory.search(&params.q)));
    }
    ctx.with(|bundle| {
        let count = bundle.search.results.len();
        let summary = bundle.data.t(
            "results",
            &[args(json!({ "Count": count, "query": bundle.search.query }))],
        )?;
        bundle.data.insert("summary", summary);
        bundle.data.insert("results", json!(bundle.search.results));
        Ok::<_, ContextError>(())
    })?;
    Ok(Page::new("search"))
}

#[derive(Debug, Deserialize)]
struct LoginParams {
    user: String,
}

async fn login(Query(params): Query<LoginParams>, ctx: ContextHandle) -> Result<Redirect, ContextError> {
    ctx.with(|bundle| {
        let welcome = bundle.data.t("welcome", &[args(json!({ "name": params.user }))])?;
        bundle.session.id = 1;
        bundle.session.username = params.user;
        bundle.session.add_flash(welcome);
        Ok::<_, ContextError>(())
    })?;
    Ok(Redirect::to("/"))
}

async fn customer(
    State(directory): State<Arc<Directory>>,
    Path(id): Path<i64>,
    ctx: ContextHandle,
) -> Result<Page, ContextError> {
    let entity_code = directory
        .customers
        .get(&id)
        .map(|r| r.entity_code.clone())
        .unwrap_or_default();
    ctx.with(|bundle| bundle.profile.identity = ProfileIdentity::new(id, entity_code));
    ctx.enrich_customer(directory.as_ref()).await?;

    ctx.with(|bundle| {
        let balance = bundle.customer.wallet.as_ref().map_or(0.0, |w| w.balance);
        let line = bundle.data.t("balance", &[args(json!({ "amount": format_money(balance) }))])?;
        let vouchers: Vec<_> = bundle
            .customer
            .vouchers
            .iter()
            .map(|v| json!({ "code": v.code, "class": voucher_class(v.active) }))
            .collect();
        if let Some(record) = &bundle.customer.record {
            bundle.data.insert("name", format!("{} {}", record.first_name, record.last_name));
            bundle.data.insert("initial", first_letter(&record.first_name));
            let newsletter = is_checked(bundle.profile.form.value("newsletter"), "yes") || record.opted_in;
            bundle.data.insert("newsletter", newsletter);
        }
        if let Some(wallet) = &bundle.customer.wallet {
            let points = i32::try_from(wallet.points).map_or(f64::from(i32::MAX), f64::from);
            let progress = percentage(points, TIER_POINTS).min(100.0);
            bundle.data.insert("tier_progress", format!("{progress:.0}%"));
        }
        bundle.data.insert("balance", line);
        bundle.data.insert("vouchers", json!(vouchers));
        Ok::<_, ContextError>(())
    })?;
    Ok(Page::new("customer"))
}

fn routes(context: RequestContext) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/search", get(search))
        .route("/login", get(login))
        .route("/customer/{id}", get(customer))
        .with_state(Arc::new(Directory::demo()))
        .layer(RequestContextLayer::new(context))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    let config = cli.app_config();

    let i18n = match &cli.i18n_dir {
        Some(dir) => I18n::load(&config.i18n, &AssetCatalogLoader::from_dir(dir, &config.i18n.resources_path)),
        None => I18n::load(
            &config.i18n,
            &AssetCatalogLoader::from_fn(&config.i18n.resources_path, builtin_catalog),
        ),
    }
    .context("loading translations")?;
    info!(locales = ?i18n.locales(), "translations ready");

    let session = Arc::new(config.session);
    let store = Arc::new(CookieSessionStore::new(&session.secret, session.max_age));
    let engine = PlaceholderEngine {
        static_paths: StaticPaths::new(&config.templates),
    };
    let context = RequestContext::new(SessionPersistence::new(store, session), Arc::new(i18n), Arc::new(engine));

    let x_request_id = HeaderName::from_static("x-request-id");
    let app = routes(context).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        );

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cli.host, cli.port))?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        let config = AppConfig {
            session: SessionConfig {
                secret: Secret::new("demo-test"),
                ..SessionConfig::default()
            },
            ..AppConfig::default()
        };
        let i18n = I18n::load(
            &config.i18n,
            &AssetCatalogLoader::from_fn(&config.i18n.resources_path, builtin_catalog),
        )
        .unwrap();
        let session = Arc::new(config.session);
        let store = Arc::new(CookieSessionStore::new(&session.secret, None));
        let engine = PlaceholderEngine {
            static_paths: StaticPaths::at(&config.templates, 7),
        };
        routes(RequestContext::new(
            SessionPersistence::new(store, session),
            Arc::new(i18n),
            Arc::new(engine),
        ))
    }

    async fn get_body(uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn customer_page_uses_render_helpers() {
        let (status, body) = get_body("/customer/1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<dt>initial</dt><dd>A</dd>"), "{body}");
        assert!(body.contains("<dt>tier_progress</dt><dd>10%</dd>"), "{body}");
        assert!(body.contains("<dt>newsletter</dt><dd><code>false</code></dd>"), "{body}");
        assert!(body.contains("<dt>balance</dt><dd>Balance: 12.50</dd>"), "{body}");
        assert!(body.contains("a-active-voucher"), "{body}");
    }

    #[tokio::test]
    async fn search_results_render_escaped() {
        let (status, body) = get_body("/search?q=ana").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("2 customers match &#34;ana&#34;"), "{body}");
        assert!(body.contains(r#""name":"Ana Lima""#), "{body}");
    }
}
