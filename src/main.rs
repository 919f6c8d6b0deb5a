use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payhook::cache::MemoryCache;
use payhook::config::Config;
use payhook::db::{DbPool, create_pool, init_db, queries};
use payhook::error::AppError;
use payhook::models::{Channel, CreateApp, CreateWebhook, User, WebhookEventSyncType};
use payhook::payments::{
    ListStoredPaymentMethodsRequest, PaymentMethodInitializeTokenizationRequest,
    PaymentMethodProcessTokenizationRequest, PaymentMethodTokenizationResponse,
    TokenizedPaymentFlow,
};
use payhook::webhooks::{HttpDispatcher, WebhookPlugin};

#[derive(Parser, Debug)]
#[command(name = "payhook")]
#[command(about = "Synchronous payment-app webhooks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a dev app with one webhook for every sync payment event
    Seed {
        /// Endpoint the webhook posts to
        #[arg(long)]
        url: String,

        #[arg(long, default_value = "dev.payments")]
        app_identifier: String,

        /// Signing secret for X-Webhook-Signature
        #[arg(long)]
        secret: Option<String>,

        /// Subscription query; the static payload shape is used without one
        #[arg(long)]
        subscription_query: Option<String>,
    },

    /// Start tokenizing a payment method with an app
    Tokenize {
        #[arg(long)]
        app_identifier: String,

        #[command(flatten)]
        customer: CustomerArgs,

        /// JSON passed through to the app
        #[arg(long)]
        data: Option<String>,
    },

    /// Continue a tokenization that required additional action
    Process {
        /// Payment method id returned by `tokenize`
        #[arg(long)]
        id: String,

        #[command(flatten)]
        customer: CustomerArgs,

        /// JSON passed through to the app
        #[arg(long)]
        data: Option<String>,
    },

    /// List the customer's stored payment methods across apps
    ListPaymentMethods {
        #[command(flatten)]
        customer: CustomerArgs,
    },

    /// Show recorded event deliveries, newest first
    Deliveries {
        /// Only this event type (e.g. payment_method_initialize_tokenization_session)
        #[arg(long)]
        event: Option<WebhookEventSyncType>,

        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Delete deliveries older than DELIVERY_RETENTION_DAYS
    PurgeDeliveries,
}

#[derive(Args, Debug)]
struct CustomerArgs {
    #[arg(long, default_value_t = 1)]
    user_id: i64,

    #[arg(long, default_value = "customer@payhook.local")]
    email: String,

    #[arg(long, default_value = "default-channel")]
    channel: String,

    #[arg(long, default_value = "USD")]
    currency: String,
}

impl CustomerArgs {
    fn user(&self) -> User {
        User {
            id: self.user_id,
            email: self.email.clone(),
        }
    }

    fn channel(&self) -> Channel {
        Channel {
            id: 1,
            slug: self.channel.clone(),
            name: self.channel.clone(),
            currency_code: self.currency.to_uppercase(),
        }
    }
}

fn parse_data(data: Option<&str>) -> Option<Value> {
    data.map(|raw| {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            eprintln!("--data is not valid JSON: {}", e);
            std::process::exit(2);
        })
    })
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to render output: {}", e),
    }
}

fn seed_dev_app(
    pool: &DbPool,
    url: &str,
    app_identifier: &str,
    secret: Option<String>,
    subscription_query: Option<String>,
) {
    let conn = pool.get().expect("Failed to get db connection for seeding");

    if queries::get_app_by_identifier(&conn, app_identifier)
        .expect("Failed to look up app")
        .is_some()
    {
        tracing::info!("App {} already exists, skipping seed", app_identifier);
        return;
    }

    let app = queries::create_app(
        &conn,
        &CreateApp {
            identifier: app_identifier.to_string(),
            name: "Dev Payments App".to_string(),
        },
    )
    .expect("Failed to create dev app");

    let webhook = queries::create_webhook(
        &conn,
        &CreateWebhook {
            app_id: app.id,
            name: "Payment methods".to_string(),
            target_url: url.to_string(),
            secret_key: secret,
            subscription_query,
            events: vec![
                WebhookEventSyncType::ListStoredPaymentMethods,
                WebhookEventSyncType::PaymentMethodInitializeTokenizationSession,
                WebhookEventSyncType::PaymentMethodProcessTokenizationSession,
            ],
        },
    )
    .expect("Failed to create dev webhook");

    tracing::info!("============================================");
    tracing::info!("App: {} (id: {})", app.identifier, app.id);
    tracing::info!("Webhook: {} -> {}", webhook.id, webhook.target_url);
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payhook=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let plugin = WebhookPlugin::with_config(
        pool.clone(),
        HttpDispatcher::new(),
        MemoryCache::new(),
        &config,
    );

    let outcome = match cli.command {
        Command::Seed {
            url,
            app_identifier,
            secret,
            subscription_query,
        } => {
            seed_dev_app(&pool, &url, &app_identifier, secret, subscription_query);
            Ok(())
        }
        Command::Tokenize {
            app_identifier,
            customer,
            data,
        } => {
            let request = PaymentMethodInitializeTokenizationRequest {
                user: customer.user(),
                app_identifier,
                channel: customer.channel(),
                data: parse_data(data.as_deref()),
                payment_flow_to_support: TokenizedPaymentFlow::Interactive,
            };
            plugin
                .payment_method_initialize_tokenization(&request, not_handled())
                .await
                .map(|response| print_json(&response))
        }
        Command::Process { id, customer, data } => {
            let request = PaymentMethodProcessTokenizationRequest {
                user: customer.user(),
                id,
                channel: customer.channel(),
                data: parse_data(data.as_deref()),
            };
            plugin
                .payment_method_process_tokenization(&request, not_handled())
                .await
                .map(|response| print_json(&response))
        }
        Command::ListPaymentMethods { customer } => {
            let request = ListStoredPaymentMethodsRequest {
                user: customer.user(),
                channel: customer.channel(),
            };
            plugin
                .list_stored_payment_methods(&request, Vec::new())
                .await
                .map(|methods| print_json(&methods))
        }
        Command::Deliveries { event, limit } => pool
            .get()
            .map_err(AppError::from)
            .and_then(|conn| queries::list_event_deliveries(&conn, event, limit))
            .map(|deliveries| print_json(&deliveries)),
        Command::PurgeDeliveries => pool
            .get()
            .map_err(AppError::from)
            .and_then(|conn| {
                queries::purge_old_event_deliveries(&conn, config.delivery_retention_days)
            })
            .map(|deleted| {
                tracing::info!(
                    "Purged {} event deliveries older than {} days",
                    deleted,
                    config.delivery_retention_days
                );
            }),
    };

    if let Err(e) = outcome {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

/// Fallback printed when no app handled the request.
fn not_handled() -> PaymentMethodTokenizationResponse {
    PaymentMethodTokenizationResponse::failed_to_tokenize(Some(
        "No app handled the request.".to_string(),
    ))
}
