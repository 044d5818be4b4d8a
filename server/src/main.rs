#[macro_use]
extern crate rocket;

mod entrypoints;

use std::sync::{atomic::AtomicBool, Arc};

use rocket_prometheus::PrometheusMetrics;
use shared::telegram::TelegramSubscriber;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use vibe_community_server::{
    db, github_pull, github_pull::GithubClient, health_monitor::HealthMonitor, settings::Env,
    summary::Summarizer, weekly_stats,
};

#[launch]
async fn rocket() -> _ {
    dotenv::dotenv().ok();

    let env = envy::from_env::<Env>().expect("Failed to load environment variables");
    let settings = env.settings().expect("Invalid configuration");

    let telegram = match (env.telegram_token.clone(), env.telegram_chat_id.clone()) {
        (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
            TelegramSubscriber::new(token, chat_id).await
        }
        _ => TelegramSubscriber::disabled(),
    };

    let subscriber = tracing_subscriber::registry()
        .with(telegram.clone())
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let github_client =
        GithubClient::new(env.github_token.clone()).expect("Failed to create GitHub client");
    let summarizer = Summarizer::new(env.gemini_api_key.clone(), env.gemini_model());
    if !summarizer.is_enabled() {
        tracing::info!("GEMINI_API_KEY is not set, commit summaries are disabled");
    }
    let health_monitor = HealthMonitor::new(env.poll_interval() * 3);

    let atomic_bool = Arc::new(AtomicBool::new(true));
    let atomic_bool_clone = atomic_bool.clone();

    let cors = rocket_cors::CorsOptions::default()
        .to_cors()
        .expect("Failed to create CORS fairing");
    let prometheus = PrometheusMetrics::new();

    let span = tracing::info_span!("Starting Rocket");
    let _enter = span.enter();

    rocket::build()
        .attach(db::stage())
        .manage(Arc::new(telegram))
        .manage(Arc::new(settings))
        .manage(Arc::new(summarizer))
        .manage(Arc::new(health_monitor))
        .attach(github_pull::stage(
            github_client,
            env.poll_interval(),
            atomic_bool.clone(),
        ))
        .attach(weekly_stats::stage(env.weekly_stats_interval(), atomic_bool))
        .attach(rocket::fairing::AdHoc::on_shutdown(
            "Stop background jobs",
            |_| {
                Box::pin(async move {
                    atomic_bool_clone.store(false, std::sync::atomic::Ordering::Relaxed);
                })
            },
        ))
        .attach(prometheus.clone())
        .attach(cors)
        .attach(entrypoints::stage())
        .mount("/metrics", prometheus)
        .mount(
            "/",
            SwaggerUi::new("/swagger-ui/<_..>")
                .url("/api-docs/openapi.json", entrypoints::ApiDoc::openapi()),
        )
}
