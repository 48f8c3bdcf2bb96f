mod briefing;
mod config;
mod db;
mod enrich;
mod error;
mod kiosk;
mod models;
mod narrate;
mod routes;

use std::io::Write as _;
use std::path::Path;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::Parser;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::{AppState, DayReport};
use crate::narrate::{AnthropicNarrator, Narrator};

/// Daily dental appointment data tool.
///
/// Default mode prints the day's schedule as JSON. --briefing generates the
/// AI staff briefing and saves it to a dated file. --serve runs the
/// dashboard and kiosk web server.
#[derive(Debug, Parser)]
#[command(name = "dental-briefing-server", about = "Daily dental appointment data tool.")]
struct Cli {
    /// Date to fetch data for (default: today).
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<String>,

    /// Generate the AI briefing (requires ANTHROPIC_API_KEY).
    #[arg(long)]
    briefing: bool,

    /// Run the dashboard and kiosk web server.
    #[arg(long, conflicts_with_all = ["briefing", "date"])]
    serve: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    if cli.serve {
        return serve(cfg).await;
    }

    let target_date = match cli.date.as_deref() {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("--date must be YYYY-MM-DD, got '{s}'"))?,
        None => Local::now().date_naive(),
    };

    // Briefing mode needs the narration key; fail before touching the
    // database rather than partway through.
    let api_key = if cli.briefing {
        Some(cfg.require_narration_key()?.to_string())
    } else {
        None
    };

    let pool = db::connect(&cfg.db).await?;
    tracing::info!("Fetching appointments for {target_date}");
    let data = db::fetch_day_schedule(&pool, target_date).await?;

    let Some(api_key) = api_key else {
        let report = DayReport::new(target_date, data);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    };

    let schedule = enrich::enrich_schedule(&data, target_date);
    let narration_input = briefing::format_for_narration(&schedule, target_date);

    print_header(target_date, schedule.appointments.len());

    let narrator = AnthropicNarrator::new(api_key, cfg.anthropic_model.clone());
    println!();
    let mut to_terminal = |chunk: &str| {
        print!("{chunk}");
        let _ = std::io::stdout().flush();
    };
    let text = narrator
        .narrate(briefing::SYSTEM_PROMPT, &narration_input, &mut to_terminal)
        .await?;
    println!();

    let saved = briefing::save_briefing(&cfg.briefing_dir, target_date, &text)?;
    tracing::info!("Briefing saved to {}", saved.display());
    print_footer(&saved);
    Ok(())
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    let pool = db::connect(&cfg.db).await?;

    let state = AppState {
        db: pool,
        image_root: cfg.image_root.clone(),
    };

    // Allow browser clients (dashboard and kiosk frontends) to call the API.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn print_header(date: NaiveDate, appointment_count: usize) {
    println!("{}", "=".repeat(60));
    println!("  DAILY DENTAL BRIEFING (AI)");
    println!("  Date     : {}", date.format("%A, %B %d, %Y"));
    println!("  Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("{}", "=".repeat(60));
    println!("  Appointments: {appointment_count}");
}

fn print_footer(saved_to: &Path) {
    println!("\n{}", "-".repeat(60));
    println!("  Saved to: {}", saved_to.display());
    println!("{}\n", "-".repeat(60));
}
