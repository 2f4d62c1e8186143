use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reliefnet::alerts::{AlertSettings, nearby_alerts};
use reliefnet::assistant::{Assistant, ChatReply};
use reliefnet::config::Config;
use reliefnet::db::Db;
use reliefnet::db::models::{NewDonation, NewReport};
use reliefnet::generator::gemini::GeminiGenerator;
use reliefnet::generator::mock::MockGenerator;
use reliefnet::generator::{ChatTurn, TextGenerator};
use reliefnet::geo::Coordinate;
use reliefnet::translation::Language;
use reliefnet::translation::cache::TranslationCache;
use reliefnet::translation::store::JsonFileStore;
use reliefnet::weather::WeatherClient;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Disaster-relief coordination from the command line
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Use the offline mock generator instead of the Gemini API
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List verified reports near a position, nearest first
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Override the configured radius
        #[arg(long)]
        radius_km: Option<f64>,
        /// Include pending and rejected reports
        #[arg(long)]
        include_unverified: bool,
    },
    /// Translate UI strings into a language, filling the cache
    Translate {
        /// Target language code (en, kn, hi)
        #[arg(short, long)]
        lang: Language,
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// File a new incident report
    Report {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        location: String,
        #[arg(long, allow_hyphen_values = true, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lng: Option<f64>,
        #[arg(long, default_value = "u1")]
        user: String,
    },
    /// Record a donation
    Donate {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "Bangalore Flood Relief")]
        campaign: String,
        #[arg(long)]
        user: Option<String>,
    },
    /// Show report and donation totals
    Stats,
    /// Ask the safety assistant a question
    Chat { message: String },
    /// Current weather for a city and verified incidents reported there
    Weather { city: String },
    /// Insert demo data into an empty database
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    match cli.command {
        Command::Nearby {
            lat,
            lng,
            radius_km,
            include_unverified,
        } => {
            let db = open_db(&config)?;
            let origin = Coordinate::new(lat, lng)?;
            let mut settings = AlertSettings::from(&config.alerts);
            if let Some(radius_km) = radius_km {
                settings.radius_km = radius_km;
            }
            if include_unverified {
                settings.require_verified = false;
            }

            let alerts = nearby_alerts(&db, &origin, &settings)?;
            if alerts.is_empty() {
                println!("No alerts within {} km", settings.radius_km);
            }
            for (report, distance) in alerts {
                println!(
                    "{:>6.2} km  [{}] {} ({})",
                    distance, report.status, report.title, report.location
                );
            }
        }
        Command::Translate { lang, texts } => {
            if cli.offline {
                translate(&config, MockGenerator::new(), lang, &texts).await?;
            } else {
                let generator = GeminiGenerator::new(&config.generation)?;
                translate(&config, generator, lang, &texts).await?;
            }
        }
        Command::Report {
            title,
            description,
            location,
            lat,
            lng,
            user,
        } => {
            let mut db = open_db(&config)?;
            let coordinates = match lat.zip(lng) {
                Some((lat, lng)) => Some(Coordinate::new(lat, lng)?),
                None => None,
            };
            let (user_name, user_email) = match db.get_user(&user)? {
                Some(u) => (u.name, u.email),
                None => {
                    warn!("Unknown user {user}, filing anonymously");
                    ("Anonymous".to_string(), String::new())
                }
            };
            let report = db
                .add_report(&NewReport {
                    user_id: &user,
                    user_name: &user_name,
                    user_email: &user_email,
                    title: &title,
                    description: &description,
                    location: &location,
                    coordinates,
                    image_url: "",
                })
                .context("failed to save report")?;
            println!("Filed report {} (pending review)", report.id);
        }
        Command::Donate {
            name,
            email,
            amount,
            campaign,
            user,
        } => {
            anyhow::ensure!(
                amount.is_finite() && amount > 0.0,
                "amount must be positive"
            );
            let mut db = open_db(&config)?;
            let donation = db
                .add_donation(&NewDonation {
                    user_id: user.as_deref(),
                    donor_name: &name,
                    user_email: &email,
                    amount,
                    campaign: &campaign,
                })
                .context("failed to save donation")?;
            println!(
                "Recorded donation {} of ₹{:.2} to {}",
                donation.id, donation.amount, donation.campaign
            );
        }
        Command::Stats => {
            let db = open_db(&config)?;
            let stats = db.stats().context("failed to compute stats")?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Chat { message } => {
            let reply = if cli.offline {
                chat(MockGenerator::new(), &message).await
            } else {
                chat(GeminiGenerator::new(&config.generation)?, &message).await
            };
            println!("{}", reply.message());
        }
        Command::Weather { city } => {
            let client = WeatherClient::new()?;
            let report = client
                .current(&city)
                .await
                .with_context(|| format!("failed to fetch weather for {city}"))?;
            println!(
                "{}: {:.1}°C, wind {:.1} km/h, {}",
                report.city, report.temperature, report.wind_speed, report.condition
            );

            let db = open_db(&config)?;
            let incidents = db
                .search_verified_reports(&city)
                .context("failed to search reports")?;
            if incidents.is_empty() {
                println!("No verified incidents in this area");
            } else {
                println!("Incidents in this area:");
            }
            for incident in incidents {
                println!("  {} ({}), {} upvotes", incident.title, incident.location, incident.upvotes);
            }
        }
        Command::Seed => {
            let mut db = open_db(&config)?;
            if db.seed_if_empty().context("failed to seed database")? {
                println!("Seeded demo data into {}", config.db_path);
            } else {
                println!("Database already has data; nothing to do");
            }
        }
    }

    Ok(())
}

fn open_db(config: &Config) -> Result<Db> {
    Db::open(&config.db_path).context("Failed to open database")
}

async fn translate<G: TextGenerator + 'static>(
    config: &Config,
    generator: G,
    lang: Language,
    texts: &[String],
) -> Result<()> {
    let store = JsonFileStore::new(config.translation_cache_path());
    let cache = TranslationCache::new(generator, store, config.translation_settings());

    for text in texts {
        cache.translate(text, lang);
    }
    let outcome = cache.settled(lang).await;
    info!("Translation lane settled: {:?}", outcome);

    for text in texts {
        println!("{} => {}", text, cache.get_cached(text, lang));
    }
    Ok(())
}

async fn chat<G: TextGenerator>(generator: G, message: &str) -> ChatReply {
    let greeting = ChatTurn::model("Hello! I'm the ReliefNet assistant. How can I help you stay safe?");
    Assistant::new(generator).reply(&[greeting], message).await
}
