use anyhow::{bail, Context, Result};
use chrono::{TimeDelta, Utc};
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use st_core::configuration::{AgentConfiguration, TradingConfig};
use st_core::fleet_runner::{run_fleet, TradeRoute};
use st_core::{format_and_sort_collection, format_time_delta_hh_mm_ss};
use st_core::market_tracker::{InMemoryMarketObservationSink, MarketTracker};
use st_core::reqwest_helpers::{create_client, RetrySettings};
use st_core::st_client::{StClient, StClientTrait};
use st_core::trading_run::{TradeTarget, TradingRunner};
use st_domain::{best_good_to_buy, compare_markets, LocationRegistry, LocationSymbol, Ship, ShipClass, ShipId, SystemSymbol, TradingRunEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thousands::Separable;
use time::format_description;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{event, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, registry::Registry, EnvFilter};

/// SpaceTraders trading CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Json file with the locations of the game. Loaded from the game when omitted.
    #[arg(long, env = "SPACETRADERS_LOCATIONS_FILE")]
    locations_file: Option<PathBuf>,

    /// System whose locations are loaded from the game
    #[arg(long, default_value = "OE")]
    system: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    #[arg(long, env = "SPACETRADERS_USERNAME")]
    username: String,

    #[arg(long, env = "SPACETRADERS_TOKEN", hide_env_values = true)]
    token: String,

    #[arg(long, env = "SPACETRADERS_BASE_URL", default_value = st_core::configuration::DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    #[arg(long, default_value_t = 10)]
    retry_backoff_secs: u64,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Game status, credits and ships
    Status,
    /// Ships of the user
    Ships,
    /// Ship types for sale and where to buy them
    AvailableShips {
        /// e.g. MK-I
        #[arg(long)]
        class: Option<String>,
    },
    BuyShip {
        #[arg(long)]
        location: String,
        /// e.g. JW-MK-I
        #[arg(long)]
        ship_type: String,
    },
    /// Scraps a ship docked at a shipyard
    ScrapShip {
        #[arg(long)]
        ship_id: String,
    },
    RequestLoan {
        #[arg(long, default_value = "STARTUP")]
        loan_type: String,
    },
    /// Compares the goods of two markets
    Compare {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// One trading run with a single ship
    Trade {
        #[arg(long)]
        ship_id: String,
        /// Sell at this location
        #[arg(long, conflicts_with = "candidates")]
        destination: Option<String>,
        /// Sell at the most profitable of these locations
        #[arg(long, value_delimiter = ',')]
        candidates: Vec<String>,
        #[arg(long, default_value_t = 20)]
        fuel_reserve: u32,
    },
    /// Repeated trading runs with several ships
    Fleet {
        #[arg(long, value_delimiter = ',', required = true)]
        ship_ids: Vec<String>,
        /// Shuttle between two locations
        #[arg(long, value_delimiter = ',', num_args = 2, conflicts_with = "candidates")]
        between: Vec<String>,
        /// Sell at the most profitable of these locations
        #[arg(long, value_delimiter = ',')]
        candidates: Vec<String>,
        #[arg(long, default_value_t = 10)]
        runs: u32,
        #[arg(long, default_value_t = 2)]
        stagger_secs: u64,
    },
    /// Records market observations
    Track {
        #[arg(long, value_delimiter = ',', required = true)]
        locations: Vec<String>,
        /// Observe once when omitted
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = setup_tracing()?;
    let cli = Cli::parse();

    let cfg = agent_configuration(&cli.connection);
    let http_client = create_client(Some(cfg.spacetraders_token.clone()), cfg.retry_settings)?;
    let client: Arc<dyn StClientTrait> = Arc::new(StClient::new(http_client, &cfg.spacetraders_base_url, &cfg.spacetraders_username));

    let cancellation_token = CancellationToken::new();
    let ctrl_c_token = cancellation_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            event!(Level::WARN, "ctrl-c received, stopping");
            ctrl_c_token.cancel();
        }
    });

    match cli.command.clone() {
        Command::Status => print_status(client.as_ref()).await,
        Command::Ships => {
            let ships = client.get_ships().await.context("fetching the ships")?.ships;
            println!("{}", ships_table(&ships));
            Ok(())
        }
        Command::AvailableShips { class } => {
            let class = class.as_deref().map(parse_ship_class).transpose()?;
            print_available_ships(client.as_ref(), class).await
        }
        Command::BuyShip { location, ship_type } => {
            let response = client.buy_ship(&symbol(&location), &ship_type).await?;
            println!(
                "bought {} ({}) at {}, credits now {}",
                response.ship.id,
                response.ship.ship_type,
                location,
                response.credits.separate_with_commas()
            );
            Ok(())
        }
        Command::ScrapShip { ship_id } => {
            let response = client.scrap_ship(&ShipId(ship_id)).await?;
            println!("{}", response.success);
            Ok(())
        }
        Command::RequestLoan { loan_type } => {
            let response = client.request_loan(&loan_type).await?;
            println!(
                "took a {} loan, {} due {}, credits now {}",
                response.loan.loan_type,
                response.loan.repayment_amount.separate_with_commas(),
                response.loan.due.map(|due| due.to_rfc3339()).unwrap_or_else(|| "-".to_string()),
                response.credits.separate_with_commas()
            );
            Ok(())
        }
        Command::Compare { from, to } => print_comparison(client.as_ref(), &symbol(&from), &symbol(&to)).await,
        Command::Trade {
            ship_id,
            destination,
            candidates,
            fuel_reserve,
        } => {
            let target = match destination {
                Some(destination) => TradeTarget::Destination(symbol(&destination)),
                None if !candidates.is_empty() => TradeTarget::BestOf(candidates.iter().map(|c| symbol(c)).collect()),
                None => bail!("either --destination or --candidates is required"),
            };
            let registry = load_registry(&cli, client.as_ref()).await?;
            let config = TradingConfig {
                fuel_reserve,
                ..TradingConfig::default()
            };
            let (runner, event_logger) = runner_with_event_logger(client.clone(), registry, config);

            let ship_id = ShipId(ship_id);
            let mut ship = runner.ship_operations(&ship_id).await?;
            let result = runner.run(&mut ship, &target, &cancellation_token).await;
            drop(runner);
            event_logger.await?;

            let report = result?;
            println!(
                "{} sold {} {} at {} for a net profit of {} (fuel {}), credits now {}",
                report.ship_id,
                report.quantity,
                report.good,
                report.destination,
                report.net_profit.separate_with_commas(),
                report.fuel_total.separate_with_commas(),
                report.credits.separate_with_commas()
            );
            Ok(())
        }
        Command::Fleet {
            ship_ids,
            between,
            candidates,
            runs,
            stagger_secs,
        } => {
            let route = match between.as_slice() {
                [first, second] => TradeRoute::Shuttle(symbol(first), symbol(second)),
                _ if !candidates.is_empty() => TradeRoute::BestOf(candidates.iter().map(|c| symbol(c)).collect()),
                _ => bail!("either --between or --candidates is required"),
            };
            let registry = load_registry(&cli, client.as_ref()).await?;
            let config = TradingConfig {
                stagger_delay: Duration::from_secs(stagger_secs),
                ..TradingConfig::fleet()
            };
            let (runner, event_logger) = runner_with_event_logger(client.clone(), registry, config);

            let ship_ids = ship_ids.iter().map(|id| ShipId(id.clone())).collect();
            let results = run_fleet(runner, ship_ids, runs, route, cancellation_token).await;
            event_logger.await?;

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .force_no_tty()
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["Ship", "Runs", "Profit", "Duration", "Profit/h", "Error"]);
            for (ship_id, result) in results {
                match result {
                    Ok(summary) => table.add_row(vec![
                        ship_id.to_string(),
                        summary.runs_completed.to_string(),
                        summary.total_profit.separate_with_commas(),
                        format_time_delta_hh_mm_ss(TimeDelta::seconds(summary.elapsed_secs as i64)),
                        summary.profit_per_hour.separate_with_commas(),
                        String::new(),
                    ]),
                    Err(err) => table.add_row(vec![
                        ship_id.to_string(),
                        String::new(),
                        String::new(),
                        String::new(),
                        String::new(),
                        err.to_string(),
                    ]),
                };
            }
            println!("{table}");
            Ok(())
        }
        Command::Track { locations, interval_secs } => {
            let locations = locations.iter().map(|l| symbol(l)).collect::<Vec<_>>();
            let sink = Arc::new(InMemoryMarketObservationSink::new());
            let tracker = MarketTracker::new(client.clone(), sink.clone());

            let stored = match interval_secs {
                Some(secs) => {
                    tracker
                        .track_periodically(&locations, Duration::from_secs(secs), &cancellation_token)
                        .await?
                }
                None => tracker.track_once(&locations).await?,
            };
            println!("stored {} market observations", stored.separate_with_commas());
            Ok(())
        }
    }
}

fn symbol(s: &str) -> LocationSymbol {
    LocationSymbol(s.trim().to_string())
}

fn agent_configuration(args: &ConnectionArgs) -> AgentConfiguration {
    AgentConfiguration {
        spacetraders_base_url: args.base_url.clone(),
        retry_settings: RetrySettings {
            max_retries: args.max_retries,
            backoff: Duration::from_secs(args.retry_backoff_secs),
        },
        ..AgentConfiguration::new(&args.username, &args.token)
    }
}

async fn load_registry(cli: &Cli, client: &dyn StClientTrait) -> Result<LocationRegistry> {
    let registry = match &cli.locations_file {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading locations from {}", path.display()))?;
            LocationRegistry::from_json(&json)?
        }
        None => {
            let response = client
                .get_system_locations(&SystemSymbol(cli.system.clone()))
                .await
                .with_context(|| format!("loading the locations of system {}", cli.system))?;
            LocationRegistry::new(response.locations)
        }
    };
    event!(Level::INFO, "loaded {} locations", registry.len());
    Ok(registry)
}

/// The logger task ends once the runner and all its clones are dropped.
fn runner_with_event_logger(
    client: Arc<dyn StClientTrait>,
    registry: LocationRegistry,
    config: TradingConfig,
) -> (TradingRunner, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<TradingRunEvent>(256);
    let runner = TradingRunner::new(client, Arc::new(registry), config).with_events(tx);

    let logger = tokio::spawn(async move {
        while let Some(run_event) = rx.recv().await {
            match run_event {
                TradingRunEvent::FlightProgress { .. } => event!(Level::DEBUG, "{:?}", run_event),
                TradingRunEvent::Completed(report) => event!(
                    Level::INFO,
                    "{}: run {} -> {} with {} {} done, net profit {}",
                    report.ship_id,
                    report.origin,
                    report.destination,
                    report.quantity,
                    report.good,
                    report.net_profit
                ),
                other => event!(Level::INFO, "{:?}", other),
            }
        }
    });

    (runner, logger)
}

async fn print_status(client: &dyn StClientTrait) -> Result<()> {
    let status = client.get_status().await.context("fetching the game status")?;
    let user = client.get_user().await.context("fetching the user")?.user;

    println!("{}", status.status);
    println!("{} has {} credits", user.username, user.credits.separate_with_commas());

    println!("{}", ships_table(&user.ships));

    if !user.loans.is_empty() {
        let mut loans_table = Table::new();
        loans_table
            .load_preset(UTF8_FULL)
            .force_no_tty()
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Loan", "Type", "Status", "Repayment", "Due"]);
        for loan in user.loans.iter() {
            loans_table.add_row(vec![
                loan.id.clone(),
                loan.loan_type.clone(),
                loan.status.clone(),
                loan.repayment_amount.separate_with_commas(),
                loan.due.map(|due| due.to_rfc3339()).unwrap_or_default(),
            ]);
        }
        println!("{loans_table}");
    }
    Ok(())
}

fn ships_table(ships: &[Ship]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .force_no_tty()
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Ship", "Type", "Location", "Fuel", "Cargo"]);
    for ship in ships.iter() {
        table.add_row(vec![
            ship.id.to_string(),
            ship.ship_type.clone(),
            ship.current_location().map(|l| l.to_string()).unwrap_or_else(|| "in transit".to_string()),
            ship.fuel_level().to_string(),
            format!("{}/{}", ship.used_volume(), ship.max_cargo),
        ]);
    }
    table
}

fn parse_ship_class(class: &str) -> Result<ShipClass> {
    match serde_json::from_value(serde_json::Value::String(class.to_uppercase()))? {
        ShipClass::Unknown => bail!("unknown ship class {class}, expected one of MK-I, MK-II, MK-III"),
        known => Ok(known),
    }
}

async fn print_available_ships(client: &dyn StClientTrait, class: Option<ShipClass>) -> Result<()> {
    let listings = client.get_available_ships(class).await.context("fetching the ships for sale")?.ships;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .force_no_tty()
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Type", "Class", "Cargo", "Speed", "Sold at"]);
    for listing in listings.iter() {
        let offers = listing
            .purchase_locations
            .iter()
            .map(|offer| format!("{} ({})", offer.location, offer.price.separate_with_commas()))
            .collect::<Vec<_>>();
        table.add_row(vec![
            listing.ship_type.clone(),
            listing.class.to_string(),
            listing.max_cargo.to_string(),
            listing.speed.to_string(),
            format_and_sort_collection(&offers),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn print_comparison(client: &dyn StClientTrait, from: &LocationSymbol, to: &LocationSymbol) -> Result<()> {
    let (from_response, to_response) = futures::try_join!(client.get_market(from), client.get_market(to))?;
    let now = Utc::now();
    let from_market = from_response.into_snapshot(now)?;
    let to_market = to_response.into_snapshot(now)?;

    let comparisons = compare_markets(&from_market, &to_market)?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .force_no_tty()
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Good", "Buy", "Sell", "Volume", "Available", "Profit", "Profit/Volume"]);
    for comparison in comparisons.iter() {
        table.add_row(vec![
            comparison.good.to_string(),
            comparison.purchase_price_per_unit.separate_with_commas(),
            comparison.sell_price_per_unit.separate_with_commas(),
            comparison.volume_per_unit.to_string(),
            comparison.quantity_available.separate_with_commas(),
            comparison.profit.separate_with_commas(),
            format!("{:.2}", comparison.profit_per_volume.0),
        ]);
    }
    println!("{} -> {}\n{table}", from, to);

    match best_good_to_buy(&from_market, &to_market) {
        Ok(best) => println!("best good: {} ({:.2} per volume)", best.good, best.profit_per_volume.0),
        Err(err) => println!("{err}"),
    }
    Ok(())
}

fn setup_tracing() -> Result<WorkerGuard> {
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "./logs/cli", "spaceTraders-cli.log.ndjson");
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

    let time_format = format_description::parse("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]Z").context("invalid time format")?;
    let timer = UtcTime::new(time_format);

    let console_layer = fmt::layer()
        .with_timer(timer.clone())
        .with_ansi(true)
        .with_target(true)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_timer(timer)
        .with_ansi(false)
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_writer(non_blocking_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
