//! Queue Simulator CLI Tool
//!
//! Drives the queue manager with a simulated clock so counter rosters and
//! capacity limits can be tried out without waiting in real time.
//!
//! Usage:
//!   cargo run --bin queue-sim -- --help
//!   cargo run --bin queue-sim simulate --visitors 30 --arrival-every 2 --seed 7
//!   cargo run --bin queue-sim simulate --config walkin.toml --minutes 240
//!   cargo run --bin queue-sim estimate --waiting 10 --staff 2
//!   cargo run --bin queue-sim roster --config walkin.toml

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use walkin_queue::config::AppConfig;
use walkin_queue::engine::AssignmentEngine;
use walkin_queue::events::NoopEventPublisher;
use walkin_queue::store::InMemoryQueueStore;
use walkin_queue::wait_time::fallback_minutes;
use walkin_queue::{CheckInRequest, QueueError, QueueManager, ServiceRequest};

#[derive(Parser)]
#[command(name = "queue-sim")]
#[command(about = "Simulate a walk-in queue against a counter roster")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults and environment otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated day minute by minute
    Simulate {
        /// Visitors arriving over the run
        #[arg(short, long, default_value = "20")]
        visitors: usize,
        /// Minutes between arrivals
        #[arg(short, long, default_value = "3")]
        arrival_every: i64,
        /// Simulated minutes to run
        #[arg(short, long, default_value = "180")]
        minutes: i64,
        /// Seed for service choice and durations
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
    /// Print the fallback estimate for a queue length
    Estimate {
        #[arg(short, long)]
        waiting: usize,
        #[arg(short, long)]
        staff: usize,
    },
    /// Show the counter roster
    Roster,
}

fn load_config(path: &Option<PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::from_env(),
    }
}

async fn simulate(
    config: AppConfig,
    visitors: usize,
    arrival_every: i64,
    minutes: i64,
    seed: u64,
) -> Result<()> {
    let roster = config.counter_roster()?;
    let classes: Vec<String> = roster
        .service_classes()
        .into_iter()
        .map(str::to_string)
        .collect();

    let manager = QueueManager::new(
        Arc::new(InMemoryQueueStore::new()),
        AssignmentEngine::new(roster),
        Arc::new(NoopEventPublisher),
        config.queue_settings(),
    )?;

    let mut rng = StdRng::seed_from_u64(seed);
    let start = Utc::now();
    let mut arrived = 0;

    println!(
        "Simulating {} visitors over {} minutes ({} counters)",
        visitors,
        minutes,
        manager.roster().len()
    );

    for minute in 0..=minutes {
        let now = start + Duration::minutes(minute);

        if arrived < visitors && minute % arrival_every.max(1) == 0 {
            arrived += 1;
            let class = classes.choose(&mut rng).cloned().unwrap_or_default();
            let request = CheckInRequest {
                name: format!("Visitor {}", arrived),
                phone: format!("555-{:04}", arrived),
                requested_services: vec![ServiceRequest::new(
                    class.clone(),
                    class,
                    rng.gen_range(5..=25),
                )],
            };

            match manager.check_in_at(request, now).await {
                Ok(entry) => println!("[{:>4}m] {} checked in", minute, entry.ticket_number),
                Err(e) => match e.downcast_ref::<QueueError>() {
                    Some(QueueError::QueueFull { .. }) => {
                        println!("[{:>4}m] turned away: {}", minute, e)
                    }
                    _ => return Err(e),
                },
            }
        }

        let outcome = manager.run_tick(now).await?;
        for entry in &outcome.newly_serviced {
            println!("[{:>4}m] {} serviced", minute, entry.ticket_number);
        }
        for assignment in &outcome.assignments {
            println!(
                "[{:>4}m] {} -> {} (until {})",
                minute,
                assignment.ticket_number,
                assignment.counter,
                assignment.estimated_completion_time.format("%H:%M")
            );
        }
    }

    let stats = manager.get_stats().await?;
    println!();
    println!("Check-ins:    {}", stats.check_ins);
    println!("Turned away:  {}", stats.rejected_check_ins);
    println!("Assignments:  {}", stats.assignments_made);
    println!("Serviced:     {}", stats.visitors_serviced);
    println!("Still waiting: {}", stats.waiting);
    println!("In service:   {}", stats.in_service);
    println!("Unroutable:   {}", stats.unroutable);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Simulate {
            visitors,
            arrival_every,
            minutes,
            seed,
        } => simulate(config, visitors, arrival_every, minutes, seed).await?,
        Commands::Estimate { waiting, staff } => {
            let base = config.estimator_config().base_service_minutes_per_person;
            let minutes = fallback_minutes(waiting, staff, base);
            println!(
                "{} waiting x {} min / {} staff = ~{} minutes",
                waiting, base, staff, minutes
            );
        }
        Commands::Roster => {
            let roster = config.counter_roster()?;
            for counter in roster.counters() {
                let classes: Vec<&str> =
                    counter.service_classes.iter().map(String::as_str).collect();
                println!("{:<12} {}", counter.name, classes.join(", "));
            }
        }
    }

    Ok(())
}
