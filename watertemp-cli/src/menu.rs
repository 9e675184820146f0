//! Interactive numbered menu.

use anyhow::{Context, Result};
use chrono::Local;
use inquire::InquireError;
use tracing::{info, warn};
use watertemp_core::{AgentConfig, AgentError, PollingAgent, SqliteStore};

use crate::clock;

const RECENT_LIMIT: u32 = 10;

const BANNER: &str = r#"
 __        __    _              _____
 \ \      / /_ _| |_ ___ _ __  |_   _|__ _ __ ___  _ __
  \ \ /\ / / _` | __/ _ \ '__|   | |/ _ \ '_ ` _ \| '_ \
   \ V  V / (_| | ||  __/ |      | |  __/ | | | | | |_) |
    \_/\_/ \__,_|\__\___|_|      |_|\___|_| |_| |_| .__/
                                                  |_|
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOption {
    TimeToMidnight,
    CurrentTime,
    FetchOnce,
    StartMonitoring,
    Exit,
    StopMonitoring,
    RecentReadings,
}

impl MenuOption {
    pub const fn all() -> &'static [MenuOption] {
        &[
            MenuOption::TimeToMidnight,
            MenuOption::CurrentTime,
            MenuOption::FetchOnce,
            MenuOption::StartMonitoring,
            MenuOption::Exit,
            MenuOption::StopMonitoring,
            MenuOption::RecentReadings,
        ]
    }

    pub fn number(&self) -> u32 {
        match self {
            MenuOption::TimeToMidnight => 1,
            MenuOption::CurrentTime => 2,
            MenuOption::FetchOnce => 3,
            MenuOption::StartMonitoring => 4,
            MenuOption::Exit => 5,
            MenuOption::StopMonitoring => 6,
            MenuOption::RecentReadings => 7,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MenuOption::TimeToMidnight => "How long is it until midnight?",
            MenuOption::CurrentTime => "What is the date and time right now?",
            MenuOption::FetchOnce => "Fetch the water temperature now",
            MenuOption::StartMonitoring => "Start water temperature monitoring",
            MenuOption::Exit => "Exit",
            MenuOption::StopMonitoring => "Stop water temperature monitoring",
            MenuOption::RecentReadings => "Show the latest stored readings",
        }
    }

    pub fn from_number(number: u32) -> Option<Self> {
        Self::all().iter().copied().find(|option| option.number() == number)
    }
}

/// What the user typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Choice {
    Selected(MenuOption),
    Unknown(u32),
    NotANumber,
}

pub fn parse_choice(input: &str) -> Choice {
    match input.trim().parse::<u32>() {
        Ok(number) => {
            MenuOption::from_number(number).map_or(Choice::Unknown(number), Choice::Selected)
        }
        Err(_) => Choice::NotANumber,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Menu {
    config: AgentConfig,
    agent: PollingAgent,
    store: SqliteStore,
}

impl Menu {
    pub fn new(config: AgentConfig) -> Self {
        let agent = PollingAgent::from_config(&config);
        let store = SqliteStore::from_config(&config);
        Self::with_parts(config, agent, store)
    }

    pub fn with_parts(config: AgentConfig, agent: PollingAgent, store: SqliteStore) -> Self {
        Self { config, agent, store }
    }

    pub async fn run(&self) -> Result<()> {
        println!("{BANNER}");
        info!("CLI started");

        if self.config.monitor_temperature {
            self.execute(MenuOption::StartMonitoring).await?;
        }

        loop {
            print_options();

            let Some(input) = prompt().await? else {
                self.execute(MenuOption::Exit).await?;
                return Ok(());
            };

            match parse_choice(&input) {
                Choice::Selected(option) => {
                    let flow = self.execute(option).await?;
                    info!(option = option.description(), "Executed menu option");
                    if flow == Flow::Exit {
                        return Ok(());
                    }
                }
                Choice::Unknown(_) => println!("Invalid choice, please try again."),
                Choice::NotANumber => println!("Invalid input, please select a number."),
            }
        }
    }

    pub async fn execute(&self, option: MenuOption) -> Result<Flow> {
        match option {
            MenuOption::TimeToMidnight => {
                let remaining = clock::until_midnight(&Local::now());
                println!("Time left until midnight: {}!", clock::format_remaining(remaining));
            }
            MenuOption::CurrentTime => {
                let now = Local::now();
                println!("The date and time right now is {}", now.format("%Y-%m-%d %H:%M:%S"));
            }
            MenuOption::FetchOnce => {
                println!("Fetching data...");
                report_fetch(&self.config, self.agent.poll_once().await);
            }
            MenuOption::StartMonitoring => match self.agent.start() {
                Ok(()) => println!(
                    "Monitoring started, saving the water temperature every {} seconds.",
                    self.config.polling_interval
                ),
                Err(AgentError::AlreadyRunning) => println!("Monitoring is already running."),
                Err(AgentError::Stopping) => {
                    println!("Monitoring is still stopping, please try again shortly.")
                }
                Err(err) => return Err(err).context("Failed to start monitoring"),
            },
            MenuOption::StopMonitoring => {
                if self.agent.stop() {
                    println!("Monitoring stopped.");
                } else {
                    println!("Monitoring is not running.");
                }
            }
            MenuOption::RecentReadings => self.print_recent().await,
            MenuOption::Exit => {
                info!("Application is shutting down");
                if let Err(err) = self.agent.shutdown().await {
                    warn!(error = %err, "Polling agent did not stop cleanly");
                }
                return Ok(Flow::Exit);
            }
        }

        Ok(Flow::Continue)
    }

    #[cfg(test)]
    pub fn agent(&self) -> &PollingAgent {
        &self.agent
    }

    async fn print_recent(&self) {
        match self.store.recent(RECENT_LIMIT).await {
            Ok(readings) if readings.is_empty() => println!("No readings stored yet."),
            Ok(readings) => {
                for reading in readings {
                    println!(
                        "{:>6}  {}  {:>6.1}°C  {}",
                        reading.id,
                        reading.observed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                        reading.temperature,
                        reading.location,
                    );
                }
            }
            Err(err) => {
                warn!(error = %err, "Failed to read stored readings");
                println!("Could not read the stored readings: {err}");
            }
        }
    }
}

/// Print the outcome of a one-shot fetch.
pub fn report_fetch(config: &AgentConfig, outcome: Result<Option<f64>, AgentError>) {
    match outcome {
        Ok(Some(temperature)) => println!(
            "Current water temperature at {}: {temperature}°C",
            config.station_label()
        ),
        Ok(None) => println!("Could not fetch the water temperature."),
        Err(err) => println!("Could not fetch the water temperature: {err}"),
    }
}

fn print_options() {
    println!("What do you want to do?");
    for option in MenuOption::all() {
        println!("{}. {}", option.number(), option.description());
    }
}

/// Read one line. `None` when the user cancels (Esc or Ctrl-C).
async fn prompt() -> Result<Option<String>> {
    let answer = tokio::task::spawn_blocking(|| inquire::Text::new(">").prompt())
        .await
        .context("Prompt task failed")?;

    match answer {
        Ok(input) => Ok(Some(input)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err).context("Failed to read menu choice"),
    }
}
