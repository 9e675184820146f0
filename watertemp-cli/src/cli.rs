use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use watertemp_core::{AgentConfig, PollingAgent};

use crate::{
    logging::{self, LogGuard},
    menu::{self, Menu},
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "watertemp", version, about = "Water temperature monitor")]
pub struct Cli {
    /// Config file to use instead of the one in the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive menu (the default).
    Menu,

    /// Fetch the latest water temperature once and save it.
    Fetch,

    /// Poll in the foreground until Ctrl-C.
    Monitor,

    /// Write a config file with the default settings.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => AgentConfig::config_file_path()?,
        };

        match self.command.unwrap_or(Command::Menu) {
            Command::Init { force } => init_config(&config_path, force),
            Command::Menu => {
                let session = Session::open(&config_path)?;
                let result = Menu::new(session.config.clone()).run().await;
                session.finish(result)
            }
            Command::Fetch => {
                let session = Session::open(&config_path)?;
                let result = fetch_once(&session.config).await;
                session.finish(result)
            }
            Command::Monitor => {
                let session = Session::open(&config_path)?;
                let result = monitor(&session.config).await;
                session.finish(result)
            }
        }
    }
}

/// Loaded config plus the log sink, alive for the whole command.
struct Session {
    config: AgentConfig,
    _logs: LogGuard,
}

impl Session {
    fn open(config_path: &Path) -> Result<Self> {
        let config = AgentConfig::load(Some(config_path))?;
        let logs = logging::init(config.logging_level, &config.log_file)?;

        info!(
            config = %config_path.display(),
            station = config.station_id,
            interval_secs = config.polling_interval,
            "Application started"
        );

        Ok(Self { config, _logs: logs })
    }

    fn finish(self, result: Result<()>) -> Result<()> {
        if let Err(err) = &result {
            error!(error = ?err, "An unhandled error occurred");
        }
        info!("Application ended");
        result
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file already exists: {}.\n\
             Hint: pass `--force` to overwrite it.",
            path.display()
        );
    }

    AgentConfig::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn fetch_once(config: &AgentConfig) -> Result<()> {
    let agent = PollingAgent::from_config(config);

    println!("Fetching data...");
    menu::report_fetch(config, agent.poll_once().await);
    Ok(())
}

async fn monitor(config: &AgentConfig) -> Result<()> {
    let agent = PollingAgent::from_config(config);
    agent.start().context("Failed to start monitoring")?;

    println!(
        "Monitoring {} every {} seconds. Press Ctrl-C to stop.",
        config.station_label(),
        config.polling_interval
    );

    watch_agent(&agent, tokio::signal::ctrl_c()).await?;
    println!("Monitoring stopped.");
    Ok(())
}

/// Wait until `interrupt` fires or the loop ends on its own, then shut it down.
async fn watch_agent(
    agent: &PollingAgent,
    interrupt: impl Future<Output = std::io::Result<()>>,
) -> Result<()> {
    tokio::select! {
        signal = interrupt => signal.context("Failed to listen for Ctrl-C")?,
        _ = agent.finished() => {}
    }

    agent.shutdown().await.context("Monitoring ended with an error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_the_menu() {
        let cli = Cli::try_parse_from(["watertemp"]).unwrap();

        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["watertemp", "fetch", "--config", "water.toml"]).unwrap();

        assert!(matches!(cli.command, Some(Command::Fetch)));
        assert_eq!(cli.config, Some(PathBuf::from("water.toml")));
    }

    fn offline_agent() -> PollingAgent {
        let config = AgentConfig {
            api_url: "http://127.0.0.1:1/".into(),
            ..AgentConfig::default()
        };
        PollingAgent::from_config(&config)
    }

    #[tokio::test]
    async fn monitoring_returns_once_the_loop_ends() {
        let agent = offline_agent();
        agent.start().unwrap();

        let stop_later = async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            assert!(agent.stop());
        };
        let (result, ()) = tokio::join!(watch_agent(&agent, std::future::pending()), stop_later);

        result.unwrap();
        assert!(!agent.is_running());
    }

    #[tokio::test]
    async fn interrupt_shuts_the_agent_down() {
        let agent = offline_agent();
        agent.start().unwrap();

        watch_agent(&agent, async { Ok(()) }).await.unwrap();

        assert!(!agent.is_running());
    }

    #[test]
    fn init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        init_config(&path, false).unwrap();
        assert_eq!(AgentConfig::load(Some(&path)).unwrap(), AgentConfig::default());

        let err = init_config(&path, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        init_config(&path, true).unwrap();
    }
}
