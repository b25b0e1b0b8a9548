use crate::auth::password::hash_password;
use crate::config::{ConfigStore, NewRule};
use crate::rules::{PageRequest, RuleService};
use crate::service::{DEFAULT_PROGRAM, DEFAULT_TIMEOUT, DEFAULT_UNIT};
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_DAEMON_CONFIG: &str = "/root/.realm/config.toml";
pub const DEFAULT_SETTINGS: &str = "./config.toml";

#[derive(Parser, Debug, Clone)]
#[command(name = "realm-panel", about, author, version, long_about = None, propagate_version = true)]
pub struct PanelArguments {
    #[arg(short = 'c', long = "config", default_value = DEFAULT_DAEMON_CONFIG, help = "Path to the realm daemon configuration file")]
    pub config_path: PathBuf,
    #[arg(short = 's', long = "settings", default_value = DEFAULT_SETTINGS, help = "Path to the panel settings file")]
    pub settings_path: PathBuf,
    #[arg(long = "unit", default_value = DEFAULT_UNIT, help = "Service unit controlled by the panel")]
    pub unit: String,
    #[arg(long = "systemctl", default_value = DEFAULT_PROGRAM, help = "Service manager executable")]
    pub systemctl: String,
    #[arg(long = "service-timeout", default_value_t = DEFAULT_TIMEOUT.as_secs(), help = "Seconds before a service command is abandoned")]
    pub service_timeout: u64,
    #[arg(long = "templates", default_value = "./templates", help = "Directory holding index.html and login.html")]
    pub templates_dir: PathBuf,
    #[arg(long = "static", default_value = "./static", help = "Directory served under /static")]
    pub static_dir: PathBuf,
    #[arg(short = 'w', long = "watch", help = "Reload the daemon configuration when it changes on disk")]
    pub watch_config: bool,
    #[arg(short = 'v', long = "verbose", help = "Enable verbose logging")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<PanelCommands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PanelCommands {
    #[clap(name = "rules", about = "Manage forwarding rules without starting the panel")]
    Rules {
        #[clap(subcommand)]
        command: RuleCommands,
    },
    #[clap(name = "hash-password", about = "Print an argon2 hash to use as auth.password")]
    HashPassword { password: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum RuleCommands {
    #[clap(name = "list", about = "List all forwarding rules")]
    List,
    #[clap(name = "add", about = "Add a forwarding rule")]
    Add {
        /// Local endpoint, e.g. 0.0.0.0:8080
        listen: String,
        /// Upstream endpoint, e.g. 10.0.0.5:80
        remote: String,
    },
    #[clap(name = "remove", about = "Remove the forwarding rule listening on an endpoint")]
    Remove { listen: String },
}

impl PanelArguments {
    /// Runs a one-shot subcommand. Returns `true` when one was handled and
    /// the panel should not start.
    pub async fn handle_arguments(&self) -> Result<bool> {
        let Some(command) = &self.command else {
            return Ok(false);
        };
        match command {
            PanelCommands::Rules { command } => {
                let store = Arc::new(ConfigStore::load(&self.config_path).await?);
                let rules = RuleService::new(store);
                match command {
                    RuleCommands::List => {
                        let page = rules.list(PageRequest { page: 1, size: usize::MAX }).await;
                        for rule in &page.rules {
                            println!("\x1b[1;33m{}\x1b[0m -> \x1b[1;32m{}\x1b[0m", rule.listen, rule.remote);
                        }
                        println!("{} rule(s)", page.total);
                    }
                    RuleCommands::Add { listen, remote } => {
                        let rule = rules.add(NewRule { listen: listen.clone(), remote: remote.clone() }).await?;
                        info!("Added rule: {}", rule);
                    }
                    RuleCommands::Remove { listen } => {
                        rules.delete(listen).await?;
                        info!("Removed rule: {}", listen);
                    }
                }
            }
            PanelCommands::HashPassword { password } => {
                println!("{}", hash_password(password)?);
            }
        }
        Ok(true)
    }
}
