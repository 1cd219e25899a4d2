//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::cli::server::{serve, ServerConfig};
use crate::config::Settings;
use crate::error::{Error, FetchFailure, Result};
use crate::fetcher::Fetcher;
use crate::neighbours::{find_star_neighbours, Neighbour, NeighbourOptions};
use crate::types::{ApiFlavor, CollectionKind, Credential, FetchKey, Identity};
use futures::{Stream, TryStreamExt};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let settings = self.settings()?;

        match &self.cli.command {
            Commands::Stargazers { repo } => {
                let key = Self::parse_repo(repo)?;
                self.list(&settings, key).await
            }
            Commands::Starred { user } => self.list(&settings, FetchKey::starred(user)).await,
            Commands::Neighbours {
                repo,
                max_stargazers,
                min_shared,
            } => {
                let options = NeighbourOptions {
                    max_stargazers: *max_stargazers,
                    min_shared: *min_shared,
                };
                self.neighbours(&settings, repo, options).await
            }
            Commands::Serve { port } => {
                let fetcher = Fetcher::from_settings(&settings)?;
                serve(fetcher, ServerConfig::from_settings(&settings), *port).await
            }
            Commands::Config => {
                let value = serde_json::to_value(settings.redacted())?;
                self.output_message(&value);
                Ok(())
            }
        }
    }

    /// Effective settings: file, environment, then command-line flags
    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.cli.config.as_deref())?;
        self.apply_flags(&mut settings);
        settings.validate()?;
        Ok(settings)
    }

    fn apply_flags(&self, settings: &mut Settings) {
        if let Some(token) = &self.cli.token {
            settings.github_token.clone_from(token);
        }
        if let Some(page_size) = self.cli.page_size {
            settings.fetch.page_size = page_size;
        }
        if let Some(max_attempts) = self.cli.max_attempts {
            settings.fetch.max_attempts = max_attempts;
        }
        if self.cli.graphql {
            settings.api.flavor = ApiFlavor::Graphql;
        }
    }

    fn parse_repo(slug: &str) -> Result<FetchKey> {
        FetchKey::parse_repo(slug).ok_or_else(|| {
            Error::invalid_value("repo", format!("expected owner/name, got '{slug}'"))
        })
    }

    /// Cancellation token fired by Ctrl-C
    fn cancel_on_ctrl_c() -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling fetch");
                token.cancel();
            }
        });
        cancel
    }

    /// Stream one listing to stdout as it arrives
    async fn list(&self, settings: &Settings, key: FetchKey) -> Result<()> {
        let fetcher = Fetcher::from_settings(settings)?;
        let credential = Credential::new(settings.github_token.clone());
        let cancel = Self::cancel_on_ctrl_c();

        let stream = match key.kind {
            CollectionKind::Stargazers => {
                fetcher.stargazers(&key.owner_key, &key.resource_key, &credential, cancel)?
            }
            CollectionKind::Starred => fetcher.starred(&key.owner_key, &credential, cancel)?,
        };

        let printed = self.print_stream(stream).await?;
        info!(key = %key, items = printed, "fetch complete");
        Ok(())
    }

    /// Print identities as they arrive; returns how many were printed
    async fn print_stream<S>(&self, stream: S) -> std::result::Result<usize, FetchFailure>
    where
        S: Stream<Item = std::result::Result<Identity, FetchFailure>>,
    {
        stream
            .try_fold(0, |printed, identity| async move {
                self.output_identity(&identity);
                Ok(printed + 1)
            })
            .await
    }

    async fn neighbours(
        &self,
        settings: &Settings,
        repo: &str,
        options: NeighbourOptions,
    ) -> Result<()> {
        let key = Self::parse_repo(repo)?;
        let fetcher = Fetcher::from_settings(settings)?;
        let credential = Credential::new(settings.github_token.clone());

        let neighbours = find_star_neighbours(
            &fetcher,
            &key.owner_key,
            &key.resource_key,
            &credential,
            options,
            Self::cancel_on_ctrl_c(),
        )
        .await?;

        match self.cli.format {
            OutputFormat::Json => self.output_message(&neighbours_document(&key, &neighbours)),
            OutputFormat::Pretty => {
                for neighbour in &neighbours {
                    println!(
                        "{} ({}): {}",
                        neighbour.repo,
                        neighbour.stargazers.len(),
                        neighbour.stargazers.join(", ")
                    );
                }
            }
        }
        Ok(())
    }

    fn output_identity(&self, identity: &Identity) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(identity).unwrap_or_default());
            }
            OutputFormat::Pretty => println!("{identity}"),
        }
    }

    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn neighbours_document(key: &FetchKey, neighbours: &[Neighbour]) -> Value {
    json!({
        "repo": key.to_string(),
        "neighbours": neighbours,
    })
}
