use crate::config::{Config, ConfigFile};
use crate::error::{GvmSwitchError, Result};
use crate::models::SwitchOutcome;
use crate::shell::{self, LoginShell, Shell};
use crate::surface::{ConsoleStatus, ConsoleUi, StdoutTerminal, TerminalSink};
use crate::switcher::Switcher;
use crate::utils::{print_error, print_info, print_success, print_warning};
use crate::watcher::{self, WorkspaceWatcher};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "gvm-switch")]
#[command(about = "Switch Go versions with GVM from .go-version, .go-pkgset or go.mod", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $GVM_SWITCH_CONFIG or the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root to search, in order; repeat for multi-root workspaces
    #[arg(long = "root", global = true)]
    roots: Vec<PathBuf>,

    /// Also write the status text to this file
    #[arg(long, global = true)]
    status_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch to the workspace's Go version and pkgset, prompting on failure
    Use,

    /// Switch using only the go directive in go.mod
    ApplyGoMod,

    /// Show the version and pkgset the workspace asks for, without switching
    Resolve {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Switch, then print the activation commands for the calling shell to eval
    Env,

    /// Switch now, then again whenever .go-version, .go-pkgset or go.mod changes
    Watch,

    /// Install the new-terminal hook into your shell config
    ShellInit {
        /// Shell type (bash, zsh)
        #[arg(short, long)]
        shell: Option<String>,
    },

    /// Show gvm-switch configuration, or set a key
    Config {
        /// Show specific config key
        key: Option<String>,

        /// New value for the key
        value: Option<String>,
    },
}

impl Cli {
    pub fn new() -> Self {
        Self::parse()
    }

    pub async fn run(self) -> Result<()> {
        let config_path = self.config.clone().unwrap_or_else(Config::default_path);
        // Fail early on a broken file; later re-reads fall back to defaults
        let config = Config::load_from(&config_path)?;

        match self.command {
            Commands::Use => self.use_workspace(config_path).await,
            Commands::ApplyGoMod => self.apply_go_mod(config_path).await,
            Commands::Resolve { json } => self.resolve(config_path, json),
            Commands::Env => self.env(config_path).await,
            Commands::Watch => self.watch(config_path, &config).await,
            Commands::ShellInit { ref shell } => self.shell_init(shell.clone()),
            Commands::Config {
                key: Some(ref key),
                value: Some(ref value),
            } => self.set_config(config, &config_path, key, value),
            Commands::Config { ref key, .. } => {
                self.show_config(&config, &config_path, key.clone())
            }
        }
    }

    fn workspace_roots(&self) -> Result<Vec<PathBuf>> {
        if self.roots.is_empty() {
            Ok(vec![std::env::current_dir()?])
        } else {
            Ok(self.roots.clone())
        }
    }

    fn switcher(&self, config_path: PathBuf) -> Switcher {
        Switcher::new(
            Arc::new(LoginShell::detect()),
            Arc::new(ConfigFile::new(config_path)),
            Arc::new(ConsoleStatus::new(self.status_file.clone())),
            Arc::new(ConsoleUi::new()),
        )
    }

    async fn use_workspace(&self, config_path: PathBuf) -> Result<()> {
        let roots = self.workspace_roots()?;
        let outcome = self
            .switcher(config_path)
            .use_workspace_version(&roots, true)
            .await;
        exit_on_failure(outcome)
    }

    async fn apply_go_mod(&self, config_path: PathBuf) -> Result<()> {
        let roots = self.workspace_roots()?;
        let outcome = self.switcher(config_path).apply_from_go_mod(&roots).await;
        exit_on_failure(outcome)
    }

    fn resolve(&self, config_path: PathBuf, json: bool) -> Result<()> {
        let roots = self.workspace_roots()?;
        let resolution = self.switcher(config_path).resolve(&roots);

        if json {
            println!("{}", serde_json::to_string_pretty(&resolution)?);
            return Ok(());
        }

        match (&resolution.version, resolution.source) {
            (Some(version), Some(source)) => println!(
                "{} {} (from {})",
                "Would use:".green().bold(),
                version.to_string().cyan(),
                source.file_name()
            ),
            _ => print_warning("No Go version specified in .go-version or go.mod"),
        }

        if let Some(pkgset) = &resolution.pkgset {
            println!("{} {}", "Pkgset:".green().bold(), pkgset.cyan());
        }

        Ok(())
    }

    async fn env(&self, config_path: PathBuf) -> Result<()> {
        self.replay_env(config_path, &mut StdoutTerminal).await
    }

    /// Never fails: it runs from shell rc files.
    async fn replay_env(
        &self,
        config_path: PathBuf,
        terminal: &mut dyn TerminalSink,
    ) -> Result<()> {
        if shell::running_nested() {
            debug!("Skipping env inside a gvm-switch shell");
            return Ok(());
        }

        let roots = match self.workspace_roots() {
            Ok(roots) => roots,
            Err(e) => {
                warn!("Could not determine workspace roots: {}", e);
                return Ok(());
            }
        };

        if let Err(e) = self
            .switcher(config_path)
            .on_terminal_opened(&roots, terminal)
            .await
        {
            warn!("Could not replay gvm selection: {}", e);
        }
        Ok(())
    }

    async fn watch(&self, config_path: PathBuf, config: &Config) -> Result<()> {
        let roots = self.workspace_roots()?;
        let switcher = self.switcher(config_path);

        switcher
            .use_workspace_version(&roots, config.prompt_on_failure)
            .await;

        let workspace_watcher = WorkspaceWatcher::new(&roots)?;
        print_info(&format!(
            "Watching {} workspace root(s) for .go-version, .go-pkgset and go.mod changes",
            roots.len()
        ));
        watcher::watch(&switcher, &roots, workspace_watcher).await;

        Ok(())
    }

    fn shell_init(&self, shell_type: Option<String>) -> Result<()> {
        let shell = match shell_type {
            Some(name) => match Shell::from_name(&name) {
                Some(shell) => shell,
                None => {
                    print_error(&format!("Unsupported shell: {}", name));
                    return Ok(());
                }
            },
            None => Shell::detect().unwrap_or(Shell::Bash),
        };

        eprintln!("{}", "Installing shell integration...".yellow());

        match shell.install_hook(env!("CARGO_PKG_NAME")) {
            Ok(config_file) => {
                print_success("Shell integration installed");
                eprintln!("  Updated: {}", config_file.display());
                eprintln!("\n{}", "Reload your shell:".yellow());
                eprintln!("  source {}", config_file.display());
            }
            Err(e) => {
                print_error(&format!("Failed to install shell integration: {}", e));
            }
        }

        Ok(())
    }

    fn set_config(
        &self,
        mut config: Config,
        config_path: &std::path::Path,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let parse_bool = |value: &str| {
            value.parse::<bool>().map_err(|_| {
                GvmSwitchError::ConfigError(format!("{} expects true or false, got '{}'", key, value))
            })
        };

        match key {
            "gvmInitScriptPath" | "gvm_init_script_path" => {
                config.gvm_init_script_path = value.to_string()
            }
            "promptOnFailure" | "prompt_on_failure" => config.prompt_on_failure = parse_bool(value)?,
            "promptToCreatePkgset" | "prompt_to_create_pkgset" => {
                config.prompt_to_create_pkgset = parse_bool(value)?
            }
            _ => {
                print_warning(&format!("Unknown config key: {}", key));
                return Ok(());
            }
        }

        config.save_to(config_path)?;
        print_success(&format!("Set {} = {}", key, value));
        Ok(())
    }

    fn show_config(
        &self,
        config: &Config,
        config_path: &std::path::Path,
        key: Option<String>,
    ) -> Result<()> {
        if let Some(key_name) = key {
            match key_name.as_str() {
                "gvmInitScriptPath" | "gvm_init_script_path" => {
                    println!("{}", config.init_script_path().display())
                }
                "promptOnFailure" | "prompt_on_failure" => println!("{}", config.prompt_on_failure),
                "promptToCreatePkgset" | "prompt_to_create_pkgset" => {
                    println!("{}", config.prompt_to_create_pkgset)
                }
                "file" | "path" => println!("{}", config_path.display()),
                _ => print_warning(&format!("Unknown config key: {}", key_name)),
            }
        } else {
            println!("{}", "gvm-switch Configuration:".green().bold());
            println!("  {} {}", "Config File:".cyan(), config_path.display());
            println!(
                "  {} {}",
                "GVM Init Script:".cyan(),
                config.init_script_path().display()
            );
            println!("  {} {}", "Prompt On Failure:".cyan(), config.prompt_on_failure);
            println!(
                "  {} {}",
                "Prompt To Create Pkgset:".cyan(),
                config.prompt_to_create_pkgset
            );
        }

        Ok(())
    }
}

fn exit_on_failure(outcome: SwitchOutcome) -> Result<()> {
    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_roots_and_subcommand() {
        let cli = Cli::try_parse_from([
            "gvm-switch",
            "--root",
            "/ws/api",
            "--root",
            "/ws/web",
            "resolve",
            "--json",
        ])
        .unwrap();

        assert_eq!(
            cli.roots,
            vec![PathBuf::from("/ws/api"), PathBuf::from("/ws/web")]
        );
        assert!(matches!(cli.command, Commands::Resolve { json: true }));
        assert_eq!(cli.workspace_roots().unwrap().len(), 2);
    }

    #[test]
    fn test_config_set_writes_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let cli = Cli::try_parse_from(["gvm-switch", "config", "promptOnFailure", "true"]).unwrap();

        cli.set_config(Config::default(), &path, "promptOnFailure", "true")
            .unwrap();
        assert!(Config::load_from(&path).unwrap().prompt_on_failure);

        assert!(cli
            .set_config(Config::default(), &path, "promptOnFailure", "sometimes")
            .is_err());
    }

    struct BrokenPipe;

    impl TerminalSink for BrokenPipe {
        fn send_text(&mut self, _text: &str) -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed").into())
        }
    }

    #[tokio::test]
    async fn test_env_succeeds_when_replay_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(".go-version"), "1.22.0\n").unwrap();
        let root = temp_dir.path().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["gvm-switch", "--root", root.as_str(), "env"]).unwrap();
        let config_path = temp_dir.path().join("config.toml");

        assert!(cli.replay_env(config_path, &mut BrokenPipe).await.is_ok());
    }

    #[test]
    fn test_default_root_is_current_dir() {
        let cli = Cli::try_parse_from(["gvm-switch", "use"]).unwrap();
        assert_eq!(
            cli.workspace_roots().unwrap(),
            vec![std::env::current_dir().unwrap()]
        );
    }
}
