use crate::config::ConfigSource;
use crate::error::{GvmSwitchError, Result};
use crate::models::{GoVersion, PkgsetState, Resolution, SwitchOutcome};
use crate::resolver::{GoModLookup, TargetResolver};
use crate::shell::{init_line, GvmCommand, ShellRunner};
use crate::surface::{Interaction, StatusSink, TerminalSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything one switch attempt needs after resolution
struct Attempt<'a> {
    init: &'a Path,
    version: &'a GoVersion,
    pkgset: Option<&'a str>,
    offer_create: bool,
}

impl Attempt<'_> {
    fn label(&self) -> String {
        match self.pkgset {
            Some(p) => format!("{} ({})", self.version, p),
            None => self.version.to_string(),
        }
    }

    fn pkgset_flag(&self) -> String {
        self.pkgset
            .map(|p| format!(" --pkgset={}", p))
            .unwrap_or_default()
    }
}

/// Sequences resolution, gvm invocations and user feedback.
///
/// Runs are not serialized against each other: callers await each run,
/// and whichever run finishes last owns the status text.
pub struct Switcher {
    runner: Arc<dyn ShellRunner>,
    config: Arc<dyn ConfigSource>,
    status: Arc<dyn StatusSink>,
    ui: Arc<dyn Interaction>,
    resolver: TargetResolver,
}

impl Switcher {
    pub fn new(
        runner: Arc<dyn ShellRunner>,
        config: Arc<dyn ConfigSource>,
        status: Arc<dyn StatusSink>,
        ui: Arc<dyn Interaction>,
    ) -> Self {
        Self {
            runner,
            config,
            status,
            ui,
            resolver: TargetResolver::new(),
        }
    }

    pub fn resolve(&self, roots: &[PathBuf]) -> Resolution {
        self.resolver.resolve(roots)
    }

    /// Resolve the workspace's version and pkgset and activate them.
    ///
    /// With `prompt_on_failure` off nothing is asked or notified; only the
    /// status text changes.
    pub async fn use_workspace_version(
        &self,
        roots: &[PathBuf],
        prompt_on_failure: bool,
    ) -> SwitchOutcome {
        let config = self.config.current();
        let init = config.init_script_path();
        let Resolution {
            version, pkgset, ..
        } = self.resolver.resolve(roots);

        let Some(version) = version else {
            if prompt_on_failure {
                self.ui.warn(&GvmSwitchError::NoVersionFound.to_string());
            }
            self.status.set_text("GVM: No version");
            return SwitchOutcome::Failed(GvmSwitchError::NoVersionFound);
        };

        let attempt = Attempt {
            init: &init,
            version: &version,
            pkgset: pkgset.as_deref(),
            offer_create: prompt_on_failure && config.prompt_to_create_pkgset,
        };

        let detail = match self.activate(&attempt).await {
            Ok(pkgset_state) => return self.succeeded(&attempt, pkgset_state, prompt_on_failure),
            Err(e) => detail_of(e),
        };

        warn!("gvm use {} failed: {}", version, detail);
        self.status.set_text(&format!("GVM: Failed ({})", version));

        let activation_failed = GvmSwitchError::ActivationFailed {
            version: version.to_string(),
            detail,
        };

        if !prompt_on_failure {
            return SwitchOutcome::Failed(activation_failed);
        }

        let question = format!(
            "gvm use failed for {}. Install this version with gvm?",
            attempt.label()
        );
        if !self.ui.confirm(&question) {
            self.ui.error(&format!(
                "Failed to gvm use {}{}",
                version,
                attempt.pkgset_flag()
            ));
            return SwitchOutcome::Failed(activation_failed);
        }

        self.ui.task_started(&format!("Installing {} via gvm...", version));
        let installed = self.run(GvmCommand::Install(&version), &init).await;
        self.ui.task_finished();

        if let Err(e) = installed {
            let err = GvmSwitchError::InstallFailed {
                version: version.to_string(),
                detail: detail_of(e),
            };
            warn!("{}", err);
            self.ui.error(&err.to_string());
            return SwitchOutcome::Failed(err);
        }

        match self.activate(&attempt).await {
            Ok(pkgset_state) => self.succeeded(&attempt, pkgset_state, true),
            Err(e) => {
                self.ui.error(&format!(
                    "Failed to gvm use {}{} after installation",
                    version,
                    attempt.pkgset_flag()
                ));
                SwitchOutcome::Failed(GvmSwitchError::RetryFailed {
                    version: version.to_string(),
                    detail: detail_of(e),
                })
            }
        }
    }

    /// Activate the version named by go.mod only; `.go-version` and `.go-pkgset` are ignored.
    pub async fn apply_from_go_mod(&self, roots: &[PathBuf]) -> SwitchOutcome {
        let version = match self.resolver.resolve_from_go_mod(roots) {
            GoModLookup::Found { version, .. } => version,
            GoModLookup::Missing => {
                self.ui.warn("No go.mod found in workspace");
                return SwitchOutcome::Failed(GvmSwitchError::NoGoMod);
            }
            GoModLookup::NoDirective(path) => {
                debug!("No go directive in {}", path.display());
                self.ui.warn("No Go version found in go.mod");
                return SwitchOutcome::Failed(GvmSwitchError::NoVersionFound);
            }
        };

        let init = self.config.current().init_script_path();
        match self.run(GvmCommand::Use(&version), &init).await {
            Ok(_) => {
                self.status.set_text(&format!("GVM: {}", version));
                self.ui
                    .info(&format!("Switched to Go {} (from go.mod)", version));
                SwitchOutcome::Succeeded {
                    version,
                    pkgset: PkgsetState::None,
                }
            }
            Err(e) => {
                self.status.set_text(&format!("GVM: Failed ({})", version));
                self.ui.error(&format!("Failed to gvm use {}", version));
                SwitchOutcome::Failed(GvmSwitchError::ActivationFailed {
                    version: version.to_string(),
                    detail: detail_of(e),
                })
            }
        }
    }

    /// A new interactive terminal opened: switch, then replay the activation into it.
    pub async fn on_terminal_opened(
        &self,
        roots: &[PathBuf],
        terminal: &mut dyn TerminalSink,
    ) -> Result<SwitchOutcome> {
        let prompt = self.config.current().prompt_on_failure;
        let outcome = self.use_workspace_version(roots, prompt).await;

        let resolution = self.resolver.resolve(roots);
        let Some(version) = resolution.version else {
            return Ok(outcome);
        };

        let init = self.config.current().init_script_path();
        terminal.send_text(&init_line(&init)?)?;
        terminal.send_text(&GvmCommand::Use(&version).gvm_line()?)?;
        if let Some(pkgset) = resolution.pkgset.as_deref() {
            terminal.send_text(&GvmCommand::PkgsetUse(pkgset).gvm_line()?)?;
        }

        Ok(outcome)
    }

    /// A tracked file changed somewhere in the workspace; switch silently.
    pub async fn on_tracked_file_changed(&self, roots: &[PathBuf]) -> SwitchOutcome {
        self.use_workspace_version(roots, false).await
    }

    async fn run(&self, command: GvmCommand<'_>, init: &Path) -> Result<String> {
        let line = command.command_line(init)?;
        self.runner.run(&line).await
    }

    /// `gvm use`, then the pkgset if one was requested. Only a failed
    /// `gvm use` is an error; pkgset trouble is folded into the state.
    async fn activate(&self, attempt: &Attempt<'_>) -> Result<PkgsetState> {
        self.run(GvmCommand::Use(attempt.version), attempt.init).await?;

        match attempt.pkgset {
            Some(pkgset) => Ok(self.apply_pkgset(attempt, pkgset).await),
            None => Ok(PkgsetState::None),
        }
    }

    async fn apply_pkgset(&self, attempt: &Attempt<'_>, pkgset: &str) -> PkgsetState {
        let err = match self.run(GvmCommand::PkgsetUse(pkgset), attempt.init).await {
            Ok(_) => return PkgsetState::Applied(pkgset.to_string()),
            Err(e) => GvmSwitchError::PkgsetActivationFailed {
                pkgset: pkgset.to_string(),
                detail: detail_of(e),
            },
        };
        warn!("{}", err);

        if !attempt.offer_create {
            return PkgsetState::Failed(pkgset.to_string());
        }

        let question = format!("gvm pkgset '{}' not found. Create it now?", pkgset);
        if !self.ui.confirm(&question) {
            return PkgsetState::Failed(pkgset.to_string());
        }

        self.ui.task_started(&format!("Creating pkgset {}...", pkgset));
        let created = self.run(GvmCommand::PkgsetCreate(pkgset), attempt.init).await;
        self.ui.task_finished();

        if let Err(e) = created {
            warn!("gvm pkgset create {} failed: {}", pkgset, detail_of(e));
            return PkgsetState::Failed(pkgset.to_string());
        }

        match self.run(GvmCommand::PkgsetUse(pkgset), attempt.init).await {
            Ok(_) => PkgsetState::Applied(pkgset.to_string()),
            Err(e) => {
                warn!("gvm pkgset use {} failed after create: {}", pkgset, detail_of(e));
                PkgsetState::Failed(pkgset.to_string())
            }
        }
    }

    fn succeeded(&self, attempt: &Attempt<'_>, pkgset: PkgsetState, notify: bool) -> SwitchOutcome {
        let version = attempt.version;

        match pkgset.applied() {
            Some(p) => self.status.set_text(&format!("GVM: {} ({})", version, p)),
            None => self.status.set_text(&format!("GVM: {}", version)),
        }

        if notify {
            match pkgset.applied() {
                Some(p) => self
                    .ui
                    .info(&format!("Switched to Go {} pkgset: {}", version, p)),
                None => self.ui.info(&format!("Switched to Go {}", version)),
            }
            if let PkgsetState::Failed(p) = &pkgset {
                self.ui.warn(&format!("Failed to use pkgset '{}'", p));
            }
        }

        SwitchOutcome::Succeeded {
            version: version.clone(),
            pkgset,
        }
    }
}

fn detail_of(err: GvmSwitchError) -> String {
    err.detail()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}
