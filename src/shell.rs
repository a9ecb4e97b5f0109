use crate::error::{GvmSwitchError, Result};
use crate::models::GoVersion;
use async_trait::async_trait;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const FALLBACK_SHELL: &str = "/bin/bash";

/// Set on every shell gvm-switch starts; the rc hook and `env` skip themselves when present.
pub const ACTIVE_ENV: &str = "GVM_SWITCH_ACTIVE";

/// True inside a shell started by gvm-switch itself.
pub fn running_nested() -> bool {
    std::env::var_os(ACTIVE_ENV).is_some_and(|value| !value.is_empty())
}

/// Runs command lines where gvm's shell functions are available.
#[async_trait]
pub trait ShellRunner: Send + Sync {
    /// Run `command_line` and return its stdout.
    ///
    /// A nonzero exit is an [`GvmSwitchError::Execution`] carrying stderr,
    /// or stdout, or a fallback message when both are empty.
    async fn run(&self, command_line: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
}

impl Shell {
    pub fn detect() -> Option<Self> {
        std::env::var("SHELL").ok().and_then(|shell| Self::from_path(&shell))
    }

    pub fn from_path(shell: &str) -> Option<Self> {
        let name = Path::new(shell).file_name()?.to_str()?;
        if name.contains("zsh") {
            Some(Shell::Zsh)
        } else if name.contains("bash") {
            Some(Shell::Bash)
        } else {
            None
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "bash" => Some(Shell::Bash),
            "zsh" => Some(Shell::Zsh),
            _ => None,
        }
    }

    pub fn config_file(&self) -> Option<PathBuf> {
        let home = dirs::home_dir()?;

        match self {
            Shell::Bash => {
                // Try .bashrc first, then .bash_profile
                let bashrc = home.join(".bashrc");
                if bashrc.exists() {
                    Some(bashrc)
                } else {
                    Some(home.join(".bash_profile"))
                }
            }
            Shell::Zsh => Some(home.join(".zshrc")),
        }
    }

    /// Snippet that replays the workspace's gvm selection in every new interactive shell.
    ///
    /// `env` starts login shells of its own, and those may read the same rc
    /// file, so the hook only fires in interactive shells not started by us.
    pub fn hook_script(&self, exe: &str) -> String {
        format!(
            r#"
# gvm-switch - use the workspace Go version in new terminals
if [[ $- == *i* ]] && [ -z "${{{active}:-}}" ] && command -v {exe} >/dev/null 2>&1; then
    eval "$({exe} env)"
fi
"#,
            active = ACTIVE_ENV,
            exe = exe
        )
    }

    pub fn install_hook(&self, exe: &str) -> Result<PathBuf> {
        let config_file = self.config_file().ok_or_else(|| {
            GvmSwitchError::ShellError("Could not determine shell config file".to_string())
        })?;

        let mut contents = if config_file.exists() {
            std::fs::read_to_string(&config_file)?
        } else {
            String::new()
        };

        if contents.contains("# gvm-switch") {
            return Err(GvmSwitchError::ShellError(
                "gvm-switch is already configured in your shell".to_string(),
            ));
        }

        if let Some(parent) = config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        contents.push_str(&self.hook_script(exe));
        std::fs::write(&config_file, contents)?;

        Ok(config_file)
    }
}

/// Runs command lines through `<shell> -l -c` so gvm's profile hooks are loaded.
#[derive(Debug, Clone)]
pub struct LoginShell {
    program: PathBuf,
}

impl LoginShell {
    /// Use `$SHELL` when it can run the generated bash syntax, `/bin/bash` otherwise.
    pub fn detect() -> Self {
        let program = std::env::var("SHELL")
            .ok()
            .filter(|shell| Shell::from_path(shell).is_some())
            .unwrap_or_else(|| FALLBACK_SHELL.to_string());

        Self::with_program(program)
    }

    pub fn with_program<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ShellRunner for LoginShell {
    async fn run(&self, command_line: &str) -> Result<String> {
        debug!("{} -l -c {}", self.program.display(), command_line);

        let output = Command::new(&self.program)
            .arg("-l")
            .arg("-c")
            .arg(command_line)
            .env(ACTIVE_ENV, "1")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| GvmSwitchError::Execution {
                detail: format!("failed to start {}: {}", self.program.display(), e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = [stderr.trim(), stdout.trim()]
            .into_iter()
            .find(|text| !text.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!(
                    "Command failed: {} -l -c {} ({})",
                    self.program.display(),
                    command_line,
                    output.status
                )
            });

        Err(GvmSwitchError::Execution { detail })
    }
}

/// Quote a value for safe interpolation into a POSIX shell command line.
pub fn quote(value: &str) -> Result<Cow<'_, str>> {
    shlex::try_quote(value).map_err(|e| GvmSwitchError::Quote(format!("{:?} in {:?}", e, value)))
}

/// `[[ -s <init> ]] && source <init>`: load gvm only when its init script is present.
pub fn init_line(init_script: &Path) -> Result<String> {
    let path = init_script.to_string_lossy();
    let quoted = quote(&path)?;
    Ok(format!("[[ -s {0} ]] && source {0}", quoted))
}

/// The gvm subcommands this tool drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GvmCommand<'a> {
    Use(&'a GoVersion),
    PkgsetUse(&'a str),
    PkgsetCreate(&'a str),
    Install(&'a GoVersion),
}

impl GvmCommand<'_> {
    /// The bare `gvm ...` invocation, as typed into an interactive shell.
    pub fn gvm_line(&self) -> Result<String> {
        let line = match self {
            GvmCommand::Use(version) => format!("gvm use {}", quote(version.as_str())?),
            GvmCommand::PkgsetUse(pkgset) => format!("gvm pkgset use {}", quote(pkgset)?),
            GvmCommand::PkgsetCreate(pkgset) => format!("gvm pkgset create {}", quote(pkgset)?),
            GvmCommand::Install(version) => format!("gvm install {}", quote(version.as_str())?),
        };
        Ok(line)
    }

    /// Full command line for a non-interactive login shell.
    pub fn command_line(&self, init_script: &Path) -> Result<String> {
        Ok(format!("{} && {}", init_line(init_script)?, self.gvm_line()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(raw: &str) -> GoVersion {
        raw.parse().unwrap()
    }

    #[test]
    fn test_command_templates() {
        let init = Path::new("/home/gopher/.gvm/scripts/gvm");
        let v = version("1.22.0");

        assert_eq!(
            GvmCommand::Use(&v).command_line(init).unwrap(),
            "[[ -s /home/gopher/.gvm/scripts/gvm ]] && source /home/gopher/.gvm/scripts/gvm && gvm use go1.22.0"
        );
        assert!(GvmCommand::Install(&v)
            .command_line(init)
            .unwrap()
            .ends_with("&& gvm install go1.22.0"));
        assert!(GvmCommand::PkgsetUse("myset")
            .command_line(init)
            .unwrap()
            .ends_with("&& gvm pkgset use myset"));
        assert!(GvmCommand::PkgsetCreate("myset")
            .command_line(init)
            .unwrap()
            .ends_with("&& gvm pkgset create myset"));
    }

    #[test]
    fn test_pkgset_is_shell_escaped() {
        let init = Path::new("/tmp/my gvm/scripts/gvm");
        let hostile = "set; touch /tmp/pwned $(id) `id`";
        let line = GvmCommand::PkgsetUse(hostile).command_line(init).unwrap();

        let words = shlex::split(&line).unwrap();
        assert!(words.contains(&hostile.to_string()));
        assert!(words.contains(&"/tmp/my gvm/scripts/gvm".to_string()));
        assert_eq!(words.last().unwrap(), hostile);
    }

    #[test]
    fn test_nul_byte_cannot_be_quoted() {
        assert!(matches!(
            GvmCommand::PkgsetUse("bad\0set").gvm_line(),
            Err(GvmSwitchError::Quote(_))
        ));
    }

    #[test]
    fn test_shell_detection_from_path() {
        assert_eq!(Shell::from_path("/bin/bash"), Some(Shell::Bash));
        assert_eq!(Shell::from_path("/usr/local/bin/zsh"), Some(Shell::Zsh));
        assert_eq!(Shell::from_path("/usr/bin/fish"), None);
        assert_eq!(Shell::from_path("/bin/sh"), None);
        assert_eq!(Shell::from_name("fish"), None);
    }

    #[test]
    fn test_hook_script_evals_env() {
        let script = Shell::Bash.hook_script("gvm-switch");
        assert!(script.contains("# gvm-switch"));
        assert!(script.contains(r#"eval "$(gvm-switch env)""#));
    }

    #[test]
    fn test_hook_script_skips_nested_and_noninteractive_shells() {
        let script = Shell::Zsh.hook_script("gvm-switch");
        assert!(script.contains(r#"if [[ $- == *i* ]] && [ -z "${GVM_SWITCH_ACTIVE:-}" ] && command -v gvm-switch"#));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_login_shell_marks_child_as_nested() {
        let shell = LoginShell::with_program("/bin/sh");
        let out = shell.run("echo \"active=${GVM_SWITCH_ACTIVE}\"").await.unwrap();
        assert!(out.contains("active=1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_hook_does_not_run_under_login_shell_child() {
        let script = Shell::Bash.hook_script("echo");
        let output = std::process::Command::new("/bin/bash")
            .arg("-c")
            .arg(format!("{}\necho done", script))
            .env(ACTIVE_ENV, "1")
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "done");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_login_shell_returns_stdout() {
        let shell = LoginShell::with_program("/bin/sh");
        let out = shell.run("echo switched").await.unwrap();
        assert!(out.contains("switched"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_login_shell_rejects_with_stderr() {
        let shell = LoginShell::with_program("/bin/sh");
        let err = shell
            .run("echo partial; echo 'ERROR: go9.9 not installed' >&2; exit 3")
            .await
            .unwrap_err();

        match err {
            GvmSwitchError::Execution { detail } => {
                assert!(detail.contains("ERROR: go9.9 not installed"))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_login_shell_falls_back_to_stdout_then_message() {
        let shell = LoginShell::with_program("/bin/sh");

        let err = shell.run("echo only-stdout; exit 1").await.unwrap_err();
        assert!(err.detail().unwrap().contains("only-stdout"));

        let err = shell.run("exit 2").await.unwrap_err();
        assert!(err.detail().unwrap().contains("exit 2"));
    }

    #[tokio::test]
    async fn test_missing_shell_is_an_execution_error() {
        let shell = LoginShell::with_program("/definitely/not/a/shell");
        let err = shell.run("true").await.unwrap_err();
        assert!(matches!(err, GvmSwitchError::Execution { .. }));
    }
}
