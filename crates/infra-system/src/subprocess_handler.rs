// Subprocess hardware handler
// Each enable/disable runs a configured command in an isolated child
// process with an allowlisted environment.
use async_trait::async_trait;
use serde::Deserialize;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{info, warn};

use dhfwk_core::application::executor::constants::{
    DEFAULT_HANDLER_TIMEOUT_MS, GRACEFUL_SHUTDOWN_TIMEOUT_MS,
};
use dhfwk_core::domain::{anonymize, DhType, HardwareUnit};
use dhfwk_core::error::{code, AppError, Result};
use dhfwk_core::port::{HandlerError, HardwareHandler};

/// Command lines for one hardware type.
///
/// Arguments may contain `{network_id}`, `{device_id}`, `{dh_id}` and
/// `{dh_type}`, substituted per call.
#[derive(Debug, Clone, Deserialize)]
pub struct SubprocessHandlerConfig {
    pub enable: Vec<String>,
    pub disable: Vec<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    #[serde(default = "default_env_allowlist")]
    pub env_allowlist: Vec<String>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_HANDLER_TIMEOUT_MS
}

fn default_grace_ms() -> u64 {
    GRACEFUL_SHUTDOWN_TIMEOUT_MS as u64
}

fn default_env_allowlist() -> Vec<String> {
    vec!["PATH".to_string(), "HOME".to_string(), "USER".to_string()]
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Enable,
    Disable,
}

impl Operation {
    fn as_str(&self) -> &'static str {
        match self {
            Operation::Enable => "enable",
            Operation::Disable => "disable",
        }
    }
}

pub struct SubprocessHandler {
    dh_type: DhType,
    config: SubprocessHandlerConfig,
}

impl SubprocessHandler {
    /// Both command lines must name a program
    pub fn new(dh_type: DhType, config: SubprocessHandlerConfig) -> Result<Self> {
        if config.enable.is_empty() || config.disable.is_empty() {
            return Err(AppError::Validation(format!(
                "handler for {} needs both enable and disable commands",
                dh_type
            )));
        }
        Ok(Self { dh_type, config })
    }

    fn expand(&self, arg: &str, unit: &HardwareUnit) -> String {
        arg.replace("{network_id}", &unit.network_id)
            .replace("{device_id}", &unit.device_id)
            .replace("{dh_id}", &unit.dh_id)
            .replace("{dh_type}", self.dh_type.as_str())
    }

    /// Environment passed to the child: allowlisted variables of this
    /// process plus the unit being operated on
    fn child_env(&self, op: Operation, unit: &HardwareUnit) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = self
            .config
            .env_allowlist
            .iter()
            .filter_map(|k| std::env::var(k).ok().map(|v| (k.clone(), v)))
            .collect();
        env.push(("DHFWK_OPERATION".into(), op.as_str().into()));
        env.push(("DHFWK_DH_TYPE".into(), self.dh_type.as_str().into()));
        env.push(("DHFWK_NETWORK_ID".into(), unit.network_id.clone()));
        env.push(("DHFWK_DEVICE_ID".into(), unit.device_id.clone()));
        env.push(("DHFWK_DH_ID".into(), unit.dh_id.clone()));
        env
    }

    async fn run(&self, op: Operation, unit: &HardwareUnit) -> std::result::Result<(), HandlerError> {
        let argv = match op {
            Operation::Enable => &self.config.enable,
            Operation::Disable => &self.config.disable,
        };
        let program = self.expand(&argv[0], unit);
        let args: Vec<String> = argv[1..].iter().map(|a| self.expand(a, unit)).collect();

        info!(
            dh_type = %self.dh_type,
            operation = op.as_str(),
            program = %program,
            device = %anonymize(&unit.device_id),
            dh_id = %unit.dh_id,
            "Starting handler subprocess"
        );

        let mut child = Command::new(&program)
            .args(&args)
            .env_clear()
            .envs(self.child_env(op, unit))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                HandlerError::new(code::OPERATION_FAILED, format!("spawn {}: {}", program, e))
            })?;

        let mut stderr = child.stderr.take();
        let wait = async {
            let mut captured = Vec::new();
            if let Some(pipe) = stderr.as_mut() {
                // a read error only loses diagnostics
                let _ = pipe.read_to_end(&mut captured).await;
            }
            let status = child.wait().await;
            (status, captured)
        };

        let limit = Duration::from_millis(self.config.timeout_ms);
        let outcome = timeout(limit, wait).await;
        match outcome {
            Ok((Ok(status), captured)) => self.build_result(status, &captured),
            Ok((Err(e), _)) => Err(HandlerError::new(
                code::OPERATION_FAILED,
                format!("wait {}: {}", program, e),
            )),
            Err(_) => {
                warn!(
                    dh_type = %self.dh_type,
                    timeout_ms = self.config.timeout_ms,
                    "Handler subprocess timed out"
                );
                self.kill_graceful(&mut child).await;
                Err(HandlerError::new(
                    code::TIMEOUT,
                    format!("{} did not finish within {}ms", program, self.config.timeout_ms),
                ))
            }
        }
    }

    fn build_result(
        &self,
        status: ExitStatus,
        stderr: &[u8],
    ) -> std::result::Result<(), HandlerError> {
        if status.success() {
            info!(dh_type = %self.dh_type, "Handler subprocess succeeded");
            return Ok(());
        }
        let detail = String::from_utf8_lossy(stderr).trim().to_string();
        let err = match status.code() {
            Some(exit_code) => HandlerError::new(
                exit_code,
                if detail.is_empty() {
                    format!("exited with status {}", exit_code)
                } else {
                    detail
                },
            ),
            None => HandlerError::new(code::OPERATION_FAILED, "terminated by signal"),
        };
        info!(dh_type = %self.dh_type, code = err.code, "Handler subprocess failed");
        Err(err)
    }

    /// SIGTERM first, SIGKILL once the grace period is over
    async fn kill_graceful(&self, child: &mut Child) {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            info!(pid = %pid, "Sending SIGTERM to handler subprocess");
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                let grace = Duration::from_millis(self.config.grace_ms);
                if let Ok(Ok(_)) = timeout(grace, child.wait()).await {
                    info!(pid = %pid, "Handler subprocess exited after SIGTERM");
                    return;
                }
            }
            warn!(pid = %pid, "Handler subprocess ignored SIGTERM, sending SIGKILL");
        }

        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill handler subprocess");
        }
    }
}

#[async_trait]
impl HardwareHandler for SubprocessHandler {
    async fn enable(&self, unit: &HardwareUnit) -> std::result::Result<(), HandlerError> {
        self.run(Operation::Enable, unit).await
    }

    async fn disable(&self, unit: &HardwareUnit) -> std::result::Result<(), HandlerError> {
        self.run(Operation::Disable, unit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    fn handler(enable: Vec<String>, timeout_ms: u64) -> SubprocessHandler {
        SubprocessHandler::new(
            DhType::Camera,
            SubprocessHandlerConfig {
                enable,
                disable: sh("exit 0"),
                timeout_ms,
                grace_ms: 200,
                env_allowlist: vec!["PATH".into()],
            },
        )
        .unwrap()
    }

    fn unit() -> HardwareUnit {
        HardwareUnit::new("net1", "dev1", "hw1")
    }

    #[tokio::test]
    async fn test_exit_zero_succeeds() {
        let h = handler(sh("exit 0"), 5000);
        h.enable(&unit()).await.unwrap();
        h.disable(&unit()).await.unwrap();
    }

    #[tokio::test]
    async fn test_exit_code_becomes_handler_code() {
        let h = handler(sh("echo 'camera busy' >&2; exit 3"), 5000);
        let err = h.enable(&unit()).await.unwrap_err();
        assert_eq!(err.code, 3);
        assert_eq!(err.message, "camera busy");
    }

    #[tokio::test]
    async fn test_placeholders_and_env() {
        let h = handler(
            vec![
                "sh".into(),
                "-c".into(),
                r#"test "$1" = dev1 && test "$DHFWK_DH_ID" = hw1 && test "$DHFWK_OPERATION" = enable && test -z "$SECRET_TOKEN""#.into(),
                "probe".into(),
                "{device_id}".into(),
            ],
            5000,
        );
        std::env::set_var("SECRET_TOKEN", "leak");
        h.enable(&unit()).await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let h = handler(sh("sleep 10"), 100);
        let started = std::time::Instant::now();
        let err = h.enable(&unit()).await.unwrap_err();
        assert_eq!(err.code, code::TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_program_is_operation_failed() {
        let h = handler(vec!["/nonexistent/dhfwk-handler".into()], 1000);
        let err = h.enable(&unit()).await.unwrap_err();
        assert_eq!(err.code, code::OPERATION_FAILED);
    }

    #[test]
    fn test_empty_command_rejected() {
        let result = SubprocessHandler::new(
            DhType::Audio,
            SubprocessHandlerConfig {
                enable: vec![],
                disable: sh("exit 0"),
                timeout_ms: 1000,
                grace_ms: 100,
                env_allowlist: vec![],
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
