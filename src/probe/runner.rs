// src/probe/runner.rs

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::net::TcpStream;
use tokio::process::Command;

use super::validate::ProbeAction;

/// Result of a single probe attempt, with the output shown in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success(String),
    Failure(String),
}

/// Runs individual probe attempts. Timeouts are applied by the caller.
pub trait ProbeRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        action: &'a ProbeAction,
    ) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>>;
}

/// Probes against the real OS and network.
#[derive(Debug, Clone)]
pub struct RealProbeRunner {
    client: reqwest::Client,
}

impl RealProbeRunner {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    async fn exec(&self, command: &[String]) -> ProbeOutcome {
        let Some((program, args)) = command.split_first() else {
            return ProbeOutcome::Failure("empty command".to_string());
        };

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(out) => {
                let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&out.stderr));
                let text = text.trim().to_string();
                if out.status.success() {
                    ProbeOutcome::Success(text)
                } else {
                    let code = out.status.code().unwrap_or(-1);
                    ProbeOutcome::Failure(format!("exit code {code}: {text}"))
                }
            }
            Err(e) => ProbeOutcome::Failure(format!("running {program}: {e}")),
        }
    }

    async fn http_get(&self, url: &str) -> ProbeOutcome {
        match self.client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if (200..400).contains(&status.as_u16()) {
                    ProbeOutcome::Success(format!("HTTP {} {url}", status.as_u16()))
                } else {
                    ProbeOutcome::Failure(format!("HTTP {} {url}", status.as_u16()))
                }
            }
            Err(e) => ProbeOutcome::Failure(format!("GET {url}: {e}")),
        }
    }

    async fn tcp(&self, addr: &str) -> ProbeOutcome {
        match TcpStream::connect(addr).await {
            Ok(_) => ProbeOutcome::Success(format!("connected to {addr}")),
            Err(e) => ProbeOutcome::Failure(format!("connecting to {addr}: {e}")),
        }
    }
}

impl ProbeRunner for RealProbeRunner {
    fn run<'a>(
        &'a self,
        action: &'a ProbeAction,
    ) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>> {
        Box::pin(async move {
            match action {
                ProbeAction::Exec { command } => self.exec(command).await,
                ProbeAction::HttpGet { url } => self.http_get(url).await,
                ProbeAction::TcpSocket { addr } => self.tcp(addr).await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_probe_succeeds_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let runner = RealProbeRunner::new().unwrap();

        let outcome = runner.run(&ProbeAction::TcpSocket { addr }).await;
        assert!(matches!(outcome, ProbeOutcome::Success(_)), "{outcome:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exec_probe_reports_output_and_exit_code() {
        let runner = RealProbeRunner::new().unwrap();

        let ok = runner
            .run(&ProbeAction::Exec {
                command: vec!["echo".into(), "hello".into()],
            })
            .await;
        assert_eq!(ok, ProbeOutcome::Success("hello".into()));

        let bad = runner
            .run(&ProbeAction::Exec {
                command: vec!["sh".into(), "-c".into(), "exit 3".into()],
            })
            .await;
        assert!(matches!(bad, ProbeOutcome::Failure(ref m) if m.starts_with("exit code 3")));
    }
}
