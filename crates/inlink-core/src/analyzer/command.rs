//! Analyzer that runs a shell command once per page.
//!
//! The page URL comes from `config["pages"][index]`; the command from
//! `config["command"]`, falling back to the configured default. The command
//! prints one JSON object per line on stdout, each becoming a result row.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::checkpoint::ResultRow;
use crate::config::AnalyzerConfig;
use crate::job_store::JobConfig;

use super::{AnalyzeError, PageAnalyzer, Unit};

/// Exit status a command uses to abort the whole job.
pub const FATAL_EXIT_CODE: i32 = 100;

const STDERR_TAIL_BYTES: usize = 500;

pub struct CommandAnalyzer {
    default_command: Option<String>,
    timeout: Duration,
}

impl CommandAnalyzer {
    pub fn new(default_command: Option<String>, timeout: Duration) -> Self {
        Self {
            default_command,
            timeout,
        }
    }

    pub fn from_config(cfg: &AnalyzerConfig) -> Self {
        Self::new(cfg.command.clone(), cfg.timeout())
    }

    fn command_for<'a>(&'a self, config: &'a JobConfig) -> Result<&'a str, AnalyzeError> {
        config
            .get_str("command")
            .or(self.default_command.as_deref())
            .ok_or_else(|| AnalyzeError::fatal("no analyzer command configured"))
    }
}

fn page_url<'a>(config: &'a JobConfig, index: u64) -> Result<&'a str, AnalyzeError> {
    config
        .get("pages")
        .and_then(|pages| pages.as_array())
        .and_then(|pages| pages.get(index as usize))
        .and_then(|page| page.as_str())
        .ok_or_else(|| AnalyzeError::fatal(format!("job config has no page {index}")))
}

#[async_trait]
impl PageAnalyzer for CommandAnalyzer {
    async fn process(&self, unit: &Unit, config: &JobConfig) -> Result<Vec<ResultRow>, AnalyzeError> {
        let url = page_url(config, unit.index)?;
        let command = self.command_for(config)?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .arg("inlink-analyze")
            .arg(url)
            .env("INLINK_JOB_ID", unit.job_id.as_str())
            .env("INLINK_UNIT_INDEX", unit.index.to_string())
            .env("INLINK_TOTAL_UNITS", unit.total.to_string())
            .env("INLINK_PAGE_URL", url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(job_id = %unit.job_id, unit = unit.index, url, "running analyzer command");
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result
                .map_err(|e| AnalyzeError::fatal(format!("spawn analyzer command: {e}")))?,
            Err(_) => {
                return Err(AnalyzeError::recoverable(format!(
                    "{url}: timed out after {}s",
                    self.timeout.as_secs_f64()
                )))
            }
        };

        match output.status.code() {
            Some(0) => parse_rows(&output.stdout)
                .map_err(|reason| AnalyzeError::recoverable(format!("{url}: {reason}"))),
            Some(FATAL_EXIT_CODE) => Err(AnalyzeError::fatal(format!(
                "{url}: command exited with {FATAL_EXIT_CODE}: {}",
                stderr_tail(&output.stderr)
            ))),
            Some(code) => Err(AnalyzeError::recoverable(format!(
                "{url}: command exited with {code}: {}",
                stderr_tail(&output.stderr)
            ))),
            None => Err(AnalyzeError::fatal(format!(
                "{url}: command killed by signal"
            ))),
        }
    }
}

fn parse_rows(stdout: &[u8]) -> Result<Vec<ResultRow>, String> {
    let text = std::str::from_utf8(stdout).map_err(|e| format!("stdout is not UTF-8: {e}"))?;
    text.lines()
        .map(str::trim)
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<ResultRow>(line)
                .map_err(|e| format!("stdout line {}: {e}", i + 1))
        })
        .collect()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let mut start = text.len().saturating_sub(STDERR_TAIL_BYTES);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::job_store::JobId;

    fn unit(index: u64) -> Unit {
        Unit {
            job_id: JobId::parse("cmd-test").unwrap(),
            index,
            total: 2,
        }
    }

    fn config(command: &str) -> JobConfig {
        JobConfig::new()
            .with("pages", serde_json::json!(["https://a.test/", "https://b.test/"]))
            .with("command", command)
    }

    fn analyzer() -> CommandAnalyzer {
        CommandAnalyzer::new(None, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn stdout_lines_become_rows() {
        let cfg = config(
            r#"printf '{"source_url":"%s","target_url":"/x"}\n\n{"source_url":"%s","target_url":"/y"}\n' "$1" "$INLINK_PAGE_URL""#,
        );
        let rows = analyzer().process(&unit(1), &cfg).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].get("source_url").and_then(|v| v.as_str()),
            Some("https://b.test/")
        );
        assert_eq!(rows[1].get("target_url").and_then(|v| v.as_str()), Some("/y"));
    }

    #[tokio::test]
    async fn env_describes_unit() {
        let cfg = config(r#"printf '{"job":"%s","unit":"%s","total":"%s"}\n' "$INLINK_JOB_ID" "$INLINK_UNIT_INDEX" "$INLINK_TOTAL_UNITS""#);
        let rows = analyzer().process(&unit(0), &cfg).await.unwrap();
        let row = &rows[0];
        assert_eq!(row.get("job").and_then(|v| v.as_str()), Some("cmd-test"));
        assert_eq!(row.get("unit").and_then(|v| v.as_str()), Some("0"));
        assert_eq!(row.get("total").and_then(|v| v.as_str()), Some("2"));
    }

    #[tokio::test]
    async fn ordinary_failure_is_recoverable() {
        let err = analyzer()
            .process(&unit(0), &config("echo 'HTTP 404' >&2; exit 3"))
            .await
            .unwrap_err();
        match err {
            AnalyzeError::Recoverable(reason) => {
                assert!(reason.contains("exited with 3"), "{reason}");
                assert!(reason.contains("HTTP 404"), "{reason}");
            }
            other => panic!("expected recoverable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exit_100_is_fatal() {
        let err = analyzer()
            .process(&unit(0), &config("exit 100"))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn invalid_json_line_is_recoverable() {
        let err = analyzer()
            .process(&unit(0), &config("echo 'not json'"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::Recoverable(_)));
    }

    #[tokio::test]
    async fn timeout_is_recoverable() {
        let analyzer = CommandAnalyzer::new(None, Duration::from_millis(100));
        let err = analyzer
            .process(&unit(0), &config("sleep 5"))
            .await
            .unwrap_err();
        match err {
            AnalyzeError::Recoverable(reason) => assert!(reason.contains("timed out"), "{reason}"),
            other => panic!("expected recoverable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_page_or_command_is_fatal() {
        let err = analyzer()
            .process(&unit(5), &config("true"))
            .await
            .unwrap_err();
        assert!(err.is_fatal());

        let no_command = JobConfig::new().with("pages", serde_json::json!(["https://a.test/"]));
        let err = analyzer().process(&unit(0), &no_command).await.unwrap_err();
        assert!(err.is_fatal());

        let with_default = CommandAnalyzer::new(Some("true".into()), Duration::from_secs(10));
        assert!(with_default.process(&unit(0), &no_command).await.unwrap().is_empty());
    }

    #[test]
    fn stderr_tail_keeps_the_end() {
        let long = "x".repeat(600) + "END";
        let tail = stderr_tail(long.as_bytes());
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
        assert!(tail.ends_with("END"));
    }
}
