//! Resolver backed by an external program
//!
//! The program receives the repository spec as its last argument and prints a JSON
//! array of answer documents on stdout, least specific first.

use crate::error::{BookpubError, BookpubResult};
use crate::orchestration::output_with_timeout;
use crate::repo::{Answer, AnswerDocument};
use crate::resolver::Resolver;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Resolver that shells out to a configured command
pub struct CommandResolver {
    argv: Vec<String>,
    timeout_secs: u64,
}

impl CommandResolver {
    /// Create a command resolver; `argv[0]` is the program
    pub fn new(argv: Vec<String>, timeout_secs: u64) -> Self {
        Self { argv, timeout_secs }
    }

    fn failed(&self, reason: impl Into<String>) -> BookpubError {
        BookpubError::ResolverFailed {
            resolver: self.name().to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Resolver for CommandResolver {
    async fn resolve(&self, question: &str, _confirm: bool) -> BookpubResult<Vec<Answer>> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(self.failed("no command configured"));
        };

        let mut cmd = Command::new(program);
        cmd.args(args).arg(question);

        let command_line = format!("{} {}", self.argv.join(" "), question);
        debug!("Executing resolver: {}", command_line);

        let output = output_with_timeout(cmd, &command_line, self.timeout_secs)
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failed(format!("{}: {}", command_line, stderr.trim())));
        }

        let docs: Vec<AnswerDocument> = serde_json::from_slice(&output.stdout)
            .map_err(|e| self.failed(format!("unparseable output: {}", e)))?;

        Ok(docs.into_iter().map(Answer::from).collect())
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::repo::Repo;

    fn sh(script: &str) -> CommandResolver {
        CommandResolver::new(
            vec!["sh".to_string(), "-c".to_string(), script.to_string(), "resolver".to_string()],
            10,
        )
    }

    #[tokio::test]
    async fn parses_answer_documents() {
        let resolver = sh(r#"printf '[{"certainity":"MaybeExists","kind":"Git","data":{"repo":"%s","ref":"HEAD"}}]' "$1""#);
        let answers = resolver.resolve("https://example.org/book", true).await.unwrap();

        assert_eq!(
            answers,
            vec![Answer::MaybeExists(Repo::Git {
                repo: "https://example.org/book".to_string(),
                reference: "HEAD".to_string(),
            })]
        );
    }

    #[tokio::test]
    async fn empty_array_means_no_candidates() {
        let resolver = sh("echo '[]'");
        assert!(resolver.resolve("bogus/spec", true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure() {
        let resolver = sh("echo 'rate limited' >&2; exit 3");
        let err = resolver.resolve("x", true).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn garbage_output_is_failure() {
        let resolver = sh("echo not-json");
        let err = resolver.resolve("x", true).await.unwrap_err();
        assert!(matches!(err, BookpubError::ResolverFailed { .. }));
    }
}
