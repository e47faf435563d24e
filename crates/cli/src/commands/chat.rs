//! `recurchat chat`: Interactive or single-message chat mode.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use recurchat_config::AppConfig;
use recurchat_core::backend::SamplingConfig;
use recurchat_core::turn::{History, SessionId};
use recurchat_session::{TranscriptLog, TurnOutcome, TurnRunner};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{info, info_span, warn, Instrument};

/// Command-line overrides for a chat session.
pub struct ChatArgs {
    pub message: Option<String>,
    pub context: Option<PathBuf>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// One conversation: the runner, the history so far, and where turns go.
struct ChatSession {
    runner: TurnRunner,
    sampling: SamplingConfig,
    document: Option<PathBuf>,
    transcript: Option<TranscriptLog>,
    history: History,
}

impl ChatSession {
    /// Run one turn and, on success, keep the new history and log the turn.
    ///
    /// A transcript write failure is reported but does not undo the turn.
    async fn send(&mut self, utterance: &str) -> recurchat_core::Result<TurnOutcome> {
        let outcome = self
            .runner
            .run_turn(&self.history, utterance, &self.sampling, self.document.as_deref())
            .await?;

        if let (Some(log), Some(turn)) = (&self.transcript, outcome.turn()) {
            if let Err(e) = log.append(turn).await {
                warn!(error = %e, "Failed to write transcript");
            }
        }

        self.history = outcome.history.clone();
        Ok(outcome)
    }
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let sampling = SamplingConfig::new(args.model.unwrap_or_else(|| config.default_model.clone()))
        .with_temperature(args.temperature.unwrap_or(config.default_temperature))
        .with_max_tokens(args.max_tokens.unwrap_or(config.default_max_tokens));

    if !(0.0..=2.0).contains(&sampling.temperature) {
        return Err("temperature must be between 0.0 and 2.0".into());
    }
    if sampling.max_tokens == 0 {
        return Err("max tokens must be > 0".into());
    }

    // Local models load synchronously and can take a while.
    eprint!("  Loading models...");
    let registry = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || recurchat_backends::build_from_config(&config)).await?
    };
    eprint!("\r                    \r");

    if registry.get(&sampling.model).is_none() {
        eprintln!(
            "  Warning: model '{}' is not loaded; run `recurchat models` for details.",
            sampling.model
        );
    }

    let runner = TurnRunner::from_config(&config, Arc::new(registry));
    let document = args.context.or_else(|| config.context.file.clone());
    let transcript = config
        .transcript
        .enabled
        .then(|| TranscriptLog::new(config.transcript.path.clone()));

    let mut session = ChatSession {
        runner,
        sampling,
        document,
        transcript,
        history: History::new(),
    };

    let session_id = SessionId::new();
    let span = info_span!("session", id = %session_id);

    match args.message {
        Some(msg) => single(&mut session, &msg).instrument(span).await,
        None => interactive(&mut session).instrument(span).await,
    }
}

async fn single(session: &mut ChatSession, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    eprint!("  Thinking...");
    let outcome = session.send(message).await;
    eprint!("\r              \r");

    let outcome = outcome?;
    print_snippet(&outcome.snippet);
    println!("{}", outcome.reply);
    Ok(())
}

async fn interactive(session: &mut ChatSession) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        recurchat — Interactive Mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", session.sampling.model);
    println!(
        "  Context:   {}",
        session
            .document
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".into())
    );
    if let Some(log) = &session.transcript {
        println!("  Log:       {}", log.path().display());
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    info!("Chat session started");

    let mut lines = BufReader::new(io::stdin()).lines();

    prompt_user()?;
    while let Some(line) = lines.next_line().await? {
        let Some(utterance) = utterance_from(&line) else {
            break;
        };

        eprint!("  ...");
        match session.send(utterance).await {
            Ok(outcome) => {
                eprint!("\r     \r");
                println!();
                print_snippet(&outcome.snippet);
                for reply_line in outcome.reply.lines() {
                    println!("  Assistant > {reply_line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        prompt_user()?;
    }

    info!(turns = session.history.len(), "Chat session ended");

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn prompt_user() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_snippet(snippet: &str) {
    if snippet.is_empty() {
        return;
    }
    println!("  Context:");
    for line in snippet.lines() {
        println!("  | {line}");
    }
    println!();
}

fn is_exit_command(line: &str) -> bool {
    matches!(line.trim(), "exit" | "quit" | "/exit" | "/quit" | ":q")
}

/// The utterance to send for an input line, or `None` to end the session.
///
/// Lines go to the model exactly as typed. An empty line is still a query,
/// and it pulls every document line into the context.
fn utterance_from(line: &str) -> Option<&str> {
    if is_exit_command(line) {
        None
    } else {
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_commands() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("quit"));
        assert!(is_exit_command(":q"));
        assert!(is_exit_command("  quit \t"));
        assert!(!is_exit_command("exit now"));
        assert!(!is_exit_command("EXIT please"));
    }

    #[test]
    fn input_lines_are_sent_untrimmed() {
        assert_eq!(utterance_from("  what about the cat? "), Some("  what about the cat? "));
        assert_eq!(utterance_from(""), Some(""));
        assert_eq!(utterance_from("   "), Some("   "));
        assert_eq!(utterance_from(" exit "), None);
    }
}
