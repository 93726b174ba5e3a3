//! Interactive CLI transport.
//!
//! Reads one line, sends it through the orchestrator, prints one reply.
//! Local commands starting with `/` are handled before anything reaches
//! the gateway, so `/status` works even while a message is in flight
//! elsewhere.

use colored::Colorize;
use crossbar_application::{ProcessMessageUseCase, error_reply};
use crossbar_domain::{ConversationId, InboundMessage};
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::sync::Arc;

/// Interactive gateway REPL
pub struct GatewayRepl {
    use_case: Arc<ProcessMessageUseCase>,
    conversation_id: ConversationId,
}

impl GatewayRepl {
    pub fn new(use_case: Arc<ProcessMessageUseCase>) -> Self {
        let peer = std::env::var("USER").unwrap_or_else(|_| "local".to_string());
        Self {
            use_case,
            conversation_id: ConversationId::cli(peer),
        }
    }

    /// Run the interactive loop until `/quit` or EOF.
    pub async fn run(&self) -> RlResult<()> {
        let mut rl = DefaultEditor::new()?;

        let history_path = dirs::data_dir().map(|p| p.join("crossbar").join("history.txt"));
        if let Some(ref path) = history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(path);
        }

        self.print_welcome();

        loop {
            match rl.readline(">>> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line.starts_with('/') {
                        if self.handle_command(line).await {
                            break;
                        }
                        continue;
                    }

                    let _ = rl.add_history_entry(line);
                    self.process_line(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(ref path) = history_path {
            let _ = rl.save_history(path);
        }

        Ok(())
    }

    async fn process_line(&self, line: &str) {
        let inbound = InboundMessage::new(self.conversation_id.clone(), line);
        match self.use_case.execute(inbound).await {
            Ok(outbound) => println!("{}", outbound.reply),
            Err(e) => println!("{}", error_reply(&e).yellow()),
        }
    }

    /// Returns `true` when the REPL should exit.
    async fn handle_command(&self, command: &str) -> bool {
        match command {
            "/quit" | "/exit" => {
                println!("Bye!");
                true
            }
            "/status" => {
                let active = self.use_case.store().active_count().await;
                let snapshot = self.use_case.stats().snapshot(active);
                println!(
                    "uptime: {}s, messages: {}, errors: {}, active conversations: {}",
                    snapshot.uptime_seconds,
                    snapshot.total_messages,
                    snapshot.errors,
                    snapshot.active_conversations,
                );
                false
            }
            "/help" => {
                self.print_help();
                false
            }
            other => {
                println!("Unknown command: {} (try /help)", other);
                false
            }
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "crossbar - interactive mode".bold());
        println!("Type a message, or /help for commands.");
        println!();
    }

    fn print_help(&self) {
        println!("Commands:");
        println!("  /help    show this help");
        println!("  /status  gateway counters");
        println!("  /quit    exit");
    }
}
