use clap::{Args, Subcommand};
use fitnesse_client::{
    ClientError, CoachSession, Delivery, MessageExchange, Reconciled, SendOutcome, Surface,
    ThreadMessage,
};
use fitnesse_core::agent::AgentIdentity;
use fitnesse_core::chat::Role;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::util::{
    EXIT_CLIENT, EXIT_OK, EXIT_USAGE, print_json, report, report_client_error, status_exit_code,
};

#[derive(Args, Clone)]
pub struct ChatTarget {
    /// Talk to one agent directly (onboarding, coordinator, nutritionist, trainer)
    #[arg(long, conflicts_with = "surface")]
    agent: Option<AgentIdentity>,
    /// App surface whose agent to use (home, nutrition, training). Defaults to home.
    #[arg(long)]
    surface: Option<Surface>,
    /// With --agent: stay on that agent even if the server hands off
    #[arg(long, requires = "agent")]
    locked: bool,
}

#[derive(Subcommand)]
pub enum ChatCommands {
    /// Send one message and print the reply
    Send {
        #[command(flatten)]
        target: ChatTarget,
        /// Message text
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Print the transcript of the target agent's conversation
    History {
        #[command(flatten)]
        target: ChatTarget,
    },
    /// List persisted conversation ids per agent
    Sessions,
    /// Interactive chat on stdin
    Repl {
        #[command(flatten)]
        target: ChatTarget,
    },
}

pub async fn run(session: &CoachSession, command: ChatCommands) -> i32 {
    match command {
        ChatCommands::Send { target, message } => {
            send(session, &target, &message.join(" ")).await
        }
        ChatCommands::History { target } => history(session, &target).await,
        ChatCommands::Sessions => sessions(session),
        ChatCommands::Repl { target } => repl(session, &target).await,
    }
}

async fn open_exchange(
    session: &CoachSession,
    target: &ChatTarget,
) -> Result<MessageExchange, ClientError> {
    match target.agent {
        Some(agent) => Ok(session.exchange(agent, target.locked)),
        None => session.surface(target.surface.unwrap_or(Surface::Home)).await,
    }
}

async fn send(session: &CoachSession, target: &ChatTarget, message: &str) -> i32 {
    let exchange = match open_exchange(session, target).await {
        Ok(exchange) => exchange,
        Err(err) => return report_client_error(&err),
    };
    if let Err(err) = exchange.load().await {
        tracing::warn!(error = %err, "could not load earlier messages");
    }
    match exchange.submit(message).await {
        Ok(SendOutcome::Reconciled(reconciled)) => {
            print_json(&reconciled_json(&reconciled, exchange.active()))
        }
        Ok(SendOutcome::RolledBack { reason, status, .. }) => {
            report("send_failed", &reason, None, status_exit_code(status))
        }
        Err(err) => report("cli_error", &err.to_string(), None, EXIT_CLIENT),
    }
}

async fn history(session: &CoachSession, target: &ChatTarget) -> i32 {
    let exchange = match open_exchange(session, target).await {
        Ok(exchange) => exchange,
        Err(err) => return report_client_error(&err),
    };
    match exchange.load().await {
        Ok(messages) => print_json(&json!({
            "agent": exchange.active(),
            "conversation_id": session.conversations().conversation_id(exchange.active()),
            "messages": thread_json(&messages),
        })),
        Err(err) => report_client_error(&err),
    }
}

fn sessions(session: &CoachSession) -> i32 {
    let conversations: serde_json::Map<String, serde_json::Value> = session
        .sessions()
        .entries()
        .into_iter()
        .map(|(agent, id)| (agent.as_str().to_string(), json!(id)))
        .collect();
    print_json(&json!({
        "durable": session.sessions().is_durable(),
        "conversations": conversations,
    }))
}

async fn repl(session: &CoachSession, target: &ChatTarget) -> i32 {
    let exchange = match open_exchange(session, target).await {
        Ok(exchange) => exchange,
        Err(err) => return report_client_error(&err),
    };
    print_transcript(&exchange).await;
    eprintln!(
        "Chatting with the {} agent{}. Type /agent <name> to switch, /quit to leave.",
        exchange.active(),
        if exchange.is_locked() { " (locked)" } else { "" }
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{}> ", exchange.active());
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                let message = format!("failed to read stdin: {err}");
                return report("cli_error", &message, None, EXIT_USAGE);
            }
        };
        match parse_repl_input(&line) {
            ReplInput::Empty => {}
            ReplInput::Quit => break,
            ReplInput::Invalid(message) => eprintln!("{message}"),
            ReplInput::Switch(agent) => {
                if exchange.switch_to(agent) {
                    print_transcript(&exchange).await;
                } else {
                    eprintln!("This chat is locked to the {} agent.", exchange.active());
                }
            }
            ReplInput::Message(text) => match exchange.submit(&text).await {
                Ok(SendOutcome::Reconciled(reconciled)) => {
                    println!("{}: {}", reconciled.agent, reconciled.assistant_message.content);
                    if let Some(next) = reconciled.handoff {
                        eprintln!("(now talking to the {next} agent)");
                        print_transcript(&exchange).await;
                    }
                }
                Ok(SendOutcome::RolledBack { reason, .. }) => eprintln!("Send failed: {reason}"),
                Err(err) => eprintln!("{err}"),
            },
        }
    }
    EXIT_OK
}

async fn print_transcript(exchange: &MessageExchange) {
    let messages = match exchange.load().await {
        Ok(messages) => messages,
        Err(err) => {
            tracing::warn!(error = %err, "could not load earlier messages");
            exchange.messages()
        }
    };
    for entry in &messages {
        println!("{}", transcript_line(exchange.active(), entry));
    }
}

#[derive(Debug, PartialEq)]
enum ReplInput {
    Empty,
    Quit,
    Switch(AgentIdentity),
    Invalid(String),
    Message(String),
}

fn parse_repl_input(line: &str) -> ReplInput {
    let line = line.trim();
    if line.is_empty() {
        return ReplInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ReplInput::Message(line.to_string());
    };
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map(|(name, arg)| (name, arg.trim()))
        .unwrap_or((command, ""));
    match name {
        "quit" | "exit" => ReplInput::Quit,
        "agent" => match arg.parse::<AgentIdentity>() {
            Ok(agent) => ReplInput::Switch(agent),
            Err(err) => ReplInput::Invalid(err.to_string()),
        },
        other => ReplInput::Invalid(format!("unknown command '/{other}'")),
    }
}

fn delivery_label(delivery: Delivery) -> &'static str {
    match delivery {
        Delivery::Persisted => "persisted",
        Delivery::Pending => "pending",
        Delivery::Failed => "failed",
    }
}

fn transcript_line(agent: AgentIdentity, entry: &ThreadMessage) -> String {
    let speaker = match entry.message.role {
        Role::User => "you".to_string(),
        Role::Assistant => agent.to_string(),
        Role::System => "system".to_string(),
    };
    match entry.delivery {
        Delivery::Persisted => format!("{speaker}: {}", entry.message.content),
        other => format!("{speaker} [{}]: {}", delivery_label(other), entry.message.content),
    }
}

fn thread_json(messages: &[ThreadMessage]) -> serde_json::Value {
    messages
        .iter()
        .map(|entry| {
            json!({
                "id": entry.message.id,
                "role": entry.message.role,
                "content": entry.message.content,
                "created_at": entry.message.created_at,
                "delivery": delivery_label(entry.delivery),
            })
        })
        .collect()
}

fn reconciled_json(reconciled: &Reconciled, active: AgentIdentity) -> serde_json::Value {
    json!({
        "agent": reconciled.agent,
        "active_agent": active,
        "handoff": reconciled.handoff,
        "conversation_id": reconciled.conversation_id,
        "new_conversation": reconciled.new_conversation,
        "user_message": reconciled.user_message,
        "assistant_message": reconciled.assistant_message,
        "metadata": reconciled.metadata,
    })
}
