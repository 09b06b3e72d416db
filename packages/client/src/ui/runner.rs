//! Client execution: wires the session, the chat service and the terminal together.

use std::sync::{Arc, Mutex};

use campus_chat_shared::time::SystemClock;
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use crate::{
    config::ClientConfig,
    domain::{ConversationKey, Envelope},
    infrastructure::{api::PortalApiClient, stomp::StompTransport, storage::FileStorage},
    usecase::{
        AuthUseCase, ChatCommand, ChatHandle, ChatService, ChatUpdate, ClientError, SessionStore,
    },
};

use super::{
    command::{InputCommand, parse_input},
    formatter::MessageFormatter,
    prompt::print_above_prompt,
    view::ViewState,
};

type SharedView = Arc<Mutex<ViewState>>;

/// Run the terminal chat client until `/quit`, Ctrl+C or Ctrl+D
pub async fn run_client(config: ClientConfig) -> Result<(), ClientError> {
    config.validate()?;

    let storage = Arc::new(FileStorage::new(config.storage_path.clone()));
    let api = Arc::new(
        PortalApiClient::new(config.api_url.clone())
            .map_err(|e| ClientError::Setup(e.to_string()))?,
    );
    let session = Arc::new(SessionStore::new(storage, api.clone()));
    let auth = AuthUseCase::new(api.clone(), api, session.clone());
    let transport = Arc::new(StompTransport::new(&config.ws_url)?);

    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let service = ChatService::new(transport, Arc::new(SystemClock), config, updates_tx);
    let (chat, service_task) = service.spawn(session.subscribe());

    let view: SharedView = Arc::new(Mutex::new(ViewState::new()));
    let printer = tokio::spawn(print_updates(updates_rx, view.clone()));

    match session.restore().await {
        Some(user) => tracing::info!("Restored session for {}", user.username),
        None => println!("\nNot logged in. Use /login <username> <password> to join the chat.\n"),
    }

    let mut input_rx = spawn_readline(view.clone());
    while let Some(line) = input_rx.recv().await {
        let command = match parse_input(&line) {
            Ok(InputCommand::Quit) => break,
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        if let Some(output) = handle_input(command, &chat, &auth, &view).await {
            print!("{}", output);
        }
    }

    chat.shutdown();
    if let Err(e) = service_task.await {
        tracing::warn!("Chat service task failed: {}", e);
    }
    printer.abort();
    Ok(())
}

/// Readline runs on its own thread; lines are forwarded over a channel.
fn spawn_readline(view: SharedView) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            let prompt = current_prompt(&view);
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}

fn current_prompt(view: &SharedView) -> String {
    view.lock()
        .map(|view| view.prompt())
        .unwrap_or_else(|_| "> ".to_string())
}

async fn print_updates(mut updates: mpsc::UnboundedReceiver<ChatUpdate>, view: SharedView) {
    while let Some(update) = updates.recv().await {
        let rendered = match view.lock() {
            Ok(mut view) => view.apply(update).map(|output| (output, view.prompt())),
            Err(_) => {
                tracing::error!("View state poisoned");
                break;
            }
        };
        if let Some((output, prompt)) = rendered {
            print_above_prompt(&output, &prompt);
        }
    }
}

/// Build the publish command for plain text typed into the active conversation.
fn outgoing(view: &ViewState, recipient: Option<&str>, text: &str) -> ChatCommand {
    let content = Envelope::encode(view.alias(), view.flair.key(), text);
    let recipient = recipient.map(str::to_string).or(match &view.active {
        ConversationKey::Global => None,
        ConversationKey::Private(peer) => Some(peer.clone()),
    });
    match recipient {
        Some(recipient) => ChatCommand::PublishPrivate { recipient, content },
        None => ChatCommand::PublishGlobal(content),
    }
}

async fn handle_input(
    command: InputCommand,
    chat: &ChatHandle,
    auth: &AuthUseCase,
    view: &SharedView,
) -> Option<String> {
    match command {
        InputCommand::Login { username, password } => {
            return Some(match auth.login(&username, &password).await {
                Ok(user) => format!("Logged in as {} ({}).\n", user.username, user.role),
                Err(e) => format!("{}\n", e),
            });
        }
        InputCommand::Logout => {
            return Some(match auth.logout().await {
                Ok(()) => "Logged out.\n".to_string(),
                Err(e) => format!("{}\n", e),
            });
        }
        _ => {}
    }

    let mut view = match view.lock() {
        Ok(view) => view,
        Err(_) => return Some("View state unavailable.\n".to_string()),
    };
    let me = view.username.clone().unwrap_or_default();
    match command {
        InputCommand::Say(text) => {
            chat.send(outgoing(&view, None, &text));
            None
        }
        InputCommand::PrivateMessage { recipient, text } => {
            view.active = ConversationKey::Private(recipient.clone());
            chat.send(outgoing(&view, Some(&recipient), &text));
            None
        }
        InputCommand::Open(peer) => {
            let key = ConversationKey::Private(peer);
            let history =
                MessageFormatter::format_history(&key, view.conversations.get(&key), &me);
            view.active = key;
            Some(history)
        }
        InputCommand::Global => {
            view.active = ConversationKey::Global;
            Some("Switched to the global chat.\n".to_string())
        }
        InputCommand::Alias(alias) => {
            let reply = format!("Display name set to {}.\n", alias);
            view.alias = Some(alias);
            Some(reply)
        }
        InputCommand::Flair(flair) => {
            view.flair = flair;
            Some(format!("Flair set to {}.\n", flair.label()))
        }
        InputCommand::Who => Some(MessageFormatter::format_who(
            view.connection,
            view.presence,
            view.username.as_deref(),
            view.conversations.peers(),
        )),
        InputCommand::History(peer) => {
            let key = peer
                .map(ConversationKey::Private)
                .unwrap_or_else(|| view.active.clone());
            Some(MessageFormatter::format_history(
                &key,
                view.conversations.get(&key),
                &me,
            ))
        }
        InputCommand::Help => Some(MessageFormatter::format_help()),
        InputCommand::Login { .. } | InputCommand::Logout | InputCommand::Quit => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Flair;

    fn view_for(username: &str) -> ViewState {
        ViewState {
            username: Some(username.to_string()),
            ..ViewState::default()
        }
    }

    #[test]
    fn test_outgoing_global_wraps_envelope() {
        // テスト項目: グローバルへの送信は別名とフレアでエンベロープ化される
        // given (前提条件):
        let mut view = view_for("alice");
        view.flair = Flair::Lost;

        // when (操作):
        let command = outgoing(&view, None, "lost my blue wallet");

        // then (期待する結果):
        assert_eq!(
            command,
            ChatCommand::PublishGlobal("[alice][lost] lost my blue wallet".to_string())
        );
    }

    #[test]
    fn test_outgoing_follows_active_private_chat() {
        // テスト項目: 個人チャットを開いている場合、本文はその相手に送られる
        // given (前提条件):
        let mut view = view_for("alice");
        view.alias = Some("Ali".to_string());
        view.active = ConversationKey::Private("bob".to_string());

        // when (操作):
        let command = outgoing(&view, None, "thanks!");

        // then (期待する結果):
        assert_eq!(
            command,
            ChatCommand::PublishPrivate {
                recipient: "bob".to_string(),
                content: "[Ali][regular] thanks!".to_string(),
            }
        );
    }
}
