//! Chat-style streaming view
//!
//! Keeps a linear transcript for the session. While a response streams
//! in, the partial text renders with a trailing cursor; when the stream
//! ends the completed message joins the transcript.

use wasm_bindgen_futures::spawn_local;
use web_sys::{Event, File, HtmlInputElement, HtmlTextAreaElement};
use yew::prelude::*;

use crate::api;

/// Cursor shown at the end of the still-streaming reply
const TYPING_CURSOR: char = '\u{258c}';

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry
#[derive(Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub is_error: bool,
}

impl ChatMessage {
    pub fn user(content: String) -> Self {
        Self {
            role: Role::User,
            content,
            is_error: false,
        }
    }

    /// A completed reply; streams that end in a backend failure begin
    /// with `Error` and are styled accordingly
    pub fn assistant(content: String) -> Self {
        let is_error = content.starts_with("Error");
        Self {
            role: Role::Assistant,
            content,
            is_error,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            role: Role::Assistant,
            content: message,
            is_error: true,
        }
    }
}

/// What the user typed plus any attachment name, for the transcript
fn describe_submission(attachment: Option<&str>, prompt: &str) -> String {
    match (attachment, prompt.is_empty()) {
        (Some(name), true) => format!("[image: {name}]"),
        (Some(name), false) => format!("[image: {name}] {prompt}"),
        (None, _) => prompt.to_string(),
    }
}

#[derive(Properties, PartialEq)]
pub struct ChatProps {
    pub backend_url: String,
}

#[function_component(ChatView)]
pub fn chat_view(props: &ChatProps) -> Html {
    let transcript = use_state(Vec::<ChatMessage>::new);
    // Some while a reply is streaming; holds the accumulated text
    let pending = use_state(|| None::<String>);
    let prompt = use_state(String::new);
    let file = use_state(|| None::<File>);
    let file_input_ref = use_node_ref();

    let on_file_change = {
        let file = file.clone();
        Callback::from(move |e: Event| {
            let input: HtmlInputElement = e.target_unchecked_into();
            file.set(input.files().and_then(|list| list.get(0)));
        })
    };

    let on_prompt_input = {
        let prompt = prompt.clone();
        Callback::from(move |e: InputEvent| {
            let area: HtmlTextAreaElement = e.target_unchecked_into();
            prompt.set(area.value());
        })
    };

    let on_send = {
        let transcript = transcript.clone();
        let pending = pending.clone();
        let prompt = prompt.clone();
        let file = file.clone();
        let file_input_ref = file_input_ref.clone();
        let backend_url = props.backend_url.clone();
        Callback::from(move |_: MouseEvent| {
            if pending.is_some() {
                return;
            }
            let prompt_text = prompt.trim().to_string();
            let attachment = (*file).clone();
            if prompt_text.is_empty() && attachment.is_none() {
                return;
            }

            let mut entries = (*transcript).clone();
            entries.push(ChatMessage::user(describe_submission(
                attachment.as_ref().map(|f| f.name()).as_deref(),
                &prompt_text,
            )));
            transcript.set(entries.clone());

            prompt.set(String::new());
            file.set(None);
            if let Some(input) = file_input_ref.cast::<HtmlInputElement>() {
                input.set_value("");
            }
            pending.set(Some(String::new()));

            let transcript = transcript.clone();
            let pending = pending.clone();
            let backend_url = backend_url.clone();
            spawn_local(async move {
                let progress = pending.clone();
                let outcome = api::stream_process_image(
                    &backend_url,
                    attachment.as_ref(),
                    &prompt_text,
                    move |text| progress.set(Some(text.to_string())),
                )
                .await;

                let reply = match outcome {
                    Ok(text) if !text.is_empty() => ChatMessage::assistant(text),
                    Ok(_) => ChatMessage::error("Error: the model returned no text".to_string()),
                    Err(message) => ChatMessage::error(format!("Error: {message}")),
                };
                entries.push(reply);
                transcript.set(entries);
                pending.set(None);
            });
        })
    };

    let message_class = |message: &ChatMessage| match (message.role, message.is_error) {
        (Role::User, _) => "chat-message user",
        (Role::Assistant, false) => "chat-message assistant",
        (Role::Assistant, true) => "chat-message assistant error",
    };

    html! {
        <div class="chat-view" data-testid="chat-view">
            <div class="chat-transcript" data-testid="chat-transcript">
                { for transcript.iter().map(|message| {
                    html! {
                        <div class={message_class(message)}>
                            <pre>{ message.content.clone() }</pre>
                        </div>
                    }
                })}
                if let Some(partial) = &*pending {
                    <div class="chat-message assistant streaming" data-testid="chat-streaming">
                        <pre>{ format!("{partial}{TYPING_CURSOR}") }</pre>
                    </div>
                }
            </div>
            <div class="chat-input">
                <input
                    ref={file_input_ref}
                    type="file"
                    accept="image/*"
                    onchange={on_file_change}
                    data-testid="chat-file-input"
                />
                <textarea
                    placeholder="Ask about the image, or just type a prompt"
                    value={(*prompt).clone()}
                    oninput={on_prompt_input}
                    data-testid="chat-prompt"
                />
                <button
                    onclick={on_send}
                    disabled={pending.is_some()}
                    data-testid="chat-send"
                >
                    { "Send" }
                </button>
            </div>
        </div>
    }
}
