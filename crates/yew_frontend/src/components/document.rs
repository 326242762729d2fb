//! Form-style document view
//!
//! One image, one optional prompt, one complete answer. Submission is
//! disabled until an image is chosen, and the finished text can be
//! downloaded as a markdown file.

use base64::{engine::general_purpose, Engine as _};
use wasm_bindgen_futures::spawn_local;
use web_sys::{Event, File, HtmlInputElement, HtmlTextAreaElement};
use yew::prelude::*;

use crate::api;

#[derive(Properties, PartialEq)]
pub struct DocumentProps {
    pub backend_url: String,
}

/// Request lifecycle for the form
#[derive(Clone, PartialEq, Debug)]
enum Phase {
    Idle,
    Awaiting,
    Rendered(String),
    Errored(String),
}

/// Data URL carrying the generated text, for the download link
fn download_href(text: &str) -> String {
    format!(
        "data:text/markdown;base64,{}",
        general_purpose::STANDARD.encode(text)
    )
}

#[function_component(DocumentView)]
pub fn document_view(props: &DocumentProps) -> Html {
    let file = use_state(|| None::<File>);
    let prompt = use_state(String::new);
    let phase = use_state(|| Phase::Idle);

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

    let on_submit = {
        let file = file.clone();
        let prompt = prompt.clone();
        let phase = phase.clone();
        let backend_url = props.backend_url.clone();
        Callback::from(move |_: MouseEvent| {
            let Some(upload) = (*file).clone() else {
                return;
            };
            if *phase == Phase::Awaiting {
                return;
            }
            let prompt_text = (*prompt).clone();
            let backend_url = backend_url.clone();
            let phase = phase.clone();
            phase.set(Phase::Awaiting);
            spawn_local(async move {
                match api::process_image(&backend_url, &upload, &prompt_text).await {
                    Ok(text) => phase.set(Phase::Rendered(text)),
                    Err(message) => phase.set(Phase::Errored(message)),
                }
            });
        })
    };

    let submit_disabled = file.is_none() || *phase == Phase::Awaiting;

    html! {
        <div class="document-view" data-testid="document-view">
            <h2>{ "Process a document" }</h2>
            <input
                type="file"
                accept="image/*"
                onchange={on_file_change}
                data-testid="document-file-input"
            />
            <textarea
                placeholder="Optional instructions for the model"
                value={(*prompt).clone()}
                oninput={on_prompt_input}
                data-testid="document-prompt"
            />
            <button
                onclick={on_submit}
                disabled={submit_disabled}
                data-testid="document-submit"
            >
                { if *phase == Phase::Awaiting { "Processing..." } else { "Process image" } }
            </button>
            {
                match &*phase {
                    Phase::Idle | Phase::Awaiting => html! {},
                    Phase::Rendered(text) => html! {
                        <div class="document-result" data-testid="document-result">
                            <h3>{ "Result" }</h3>
                            <pre class="markdown-body">{ text.clone() }</pre>
                            <a
                                href={download_href(text)}
                                download="response.md"
                                data-testid="document-download"
                            >
                                { "Download response" }
                            </a>
                        </div>
                    },
                    Phase::Errored(message) => html! {
                        <div class="document-error" data-testid="document-error">
                            <p>{ format!("Request failed: {message}") }</p>
                        </div>
                    },
                }
            }
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_href_encodes_text() {
        let href = download_href("# Title\n\nred square");
        assert!(href.starts_with("data:text/markdown;base64,"));
        let payload = href.rsplit(',').next().unwrap();
        let decoded = general_purpose::STANDARD.decode(payload).unwrap();
        assert_eq!(decoded, b"# Title\n\nred square");
    }

    #[test]
    fn test_phase_transitions_are_distinct() {
        assert_ne!(Phase::Idle, Phase::Awaiting);
        assert_ne!(
            Phase::Rendered("a".into()),
            Phase::Errored("a".into())
        );
    }
}
