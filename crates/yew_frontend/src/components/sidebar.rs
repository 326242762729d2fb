//! Sidebar: backend settings and health probe

use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::api;

#[derive(Properties, PartialEq)]
pub struct SidebarProps {
    pub backend_url: String,
    pub on_backend_url_change: Callback<String>,
}

/// Outcome of the last on-demand health probe
#[derive(Clone, PartialEq)]
enum HealthState {
    Unchecked,
    Checking,
    Healthy(String),
    Unhealthy(String),
}

#[function_component(Sidebar)]
pub fn sidebar(props: &SidebarProps) -> Html {
    let health = use_state(|| HealthState::Unchecked);

    let on_url_input = {
        let on_change = props.on_backend_url_change.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            on_change.emit(input.value());
        })
    };

    let on_check_health = {
        let health = health.clone();
        let backend_url = props.backend_url.clone();
        Callback::from(move |_: MouseEvent| {
            let health = health.clone();
            let backend_url = backend_url.clone();
            health.set(HealthState::Checking);
            spawn_local(async move {
                match api::check_health(&backend_url).await {
                    Ok(body) => health.set(HealthState::Healthy(body)),
                    Err(message) => health.set(HealthState::Unhealthy(message)),
                }
            });
        })
    };

    html! {
        <aside class="sidebar" data-testid="sidebar">
            <h2>{ "Settings" }</h2>
            <label for="backend-url">{ "Backend URL" }</label>
            <input
                id="backend-url"
                type="text"
                value={props.backend_url.clone()}
                oninput={on_url_input}
                data-testid="backend-url-input"
            />
            <button
                onclick={on_check_health}
                disabled={*health == HealthState::Checking}
                data-testid="health-button"
            >
                { "Check API health" }
            </button>
            <div class="health-status" data-testid="health-status">
                {
                    match &*health {
                        HealthState::Unchecked => html! {},
                        HealthState::Checking => html! { <p>{ "Checking..." }</p> },
                        HealthState::Healthy(body) => html! {
                            <p class="healthy">{ format!("API healthy: {body}") }</p>
                        },
                        HealthState::Unhealthy(message) => html! {
                            <p class="unhealthy">{ format!("API unreachable: {message}") }</p>
                        },
                    }
                }
            </div>
            <div class="sidebar-about">
                <p>{ "Upload an image, add an optional prompt, and the backend's vision-language model replies with text." }</p>
            </div>
        </aside>
    }
}
