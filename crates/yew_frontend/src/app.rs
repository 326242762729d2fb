//! Main application component
//!
//! Two views over the same backend: a form-style document view that
//! returns the whole answer at once, and a chat view that renders the
//! response as it streams in. The sidebar owns the backend URL and the
//! health probe.

use yew::prelude::*;

use crate::components::chat::ChatView;
use crate::components::document::DocumentView;
use crate::components::sidebar::Sidebar;

/// Which main panel is showing
#[derive(Clone, Copy, PartialEq)]
enum View {
    Document,
    Chat,
}

#[function_component(App)]
pub fn app() -> Html {
    let backend_url = use_state(|| "http://localhost:8000".to_string());
    let view = use_state(|| View::Chat);

    let on_backend_url_change = {
        let backend_url = backend_url.clone();
        Callback::from(move |url: String| backend_url.set(url))
    };

    let tab = |target: View, label: &str| {
        let view = view.clone();
        let class = if *view == target { "tab active" } else { "tab" };
        let onclick = Callback::from(move |_| view.set(target));
        html! { <button {class} {onclick}>{ label }</button> }
    };

    html! {
        <div class="app">
            <header class="app-header">
                <h1>{ "visionchat" }</h1>
                <p>{ "Image + prompt -> text, via a local vision-language model" }</p>
                <nav class="app-tabs">
                    { tab(View::Chat, "Chat") }
                    { tab(View::Document, "Document") }
                </nav>
            </header>
            <div class="app-body">
                <Sidebar
                    backend_url={(*backend_url).clone()}
                    on_backend_url_change={on_backend_url_change}
                />
                <main class="app-main">
                    if *view == View::Chat {
                        <ChatView backend_url={(*backend_url).clone()} />
                    } else {
                        <DocumentView backend_url={(*backend_url).clone()} />
                    }
                </main>
            </div>
        </div>
    }
}
