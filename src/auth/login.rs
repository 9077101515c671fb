use axum::{debug_handler, extract::{Path, Query, State}, response::{IntoResponse, Redirect, Response}};
use oauth2::{CsrfToken, PkceCodeChallenge, Scope};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::debug;

use crate::{flash::{self, Status}, include_res, res, session::{self, CSRF_STATE, PKCE_VERIFIER, RETURN_URL}, AppResult};

use super::{clients::ClientProvider, Clients};

#[derive(Deserialize)]
pub(crate) struct LoginQuery {
    pub(crate) return_url: Option<String>,
}

fn provider_button(clients: &Clients, provider: ClientProvider) -> String {
    if !clients.has(provider) {
        return String::new();
    }
    include_res!(str, "/pages/login_button.html")
        .replace("{name}", &provider.to_string())
        .replace("{slug}", provider.slug())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn login_page(
    State(clients): State<Clients>,
    Query(status): Query<Status>,
    session: Session,
) -> AppResult<Response> {
    if session.get::<String>(session::USER_ID).await?.is_some() {
        return Ok(Redirect::to("/feed").into_response());
    }

    let buttons = [ClientProvider::Google, ClientProvider::Github]
        .into_iter()
        .map(|provider| provider_button(&clients, provider))
        .collect::<String>();

    Ok(res::page(
        "Sign in",
        &include_res!(str, "/pages/login.html")
            .replace("{banner}", &status.banner())
            .replace("{buttons}", &buttons),
    ).into_response())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn login(
    Path(provider): Path<ClientProvider>,
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    State(clients): State<Clients>,
    session: Session,
) -> AppResult<Response> {
    let client = match clients.get_client(provider) {
        Ok(client) => client,
        Err(err) => return Ok(flash::error("/login", err).into_response()),
    };

    let (pkce_code_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (authorize_url, csrf_state) = client.authorize_url(CsrfToken::new_random)
        .add_scopes(provider.scopes().iter().map(|scope| Scope::new(scope.to_string())))
        .set_pkce_challenge(pkce_code_challenge)
        .url();

    session.insert(CSRF_STATE, csrf_state.secret()).await?;
    session.insert(PKCE_VERIFIER, pkce_verifier.secret()).await?;
    if let Some(return_url) = return_url {
        session.insert(RETURN_URL, flash::clean_redirect(&return_url)).await?;
    }

    debug!("sending a visitor to {provider}");
    Ok(Redirect::to(authorize_url.as_str()).into_response())
}
