use axum::{debug_handler, extract::{Path, Query, State}, response::{IntoResponse, Redirect, Response}};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, TokenResponse};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;

use crate::{db, flash, session::{CSRF_STATE, PKCE_VERIFIER, RETURN_URL, USER_ID}, AppResult, AppState, GetField};

use super::{clients::ClientProvider, Clients};

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// Asks the provider who the access token belongs to.
async fn fetch_user_id(http_client: &reqwest::Client, provider: ClientProvider, access_token: &str) -> AppResult<String> {
    let request = match provider {
        ClientProvider::Google => http_client.get("https://www.googleapis.com/oauth2/v2/userinfo"),
        ClientProvider::Github => http_client
            .get("https://api.github.com/user")
            .header(ACCEPT, "application/vnd.github+json"),
    };

    let body: serde_json::Value = request
        .bearer_auth(access_token)
        .header(USER_AGENT, "pack")
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(format!("{}:{}", provider.slug(), body.get_str_field("id")?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn lockin(
    Path(provider): Path<ClientProvider>,
    Query(LockinQuery { state, code }): Query<LockinQuery>,
    State(db_pool): State<SqlitePool>,
    State(clients): State<Clients>,
    session: Session,
) -> AppResult<Response> {
    let state = CsrfToken::new(state.ok_or("OAuth: without state")?);
    let code = AuthorizationCode::new(code.ok_or("OAuth: without code")?);

    let Some(stored_state) = session.remove::<String>(CSRF_STATE).await? else {
        return Err("no csrf_state")?;
    };

    if state.secret().as_str() != stored_state.as_str() {
        return Err("csrf tokens don't match")?;
    }

    let Some(pkce_verifier) = session.remove::<String>(PKCE_VERIFIER).await? else {
        return Err("no pkce_verifier")?;
    };

    let client = clients.get_client(provider)?;
    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let token_result = client
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await?;

    let user_id = fetch_user_id(&http_client, provider, token_result.access_token().secret()).await?;
    session.cycle_id().await?;
    session.insert(USER_ID, user_id.clone()).await?;

    let return_url = session.remove::<String>(RETURN_URL).await?;

    Ok(match db::Profile::find(&db_pool, &user_id).await? {
        Some(profile) => {
            info!("welcome back {user_id}, {}", profile.display_alias());
            let return_url = return_url.unwrap_or_else(|| "/feed".to_owned());
            Redirect::to(flash::clean_redirect(&return_url))
        }
        None => {
            info!("new user {user_id}");
            Redirect::to("/onboarding")
        }
    }.into_response())
}
