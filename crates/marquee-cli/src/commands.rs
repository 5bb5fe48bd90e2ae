/*
[INPUT]:  Parsed CLI subcommands, a connected `ApiClient`, shutdown token
[OUTPUT]: Sign-in/out flows, status reports, authenticated fetches, watch mode
[POS]:    Binary command layer - thin UI over the session crate
[UPDATE]: When adding subcommands or changing their output
*/

use anyhow::{Context, Result};
use console::style;
use marquee_session::{
    ApiClient, AuthState, LoginRequest, SessionError, SignUpRequest, TokenMonitor, TokenStatus,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::navigator::TerminalNavigator;

pub async fn login(client: &ApiClient, navigator: &TerminalNavigator, request: LoginRequest) -> Result<()> {
    navigator.visit("/auth/signin");
    let state = client
        .sign_in(&request)
        .await
        .map_err(describe)
        .context("sign in")?;
    println!("{}", render_state(&state));
    Ok(())
}

pub async fn signup(client: &ApiClient, navigator: &TerminalNavigator, request: SignUpRequest) -> Result<()> {
    navigator.visit("/auth/signup");
    let state = client
        .sign_up(&request)
        .await
        .map_err(describe)
        .context("sign up")?;
    println!("{}", render_state(&state));
    Ok(())
}

pub async fn logout(client: &ApiClient) -> Result<()> {
    client.sign_out().await.map_err(describe).context("sign out")?;
    println!("{}", style("Signed out.").green());
    Ok(())
}

pub fn status(client: &ApiClient) -> Result<()> {
    let manager = client.manager();
    println!("{}", render_state(&manager.auth_state()));
    println!("{}", render_status(&manager.status()));
    Ok(())
}

/// Force a refresh exchange now
pub async fn refresh(client: &ApiClient) -> Result<()> {
    client
        .manager()
        .refresh()
        .await
        .map_err(|err| describe(SessionError::from(err)))
        .context("refresh credentials")?;
    println!("{}", style("Credentials refreshed.").green());
    println!("{}", render_status(&client.manager().status()));
    Ok(())
}

/// Authenticated GET, printing the JSON body
pub async fn get(client: &ApiClient, navigator: &TerminalNavigator, endpoint: &str) -> Result<()> {
    navigator.visit(endpoint);
    let body: serde_json::Value = client
        .get(endpoint)
        .await
        .map_err(describe)
        .with_context(|| format!("GET {endpoint}"))?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

/// Let a pending sign-in redirect run before the process exits
pub async fn finish(client: &ApiClient) {
    client.manager().wait_for_redirect().await;
}

/// Keep the session fresh in the background and print every auth state change
pub async fn watch(client: &ApiClient, shutdown: CancellationToken) -> Result<()> {
    let manager = client.manager().clone();
    println!("{}", render_state(&manager.auth_state()));

    let subscription = manager.notifier().listen(|state| {
        println!("{}", render_state(state));
    });
    let monitor = TokenMonitor::new(manager.clone()).spawn(shutdown.clone());
    info!("watching session; press Ctrl+C to stop");

    shutdown.cancelled().await;
    subscription.unsubscribe().await;
    monitor.await.context("join token monitor")?;
    Ok(())
}

pub fn render_state(state: &AuthState) -> String {
    if !state.is_authenticated {
        return format!("{}", style("Not signed in").yellow());
    }
    match &state.current_user {
        Some(user) => format!(
            "{} {} <{}> ({:?})",
            style("Signed in as").green(),
            user.name,
            user.email,
            user.role
        ),
        None => format!("{}", style("Signed in (profile not loaded)").green()),
    }
}

pub fn render_status(status: &TokenStatus) -> String {
    let expiry = match (status.expires_at, status.minutes_until_expiry) {
        (Some(at), Some(minutes)) => format!("{} ({minutes} min left)", at.to_rfc3339()),
        _ => "unknown".to_string(),
    };
    let condition = if status.is_expired {
        "expired"
    } else if status.is_expiring_soon {
        "expiring soon"
    } else {
        "valid"
    };
    format!(
        "access token: {}\nrefresh token: {}\nexpires: {expiry}\nstate: {condition}",
        presence(status.has_access_token),
        presence(status.has_refresh_token),
    )
}

fn presence(present: bool) -> &'static str {
    if present { "present" } else { "absent" }
}

/// Attach the user-facing message to a session error
fn describe(err: SessionError) -> anyhow::Error {
    let hint = err.user_message();
    anyhow::Error::new(err).context(hint)
}
