//! Turn-on / turn-off actions
//!
//! foobar2000 cannot power itself on, so these are delegated to something
//! external: a local program or an HTTP webhook.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

use crate::adapters::traits::PowerAction;
use crate::config::ActionConfig;

/// Environment variable carrying the entity id to command actions
pub const ENTITY_ID_ENV: &str = "FOOBAR_ENTITY_ID";

/// Runs a local program; the entity id is passed via [`ENTITY_ID_ENV`]
pub struct CommandAction {
    program: String,
    args: Vec<String>,
}

impl CommandAction {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait]
impl PowerAction for CommandAction {
    fn describe(&self) -> String {
        format!("command '{}'", self.program)
    }

    async fn run(&self, entity_id: &str) -> Result<()> {
        debug!(program = %self.program, entity_id, "running power command");
        let status = Command::new(&self.program)
            .args(&self.args)
            .env(ENTITY_ID_ENV, entity_id)
            .status()
            .await
            .with_context(|| format!("failed to launch '{}'", self.program))?;

        if !status.success() {
            return Err(anyhow!("'{}' exited with {}", self.program, status));
        }
        Ok(())
    }
}

/// POSTs `{"entity_id": ...}` to a URL
pub struct WebhookAction {
    client: Client,
    url: String,
}

impl WebhookAction {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl PowerAction for WebhookAction {
    fn describe(&self) -> String {
        format!("webhook {}", self.url)
    }

    async fn run(&self, entity_id: &str) -> Result<()> {
        debug!(url = %self.url, entity_id, "calling power webhook");
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "entity_id": entity_id }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("webhook {} failed: {}", self.url, response.status()));
        }
        Ok(())
    }
}

/// Build a power action from its configuration
pub fn build_action(config: &ActionConfig, client: &Client) -> Arc<dyn PowerAction> {
    match config {
        ActionConfig::Command { program, args } => {
            Arc::new(CommandAction::new(program.clone(), args.clone()))
        }
        ActionConfig::Webhook { url } => Arc::new(WebhookAction::new(client.clone(), url.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;
    use tokio::sync::Mutex;

    type Received = Arc<Mutex<Vec<Value>>>;

    /// Local webhook receiver answering every POST with `status`
    async fn webhook_server(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/hook",
                post(move |State(received): State<Received>, Json(body): Json<Value>| async move {
                    received.lock().await.push(body);
                    status
                }),
            )
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/hook", addr), received)
    }

    #[test]
    fn build_action_describes_kind() {
        let client = Client::new();
        let action = build_action(
            &ActionConfig::Webhook {
                url: "http://ha.local/api/webhook/foobar_on".to_string(),
            },
            &client,
        );
        assert_eq!(
            action.describe(),
            "webhook http://ha.local/api/webhook/foobar_on"
        );

        let action = build_action(
            &ActionConfig::Command {
                program: "wakeonlan".to_string(),
                args: vec!["00:11:22:33:44:55".to_string()],
            },
            &client,
        );
        assert_eq!(action.describe(), "command 'wakeonlan'");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_action_passes_entity_id() {
        let action = CommandAction::new(
            "sh".to_string(),
            vec![
                "-c".to_string(),
                format!("test \"${}\" = media_player.den", ENTITY_ID_ENV),
            ],
        );
        action.run("media_player.den").await.unwrap();
        assert!(action.run("media_player.kitchen").await.is_err());
    }

    #[tokio::test]
    async fn command_action_missing_program_errors() {
        let action = CommandAction::new("definitely-not-a-real-program-xyz".to_string(), vec![]);
        let err = action.run("media_player.den").await.unwrap_err();
        assert!(err.to_string().contains("failed to launch"));
    }

    #[tokio::test]
    async fn webhook_posts_entity_id() {
        let (url, received) = webhook_server(StatusCode::OK).await;
        let action = WebhookAction::new(Client::new(), url);

        action.run("media_player.den").await.unwrap();

        assert_eq!(
            *received.lock().await,
            vec![json!({ "entity_id": "media_player.den" })]
        );
    }

    #[tokio::test]
    async fn webhook_error_status_fails() {
        let (url, received) = webhook_server(StatusCode::INTERNAL_SERVER_ERROR).await;
        let action = WebhookAction::new(Client::new(), url);

        let err = action.run("media_player.den").await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert_eq!(received.lock().await.len(), 1);
    }
}
