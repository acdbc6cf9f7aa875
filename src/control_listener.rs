use crate::domain::commands::Command;
use crate::domain::controller::Controller;
use crate::poll::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, instrument, warn};

/// One line of host input, e.g. `{"request":"execute","command":{"set_grid_connected":true}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum HostRequest {
    Execute { command: Command },
    DryContacts,
    Snapshot,
    Status,
}

/// Handles host requests line by line until the input ends. Returns how many succeeded.
#[instrument(skip_all)]
pub async fn control_listener<R>(engine: Arc<Engine>, input: R) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut handled = 0;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("⚠️ Reading host input... failed, {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<HostRequest>(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("⚠️ Ignoring malformed request: {}", e);
                continue;
            }
        };
        debug!("🎛️ Received request: {:?}", request);

        if handle(&engine, request).await {
            handled += 1;
        }
    }

    debug!("🎛️ Host input closed");
    handled
}

async fn handle(engine: &Engine, request: HostRequest) -> bool {
    match request {
        HostRequest::Execute { command } => match engine.execute(command.clone()).await {
            Ok(()) => {
                info!("🎛️ Executing {:?}... OK", command);
                true
            }
            Err(e) => {
                warn!("⚠️ Executing {:?}... failed, {}", command, e);
                false
            }
        },
        HostRequest::DryContacts => report("dry contacts", &engine.dry_contacts().await),
        HostRequest::Snapshot => report("snapshot", &engine.snapshot().await),
        HostRequest::Status => {
            let capabilities = engine.capabilities().await;
            let categories = capabilities.supported_categories(engine.enabled_categories());
            info!(
                running = engine.is_running(),
                token = ?engine.token_state(),
                "🎛️ Polling {:?}",
                categories
            );
            true
        }
    }
}

fn report<T: Serialize>(name: &str, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => {
            info!("🎛️ {}: {}", name, json);
            true
        }
        Err(e) => {
            warn!("⚠️ Could not serialize the {}: {}", name, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::GeneratorMode;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn engine(server: &mockito::ServerGuard) -> Arc<Engine> {
        let config = crate::app_config::AppConfigBuilder::new().envoy_url(server.url()).build();
        let (tx, _rx) = mpsc::channel(64);
        Arc::new(Engine::new(
            Arc::new(config),
            crate::envoy::new_client(Duration::from_secs(5)).unwrap(),
            Arc::new(crate::auth::StaticIssuer::default()),
            tx,
        ))
    }

    #[test]
    fn parses_host_requests() {
        let execute: HostRequest =
            serde_json::from_str(r#"{"request":"execute","command":{"set_generator_mode":"auto"}}"#).unwrap();
        let storage: HostRequest = serde_json::from_str(
            r#"{"request":"execute","command":{"set_storage_settings":{"reserved_soc":30.0,"charge_from_grid":true}}}"#,
        )
        .unwrap();
        let status: HostRequest = serde_json::from_str(r#"{"request":"status"}"#).unwrap();

        assert_eq!(
            execute,
            HostRequest::Execute {
                command: Command::SetGeneratorMode(GeneratorMode::Auto)
            }
        );
        assert_eq!(
            storage,
            HostRequest::Execute {
                command: Command::SetStorageSettings {
                    profile: None,
                    reserved_soc: Some(30.0),
                    charge_from_grid: Some(true),
                }
            }
        );
        assert_eq!(status, HostRequest::Status);
    }

    #[test_log::test(tokio::test)]
    async fn handles_requests_until_the_input_ends() {
        let server = mockito::Server::new_async().await;
        let input = concat!(
            r#"{"request":"status"}"#,
            "\n",
            "not a request\n",
            "\n",
            r#"{"request":"execute","command":{"set_grid_connected":true}}"#,
            "\n",
            r#"{"request":"dry_contacts"}"#,
            "\n",
            r#"{"request":"snapshot"}"#,
            "\n",
        );

        let handled = control_listener(engine(&server), input.as_bytes()).await;

        assert_eq!(handled, 3);
    }
}
