//! Composition root: wires the directory, the authority service and a
//! line-based identity event feed on stdin.
//!
//! ```text
//! sign-in <principal-id> <email>
//! refresh
//! sign-out
//! check <module>
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use estately_core::PrincipalId;
use estately_infra::{
    AuthorityConfig, AuthorityService, IdentityEvent, InMemoryDirectory, NoopIdentityProvider,
};

const DIRECTORY_ENV: &str = "ESTATELY_DIRECTORY";

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Event(IdentityEvent),
    Check(String),
}

fn parse_line(line: &str) -> anyhow::Result<Option<Input>> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };

    let input = match command {
        "sign-in" => {
            let principal_id: PrincipalId = parts
                .next()
                .context("sign-in needs a principal id")?
                .parse()?;
            let email = parts.next().context("sign-in needs an email")?;
            Input::Event(IdentityEvent::SignedIn {
                principal_id,
                email: email.to_string(),
            })
        }
        "sign-out" => Input::Event(IdentityEvent::SignedOut),
        "refresh" => Input::Event(IdentityEvent::TokenRefreshed),
        "check" => Input::Check(parts.next().context("check needs a module name")?.to_string()),
        other => anyhow::bail!("unknown command '{other}'"),
    };
    Ok(Some(input))
}

fn load_directory() -> anyhow::Result<InMemoryDirectory> {
    match std::env::var(DIRECTORY_ENV) {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading directory fixture {path}"))?;
            InMemoryDirectory::from_json(&json)
                .with_context(|| format!("parsing directory fixture {path}"))
        }
        Err(_) => {
            warn!("{DIRECTORY_ENV} not set; every sign-in will resolve to a degraded session");
            Ok(InMemoryDirectory::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    estately_observability::init();

    let config = AuthorityConfig::from_env()?;
    info!(
        lookup_timeout_ms = config.lookup_timeout.as_millis() as u64,
        sensitive_modules = ?config.module_policy.sensitive_modules().collect::<Vec<_>>(),
        "authority config loaded"
    );
    let directory = Arc::new(load_directory()?);
    let service = AuthorityService::new(
        &config,
        directory.clone(),
        directory,
        Arc::new(NoopIdentityProvider),
    );

    let mut sessions = service.subscribe();
    tokio::spawn(async move {
        while sessions.changed().await.is_ok() {
            let session = sessions.borrow_and_update().clone();
            info!(
                generation = session.generation(),
                state = %session.state(),
                scope = %session.scope(),
                roles = ?session.roles().iter().map(|r| r.name).collect::<Vec<_>>(),
                "session published"
            );
        }
    });

    // Lines are applied in order on this task, so a `check` always answers
    // for the session produced by the events before it.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(Some(Input::Event(event))) => service.handle_event(event),
            Ok(Some(Input::Check(module))) => {
                service.settle().await;
                let explanation = service.gate().explain_module_access(&module);
                println!("{}", serde_json::to_string_pretty(&explanation)?);
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "ignoring input line"),
        }
    }

    service.settle().await;
    let session = service.snapshot();
    info!(state = %session.state(), scope = %session.scope(), "input closed");
    Ok(())
}
