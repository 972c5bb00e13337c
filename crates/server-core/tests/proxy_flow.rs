mod common;

use std::sync::Arc;

use common::{EchoEstablisher, ScriptedClient};
use server_core::{
    ProxyContext, ProxyOutcome, ProxyServer,
    auth::hash_password,
    authz::ConfigDirectory,
    bridge::BridgeEnd,
    config::parse_config,
    recorder::DefaultRecorderFactory,
    sessions::{SessionEvent, SessionRegistry},
};

fn config_text() -> String {
    format!(
        r#"
        [[users]]
        name = "alice"
        password_hash = "{hash}"

        [[users]]
        name = "bob"
        password_hash = "{hash}"

        [[targets]]
        name = "web01"
        address = "10.0.0.5"
        default_account = "deploy"

        [[accounts]]
        name = "deploy"
        password = "stored-pw"

        [[accounts]]
        name = "ops"
        username = "operator"

        [[grants]]
        user = "alice"
        target = "web01"
        accounts = ["deploy", "ops"]
        "#,
        hash = hash_password("front-door").unwrap()
    )
}

fn setup() -> (Arc<ProxyContext>, Arc<ConfigDirectory>, Arc<EchoEstablisher>) {
    let config = parse_config(&config_text()).unwrap();
    let directory = Arc::new(ConfigDirectory::from_config(&config));
    let establisher = Arc::new(EchoEstablisher::default());
    let ctx = Arc::new(ProxyContext {
        authz: directory.clone(),
        establisher: establisher.clone(),
        registry: SessionRegistry::new(),
        recorders: Arc::new(DefaultRecorderFactory::new(4096)),
        config: config.proxy.clone(),
    });
    (ctx, directory, establisher)
}

#[tokio::test]
async fn granted_user_reaches_target_with_stored_secret() {
    let (ctx, directory, establisher) = setup();
    let client = ScriptedClient::new("alice");
    let mut events = ctx.registry.subscribe();

    let target = directory.target("web01").unwrap();
    let account = directory.account_for("web01", None).unwrap();
    let server = ProxyServer::new(ctx.clone(), client.clone());
    let task = tokio::spawn(async move { server.proxy(target, account).await });

    assert!(matches!(events.recv().await.unwrap(), SessionEvent::Created(_)));
    client.type_bytes(b"echo hi\r");
    client.hang_up();

    let outcome = task.await.unwrap();
    assert!(matches!(
        outcome,
        ProxyOutcome::Completed {
            end: BridgeEnd::ClientClosed,
            ..
        }
    ));
    assert_eq!(
        establisher.attempts.lock().unwrap().as_slice(),
        &[("web01".to_string(), "deploy".to_string(), Some("stored-pw".to_string()))]
    );
    assert!(client.screen().contains("Connecting to deploy@web01"));
    assert!(ctx.registry.is_empty().await);
}

#[tokio::test]
async fn account_without_secret_is_prompted_for() {
    let (ctx, directory, establisher) = setup();
    let client = ScriptedClient::new("alice");
    client.type_bytes(b"typed-pw\r");
    client.hang_up();

    let target = directory.target("web01").unwrap();
    let account = directory.account_for("web01", Some("ops")).unwrap();
    let outcome = ProxyServer::new(ctx, client.clone()).proxy(target, account).await;

    assert!(matches!(outcome, ProxyOutcome::Completed { .. }));
    assert!(client.screen().starts_with("operator's password: "));
    assert_eq!(establisher.attempts.lock().unwrap()[0].2.as_deref(), Some("typed-pw"));
}

#[tokio::test]
async fn user_without_grant_is_denied() {
    let (ctx, directory, establisher) = setup();
    let client = ScriptedClient::new("bob");

    let target = directory.target("web01").unwrap();
    let account = directory.account_for("web01", None).unwrap();
    let outcome = ProxyServer::new(ctx.clone(), client.clone()).proxy(target, account).await;

    assert_eq!(outcome, ProxyOutcome::Denied);
    assert!(client.screen().contains("No permission"));
    assert!(establisher.attempts.lock().unwrap().is_empty());
    assert!(ctx.registry.is_empty().await);
}
