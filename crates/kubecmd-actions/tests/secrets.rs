use std::sync::Arc;

use kubecmd_actions::edit::{IGNORE_KEY, INJECT_LABEL, LAST_APPLIED_ANNOTATION};
use kubecmd_actions::{
    ActionError, ActionHandler, ClusterCall, ClusterError, Command, CommandName, InMemoryCluster,
    LabelSelector, Secret, WorkloadId,
};

fn secret(namespace: &str, name: &str, labels: &[(&str, &str)]) -> Secret {
    let mut secret = Secret::new(namespace, name);
    for (key, value) in labels {
        secret.metadata.set_label(key, *value);
    }
    secret.data.insert("password".into(), "aHVudGVyMg==".into());
    secret
}

async fn handler(command: CommandName) -> (Arc<InMemoryCluster>, ActionHandler<InMemoryCluster>) {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster
        .insert_secret(secret("shop", "db-creds", &[(INJECT_LABEL, "true"), ("app", "db")]))
        .await;
    cluster
        .insert_secret(secret("shop", "api-token", &[("app", "api")]))
        .await;
    cluster
        .insert_secret(secret("billing", "db-creds", &[("app", "db")]))
        .await;

    let sid = WorkloadId::new("test", "shop", "secret", "db-creds");
    let handler = ActionHandler::new(sid, Command::new(command), Arc::clone(&cluster));
    (cluster, handler)
}

#[tokio::test]
async fn decrypt_marks_secret_as_ignored() {
    let (cluster, handler) = handler(CommandName::Decrypt).await;

    let current = handler.get_secret("shop", "db-creds").await.unwrap();
    let updated = handler
        .update_secret(current, &CommandName::Decrypt)
        .await
        .unwrap();

    assert_eq!(updated.metadata.label(INJECT_LABEL), None);
    assert_eq!(updated.metadata.annotation(IGNORE_KEY), Some("true"));

    let stored = cluster.secret("shop", "db-creds").await.unwrap();
    assert_eq!(stored, updated);
    assert_eq!(stored.data.len(), 1);
}

#[tokio::test]
async fn encrypt_clears_ignore_and_last_applied() {
    let (cluster, handler) = handler(CommandName::Encrypt).await;

    let mut current = handler.get_secret("shop", "db-creds").await.unwrap();
    current.metadata.set_annotation(IGNORE_KEY, "true");
    current
        .metadata
        .set_annotation(LAST_APPLIED_ANNOTATION, r#"{"kind":"Secret"}"#);

    handler
        .update_secret(current, &CommandName::Encrypt)
        .await
        .unwrap();

    let stored = cluster.secret("shop", "db-creds").await.unwrap();
    assert_eq!(stored.metadata.annotation(IGNORE_KEY), None);
    assert_eq!(stored.metadata.annotation(LAST_APPLIED_ANNOTATION), None);
    assert_eq!(stored.metadata.label("app"), Some("db"));
}

#[tokio::test]
async fn list_filters_by_namespace_and_selector() {
    let (cluster, handler) = handler(CommandName::Decrypt).await;

    let all = handler.list_secrets("shop", None).await.unwrap();
    assert_eq!(all.len(), 2);

    let selector: LabelSelector = [("app", "db")].into_iter().collect();
    let db = handler.list_secrets("shop", Some(&selector)).await.unwrap();
    assert_eq!(db.len(), 1);
    assert_eq!(db[0].metadata.name, "db-creds");
    assert_eq!(db[0].metadata.namespace, "shop");

    assert!(cluster.calls().await.contains(&ClusterCall::ListSecrets {
        namespace: "shop".into(),
        selector: Some("app=db".into()),
    }));
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let (_cluster, handler) = handler(CommandName::Other("deleteSecret".into())).await;

    handler.delete_secret("shop", "api-token").await.unwrap();

    let err = handler.get_secret("shop", "api-token").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        err,
        ActionError::Secret {
            namespace: "shop".into(),
            name: "api-token".into(),
            source: ClusterError::not_found("Secret", "shop", "api-token"),
        }
    );

    let err = handler.delete_secret("shop", "api-token").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn transport_failures_are_surfaced() {
    let (cluster, handler) = handler(CommandName::Decrypt).await;
    cluster.set_unreachable(true).await;

    let err = handler
        .update_secret(Secret::new("shop", "db-creds"), &CommandName::Decrypt)
        .await
        .unwrap_err();
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("shop/db-creds"));
    assert!(err.to_string().contains("cluster unreachable"));
}
