use tracing::info;

use crate::edit::mutate_secret;
use crate::{
    ActionError, ActionHandler, ClusterClient, ClusterError, CommandName, LabelSelector, Secret,
};

impl<C: ClusterClient> ActionHandler<C> {
    /// Applies the `command` marker edits to `secret` and writes it back.
    pub async fn update_secret(
        &self,
        mut secret: Secret,
        command: &CommandName,
    ) -> Result<Secret, ActionError> {
        mutate_secret(&mut secret.metadata, command);
        info!(
            %command,
            namespace = %secret.metadata.namespace,
            name = %secret.metadata.name,
            "updating secret"
        );

        self.client()
            .update_secret(&secret)
            .await
            .map_err(|err| secret_error(&secret.metadata.namespace, &secret.metadata.name, err))
    }

    pub async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), ActionError> {
        self.client()
            .delete_secret(namespace, name)
            .await
            .map_err(|err| secret_error(namespace, name, err))
    }

    pub async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ActionError> {
        self.client()
            .get_secret(namespace, name)
            .await
            .map_err(|err| secret_error(namespace, name, err))
    }

    /// Lists secrets in `namespace`, narrowed by `selector` when given.
    pub async fn list_secrets(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<Vec<Secret>, ActionError> {
        self.client()
            .list_secrets(namespace, selector)
            .await
            .map_err(|err| secret_error(namespace, "*", err))
    }
}

fn secret_error(namespace: &str, name: &str, source: ClusterError) -> ActionError {
    ActionError::Secret {
        namespace: namespace.to_owned(),
        name: name.to_owned(),
        source,
    }
}
