//! Metadata edits applied in memory before an object is written back.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{CommandName, ObjectMeta, Workload, WorkloadId};

pub const INJECT_LABEL: &str = "cyberarmor.inject";
pub const IGNORE_KEY: &str = "cyberarmor.ignore";
pub const WLID_ANNOTATION: &str = "cyberarmor.wlid";
pub const UPDATE_TIME_ANNOTATION: &str = "cyberarmor.last-update";
pub const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Applies the marker edits `command` implies to the workload's pod metadata.
///
/// Commands without edits leave the workload untouched.
pub fn edit_workload(
    workload: &mut Workload,
    command: &CommandName,
    wlid: &WorkloadId,
    now: DateTime<Utc>,
) {
    let pod = workload.pod_metadata_mut();
    match command {
        CommandName::Update => {
            pod.remove_label(IGNORE_KEY);
            pod.set_label(INJECT_LABEL, "true");
            pod.set_annotation(WLID_ANNOTATION, wlid.to_string());
            set_update_time(pod, now);
        }
        CommandName::Restart => set_update_time(pod, now),
        CommandName::Inject => {
            pod.remove_label(IGNORE_KEY);
            pod.set_label(INJECT_LABEL, "true");
        }
        CommandName::Remove => {
            pod.set_label(IGNORE_KEY, "true");
            pod.remove_label(INJECT_LABEL);
            pod.remove_annotation(WLID_ANNOTATION);
            pod.remove_annotation(UPDATE_TIME_ANNOTATION);
        }
        CommandName::Encrypt | CommandName::Decrypt | CommandName::Other(_) => {}
    }
}

/// Applies the encrypt/decrypt marker edits to a secret's metadata.
pub fn mutate_secret(metadata: &mut ObjectMeta, command: &CommandName) {
    match command {
        CommandName::Decrypt => {
            metadata.remove_label(INJECT_LABEL);
            metadata.set_annotation(IGNORE_KEY, "true");
        }
        CommandName::Encrypt => {
            metadata.remove_annotation(IGNORE_KEY);
            metadata.remove_annotation(LAST_APPLIED_ANNOTATION);
        }
        _ => {}
    }
}

fn set_update_time(metadata: &mut ObjectMeta, now: DateTime<Utc>) {
    metadata.set_annotation(
        UPDATE_TIME_ANNOTATION,
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    fn deployment() -> (WorkloadId, Workload) {
        let id = WorkloadId::new("prod", "shop", "deployment", "web");
        let labels = BTreeMap::from([("app".to_owned(), "web".to_owned())]);
        let workload = Workload::controller(&id, labels);
        (id, workload)
    }

    #[test]
    fn update_marks_for_injection() {
        let (id, mut workload) = deployment();
        workload.pod_metadata_mut().set_label(IGNORE_KEY, "true");

        edit_workload(&mut workload, &CommandName::Update, &id, now());

        let pod = workload.pod_metadata();
        assert_eq!(pod.label(IGNORE_KEY), None);
        assert_eq!(pod.label(INJECT_LABEL), Some("true"));
        assert_eq!(
            pod.annotation(WLID_ANNOTATION),
            Some("wlid://cluster-prod/namespace-shop/deployment-web")
        );
        assert_eq!(
            pod.annotation(UPDATE_TIME_ANNOTATION),
            Some("2024-05-01T12:30:00Z")
        );
        // object metadata stays untouched for controllers
        assert!(workload.metadata.labels.is_empty());
    }

    #[test]
    fn restart_only_stamps_time() {
        let (id, mut workload) = deployment();
        let before = workload.pod_metadata().labels.clone();

        edit_workload(&mut workload, &CommandName::Restart, &id, now());

        assert_eq!(workload.pod_metadata().labels, before);
        assert_eq!(workload.pod_metadata().annotations.len(), 1);
        assert!(
            workload
                .pod_metadata()
                .annotation(UPDATE_TIME_ANNOTATION)
                .is_some()
        );
    }

    #[test]
    fn inject_does_not_stamp_time() {
        let (id, mut workload) = deployment();
        edit_workload(&mut workload, &CommandName::Inject, &id, now());

        assert_eq!(workload.pod_metadata().label(INJECT_LABEL), Some("true"));
        assert!(workload.pod_metadata().annotations.is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let (id, mut workload) = deployment();
        edit_workload(&mut workload, &CommandName::Update, &id, now());

        edit_workload(&mut workload, &CommandName::Remove, &id, now());
        let once = workload.clone();
        edit_workload(&mut workload, &CommandName::Remove, &id, now());

        assert_eq!(workload, once);
        let pod = workload.pod_metadata();
        assert_eq!(pod.label(IGNORE_KEY), Some("true"));
        assert_eq!(pod.label(INJECT_LABEL), None);
        assert_eq!(pod.annotation(WLID_ANNOTATION), None);
        assert_eq!(pod.annotation(UPDATE_TIME_ANNOTATION), None);
    }

    #[test]
    fn edits_are_idempotent_for_every_command() {
        for command in [
            CommandName::Update,
            CommandName::Restart,
            CommandName::Inject,
            CommandName::Remove,
            CommandName::Other("scan".into()),
        ] {
            let (id, mut workload) = deployment();
            edit_workload(&mut workload, &command, &id, now());
            let once = workload.clone();
            edit_workload(&mut workload, &command, &id, now());
            assert_eq!(workload, once, "{command} is not idempotent");
        }
    }

    #[test]
    fn unknown_command_is_a_pass_through() {
        let (id, mut workload) = deployment();
        let before = workload.clone();
        edit_workload(&mut workload, &CommandName::Other("scan".into()), &id, now());
        assert_eq!(workload, before);
    }

    #[test]
    fn decrypt_after_encrypt_matches_a_fresh_decrypt() {
        let mut fresh = ObjectMeta::new("shop", "db-creds");
        fresh.set_label(INJECT_LABEL, "true");
        let mut cycled = fresh.clone();

        mutate_secret(&mut fresh, &CommandName::Decrypt);

        mutate_secret(&mut cycled, &CommandName::Decrypt);
        mutate_secret(&mut cycled, &CommandName::Encrypt);
        assert_eq!(cycled.annotation(IGNORE_KEY), None);
        mutate_secret(&mut cycled, &CommandName::Decrypt);

        assert_eq!(cycled, fresh);
        assert_eq!(fresh.annotation(IGNORE_KEY), Some("true"));
        assert_eq!(fresh.label(INJECT_LABEL), None);
    }

    #[test]
    fn encrypt_drops_last_applied_snapshot() {
        let mut metadata = ObjectMeta::new("shop", "db-creds");
        metadata.set_annotation(IGNORE_KEY, "true");
        metadata.set_annotation(LAST_APPLIED_ANNOTATION, "{}");
        metadata.set_annotation("owner", "team-a");

        mutate_secret(&mut metadata, &CommandName::Encrypt);

        assert_eq!(metadata.annotation(IGNORE_KEY), None);
        assert_eq!(metadata.annotation(LAST_APPLIED_ANNOTATION), None);
        assert_eq!(metadata.annotation("owner"), Some("team-a"));
    }
}
