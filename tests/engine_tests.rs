//! Locator, executor and status recorder tests against the in-memory store.

use std::sync::Arc;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use resource_modifier::crd::{STATUS_ERROR, STATUS_SUCCESS};
use resource_modifier::directive::Directive;
use resource_modifier::executor::{
    DirectiveExecutor, REASON_ADDED_FINALIZER, REASON_ADDED_LABEL, REASON_REMOVED_FINALIZERS,
};
use resource_modifier::locator::ResourceLocator;
use resource_modifier::status::StatusRecorder;
use resource_modifier::{
    Error, MemoryStore, ResourceModifier, ResourceModifierSpec, TargetKind, TargetObject,
    TargetResourceData,
};

fn pod(name: &str, namespace: &str, finalizers: Vec<String>) -> TargetObject {
    TargetObject::Pod(Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            finalizers: if finalizers.is_empty() {
                None
            } else {
                Some(finalizers)
            },
            ..Default::default()
        },
        ..Default::default()
    })
}

fn deployment(name: &str, namespace: &str, replicas: i32) -> TargetObject {
    TargetObject::Deployment(Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn modifier(name: &str) -> ResourceModifier {
    let mut modifier = ResourceModifier::new(
        name,
        ResourceModifierSpec {
            resource_data: TargetResourceData {
                resource_type: "pod".to_string(),
                name: Some("test-pod".to_string()),
                namespace: "test-ns".to_string(),
                labels: None,
            },
            annotations: vec!["removeAnyFinalizers".to_string()],
        },
    );
    modifier.metadata.namespace = Some("default".to_string());
    modifier
}

fn directive(raw: &str) -> Directive {
    Directive::parse(raw).unwrap().unwrap()
}

mod locator {
    use super::*;

    #[tokio::test]
    async fn resolves_named_object() {
        let store = Arc::new(MemoryStore::new());
        store.insert(pod("test-pod", "test-ns", vec![]));

        let locator = ResourceLocator::new(store);
        let data = TargetResourceData {
            resource_type: "pod".to_string(),
            name: Some("test-pod".to_string()),
            namespace: "test-ns".to_string(),
            labels: None,
        };

        let target = locator.locate(&data).await.unwrap();
        assert_eq!(target.kind(), TargetKind::Pod);
        assert_eq!(target.name(), "test-pod");
    }

    #[tokio::test]
    async fn defaults_namespace_when_unset() {
        let store = Arc::new(MemoryStore::new());
        store.insert(pod("test-pod", "default", vec![]));

        let locator = ResourceLocator::new(store);
        let data = TargetResourceData {
            resource_type: "pod".to_string(),
            name: Some("test-pod".to_string()),
            namespace: String::new(),
            labels: None,
        };

        assert!(locator.locate(&data).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_unsupported_resource_type() {
        let locator = ResourceLocator::new(Arc::new(MemoryStore::new()));
        let data = TargetResourceData {
            resource_type: "gizmo".to_string(),
            name: Some("x".to_string()),
            namespace: "default".to_string(),
            labels: None,
        };

        let err = locator.locate(&data).await.unwrap_err();
        match err {
            Error::UnsupportedResourceType(input) => assert_eq!(input, "gizmo"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn label_selection_is_reserved() {
        let locator = ResourceLocator::new(Arc::new(MemoryStore::new()));
        let data = TargetResourceData {
            resource_type: "pod".to_string(),
            name: None,
            namespace: "default".to_string(),
            labels: Some([("app".to_string(), "web".to_string())].into()),
        };

        let err = locator.locate(&data).await.unwrap_err();
        assert!(matches!(err, Error::SelectorNotImplemented));
    }

    #[tokio::test]
    async fn missing_selector_is_rejected() {
        let locator = ResourceLocator::new(Arc::new(MemoryStore::new()));
        let data = TargetResourceData {
            resource_type: "pod".to_string(),
            name: None,
            namespace: "default".to_string(),
            labels: None,
        };

        let err = locator.locate(&data).await.unwrap_err();
        assert!(matches!(err, Error::MissingSelector));
    }

    #[tokio::test]
    async fn missing_object_propagates_not_found() {
        let locator = ResourceLocator::new(Arc::new(MemoryStore::new()));
        let data = TargetResourceData {
            resource_type: "pod".to_string(),
            name: Some("ghost".to_string()),
            namespace: "default".to_string(),
            labels: None,
        };

        let err = locator.locate(&data).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}

mod executors {
    use super::*;

    #[tokio::test]
    async fn removes_all_finalizers_and_persists() {
        let store = Arc::new(MemoryStore::new());
        store.insert(pod("test-pod", "test-ns", vec!["test-finalizer".to_string()]));
        let mut target = store.object(TargetKind::Pod, "test-ns", "test-pod").unwrap();

        let executor = DirectiveExecutor::new(store.clone());
        let reason = executor
            .apply(&mut target, &directive("removeAnyFinalizers"))
            .await
            .unwrap();

        assert_eq!(reason, REASON_REMOVED_FINALIZERS);
        let stored = store.object(TargetKind::Pod, "test-ns", "test-pod").unwrap();
        assert!(stored.finalizers().is_empty());
    }

    #[tokio::test]
    async fn remove_finalizers_without_finalizers_fast_fails() {
        let store = Arc::new(MemoryStore::new());
        store.insert(pod("test-pod", "test-ns", vec![]));
        let mut target = store.object(TargetKind::Pod, "test-ns", "test-pod").unwrap();

        // No write happens, so even a poisoned store cannot fail this.
        store.fail_next_updates(1);
        let executor = DirectiveExecutor::new(store.clone());
        let result = executor
            .apply(&mut target, &directive("removeAnyFinalizers"))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn remove_finalizers_surfaces_update_error() {
        let store = Arc::new(MemoryStore::new());
        store.insert(pod("test-pod", "test-ns", vec!["test-finalizer".to_string()]));
        let mut target = store.object(TargetKind::Pod, "test-ns", "test-pod").unwrap();
        store.fail_next_updates(1);

        let executor = DirectiveExecutor::new(store.clone());
        let err = executor
            .apply(&mut target, &directive("removeAnyFinalizers"))
            .await
            .unwrap_err();

        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn add_finalizer_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store.insert(pod("test-pod", "test-ns", vec![]));
        let mut target = store.object(TargetKind::Pod, "test-ns", "test-pod").unwrap();

        let executor = DirectiveExecutor::new(store.clone());
        let raw = directive("addFinalizer:finalizer.rmod.dev");
        executor.apply(&mut target, &raw).await.unwrap();
        let reason = executor.apply(&mut target, &raw).await.unwrap();

        assert_eq!(reason, REASON_ADDED_FINALIZER);
        assert_eq!(
            target.finalizers().to_vec(),
            vec!["finalizer.rmod.dev".to_string()]
        );
    }

    #[tokio::test]
    async fn add_finalizer_preserves_existing_order() {
        let store = Arc::new(MemoryStore::new());
        store.insert(pod("test-pod", "test-ns", vec!["first".to_string()]));
        let mut target = store.object(TargetKind::Pod, "test-ns", "test-pod").unwrap();

        let executor = DirectiveExecutor::new(store.clone());
        executor
            .apply(&mut target, &directive("addFinalizer:second"))
            .await
            .unwrap();

        assert_eq!(
            target.finalizers().to_vec(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[tokio::test]
    async fn add_label_does_not_overwrite_existing_value() {
        let store = Arc::new(MemoryStore::new());
        store.insert(pod("test-pod", "test-ns", vec![]));
        let mut target = store.object(TargetKind::Pod, "test-ns", "test-pod").unwrap();
        target.insert_label("env".to_string(), "staging".to_string());

        let executor = DirectiveExecutor::new(store.clone());
        let reason = executor
            .apply(&mut target, &directive("addLabel:env:prod"))
            .await
            .unwrap();

        assert_eq!(reason, REASON_ADDED_LABEL);
        assert_eq!(target.labels().unwrap().get("env").unwrap(), "staging");
    }

    #[tokio::test]
    async fn remove_label_on_absent_key_succeeds_without_mutation() {
        let store = Arc::new(MemoryStore::new());
        store.insert(pod("test-pod", "test-ns", vec![]));
        let mut target = store.object(TargetKind::Pod, "test-ns", "test-pod").unwrap();

        let executor = DirectiveExecutor::new(store.clone());
        let result = executor
            .apply(&mut target, &directive("removeLabel:env"))
            .await;

        assert!(result.is_ok());
        assert!(target.labels().is_none());
    }

    #[tokio::test]
    async fn remove_label_deletes_exactly_that_entry() {
        let store = Arc::new(MemoryStore::new());
        store.insert(pod("test-pod", "test-ns", vec![]));
        let mut target = store.object(TargetKind::Pod, "test-ns", "test-pod").unwrap();
        target.insert_label("env".to_string(), "prod".to_string());
        target.insert_label("team".to_string(), "core".to_string());

        let executor = DirectiveExecutor::new(store.clone());
        executor
            .apply(&mut target, &directive("removeLabel:env"))
            .await
            .unwrap();

        let labels = target.labels().unwrap();
        assert!(!labels.contains_key("env"));
        assert_eq!(labels.get("team").unwrap(), "core");
    }

    #[tokio::test]
    async fn scale_sets_exact_replica_count() {
        let store = Arc::new(MemoryStore::new());
        store.insert(deployment("web", "test-ns", 1));
        let mut target = store
            .object(TargetKind::Deployment, "test-ns", "web")
            .unwrap();

        let executor = DirectiveExecutor::new(store.clone());
        executor
            .apply(&mut target, &directive("scale:5"))
            .await
            .unwrap();

        let stored = store
            .object(TargetKind::Deployment, "test-ns", "web")
            .unwrap();
        assert_eq!(stored.replicas(), Some(5));
    }

    #[tokio::test]
    async fn scale_rejects_non_scalable_kind_without_writing() {
        let store = Arc::new(MemoryStore::new());
        store.insert(pod("test-pod", "test-ns", vec![]));
        let mut target = store.object(TargetKind::Pod, "test-ns", "test-pod").unwrap();

        let executor = DirectiveExecutor::new(store.clone());
        let err = executor
            .apply(&mut target, &directive("scale:5"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotScalable(TargetKind::Pod)));
        assert_eq!(target.replicas(), None);
    }
}

mod recorder {
    use super::*;

    #[tokio::test]
    async fn success_clears_prior_error_condition() {
        let store = Arc::new(MemoryStore::new());
        let recorder = StatusRecorder::new(store.clone());
        let mut modifier = modifier("rm-test");

        recorder
            .record_error(&mut modifier, "could not resolve target")
            .await
            .unwrap();
        recorder
            .record_success(&mut modifier, "applied")
            .await
            .unwrap();

        let persisted = store.modifier("default", "rm-test").unwrap();
        let conditions = &persisted.status.unwrap().conditions;
        assert!(!conditions.contains_key(STATUS_ERROR));
        assert_eq!(conditions.get(STATUS_SUCCESS).unwrap(), "applied");
    }

    #[tokio::test]
    async fn error_keeps_prior_success_condition() {
        let store = Arc::new(MemoryStore::new());
        let recorder = StatusRecorder::new(store.clone());
        let mut modifier = modifier("rm-test");

        recorder
            .record_success(&mut modifier, "applied")
            .await
            .unwrap();
        recorder
            .record_error(&mut modifier, "later failure")
            .await
            .unwrap();

        let persisted = store.modifier("default", "rm-test").unwrap();
        let conditions = &persisted.status.unwrap().conditions;
        assert_eq!(conditions.get(STATUS_SUCCESS).unwrap(), "applied");
        assert_eq!(conditions.get(STATUS_ERROR).unwrap(), "later failure");
    }

    #[tokio::test]
    async fn failed_success_write_escalates_to_error_condition() {
        let store = Arc::new(MemoryStore::new());
        let recorder = StatusRecorder::new(store.clone());
        let mut modifier = modifier("rm-test");
        store.fail_next_updates(1);

        let result = recorder.record_success(&mut modifier, "applied").await;

        assert!(result.is_ok());
        let persisted = store.modifier("default", "rm-test").unwrap();
        let conditions = &persisted.status.unwrap().conditions;
        assert!(conditions
            .get(STATUS_ERROR)
            .unwrap()
            .contains("error during update"));
    }

    #[tokio::test]
    async fn double_write_failure_is_returned() {
        let store = Arc::new(MemoryStore::new());
        let recorder = StatusRecorder::new(store.clone());
        let mut modifier = modifier("rm-test");
        store.fail_next_updates(2);

        let err = recorder
            .record_success(&mut modifier, "applied")
            .await
            .unwrap_err();

        assert!(err.is_transport());
    }
}
