#[cfg(test)]
mod tests {
    use crate::selector::label_selector_query;
    use crate::{Error, MockServer};
    use http::Method;
    use k8s_openapi::api::autoscaling::v1::{
        CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec,
    };
    use k8s_openapi::api::core::v1::Node;
    use serde_json::{json, Value};

    const HPAS: &str = "/apis/autoscaling/v1/namespaces/test/horizontalpodautoscalers";
    const NS1_HPAS: &str = "/apis/autoscaling/v1/namespaces/ns1/horizontalpodautoscalers";
    const ALL_HPAS: &str = "/apis/autoscaling/v1/horizontalpodautoscalers";

    fn hpa(name: &str) -> HorizontalPodAutoscaler {
        let mut hpa = HorizontalPodAutoscaler {
            spec: Some(HorizontalPodAutoscalerSpec {
                max_replicas: 5,
                min_replicas: Some(1),
                scale_target_ref: CrossVersionObjectReference {
                    api_version: Some("apps/v1".to_string()),
                    kind: "Deployment".to_string(),
                    name: name.to_string(),
                },
                target_cpu_utilization_percentage: Some(80),
            }),
            ..Default::default()
        };
        hpa.metadata.name = Some(name.to_string());
        hpa
    }

    fn hpa_in(namespace: &str, name: &str) -> HorizontalPodAutoscaler {
        let mut hpa = hpa(name);
        hpa.metadata.namespace = Some(namespace.to_string());
        hpa
    }

    fn with_rv(mut hpa: HorizontalPodAutoscaler, rv: &str) -> HorizontalPodAutoscaler {
        hpa.metadata.resource_version = Some(rv.to_string());
        hpa
    }

    fn list_of(items: &[HorizontalPodAutoscaler]) -> Value {
        json!({
            "apiVersion": "autoscaling/v1",
            "kind": "HorizontalPodAutoscalerList",
            "metadata": { "resourceVersion": "1" },
            "items": items,
        })
    }

    fn body_of(server: &MockServer, method: Method, path: &str) -> Value {
        let requests = server.requests_to(method, path);
        let body = requests
            .last()
            .and_then(|r| r.body.clone())
            .expect("request carried a body");
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_list() {
        let server = MockServer::new();
        server
            .expect()
            .with_path(HPAS)
            .and_return(200, &list_of(&[]))
            .once();
        server
            .expect()
            .with_path(NS1_HPAS)
            .and_return(200, &list_of(&[hpa("a")]))
            .once();
        server
            .expect()
            .with_path(ALL_HPAS)
            .and_return(200, &list_of(&[hpa_in("ns1", "a"), hpa_in("ns2", "b")]))
            .once();

        let client = server.client();
        let hpas = client.resources::<HorizontalPodAutoscaler>();

        assert!(hpas.list().await.unwrap().is_empty());
        assert_eq!(hpas.in_namespace("ns1").list().await.unwrap().len(), 1);

        let all = hpas.in_any_namespace().list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.metadata.resource_version.as_deref(), Some("1"));
        let names: Vec<_> = all.into_iter().filter_map(|h| h.metadata.name).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_list_with_labels() {
        let server = MockServer::new();
        server
            .expect()
            .with_path(format!(
                "{HPAS}{}",
                label_selector_query([("key1", "value1"), ("key2", "value2")])
            ))
            .and_return(200, &list_of(&[hpa("a"), hpa("b"), hpa("c")]))
            .always();
        server
            .expect()
            .with_path(format!(
                "{HPAS}{}",
                label_selector_query([("key1", "value1"), ("key2", "value2"), ("key3", "value3")])
            ))
            .and_return(200, &list_of(&[]))
            .always();

        let hpas = server.client().resources::<HorizontalPodAutoscaler>();

        let two = hpas
            .with_label("key1", "value1")
            .with_label("key2", "value2")
            .list()
            .await
            .unwrap();
        assert_eq!(two.len(), 3);

        let three = hpas
            .with_labels([("key1", "value1"), ("key2", "value2"), ("key3", "value3")])
            .list()
            .await
            .unwrap();
        assert!(three.is_empty());
    }

    #[tokio::test]
    async fn test_list_label_order_is_significant() {
        let server = MockServer::new();
        server
            .expect()
            .with_path(format!(
                "{HPAS}{}",
                label_selector_query([("key1", "value1"), ("key2", "value2")])
            ))
            .and_return(200, &list_of(&[]))
            .always();

        let err = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .with_label("key2", "value2")
            .with_label("key1", "value1")
            .list()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnmatchedRequest { .. }));
    }

    #[tokio::test]
    async fn test_list_with_and_without_label_on_same_key() {
        let server = MockServer::new();
        server
            .expect()
            .with_path(format!("{HPAS}?labelSelector=app%3Dweb%2Capp%21%3Dlegacy"))
            .and_return(200, &list_of(&[hpa("a")]))
            .once();

        let hpas = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .without_label("app", "legacy")
            .with_label("app", "web")
            .list()
            .await
            .unwrap();
        assert_eq!(hpas.len(), 1);
    }

    #[tokio::test]
    async fn test_list_error_is_surfaced() {
        let server = MockServer::new();
        server
            .expect()
            .with_path(HPAS)
            .and_return(500, &json!({"message": "etcd unavailable"}))
            .once();

        let err = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .list()
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().contains("etcd unavailable"));
    }

    #[tokio::test]
    async fn test_get() {
        let server = MockServer::new();
        server
            .expect()
            .with_path(format!("{HPAS}/hpa1"))
            .and_return(200, &hpa("hpa1"))
            .once();
        server
            .expect()
            .with_path(format!("{HPAS}/hpa2"))
            .and_return(404, &json!({}))
            .once();

        let hpas = server.client().resources::<HorizontalPodAutoscaler>();

        let found = hpas.with_name("hpa1").get().await.unwrap();
        assert_eq!(found.and_then(|h| h.metadata.name).as_deref(), Some("hpa1"));

        assert!(hpas.with_name("hpa2").get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_other_failures_are_errors() {
        let server = MockServer::new();
        server
            .expect()
            .with_path(format!("{HPAS}/hpa1"))
            .and_return(403, &json!({"message": "forbidden"}))
            .once();

        let hpas = server.client().resources::<HorizontalPodAutoscaler>();
        let err = hpas.with_name("hpa1").get().await.unwrap_err();
        assert_eq!(err.status_code(), Some(403));
    }

    #[tokio::test]
    async fn test_require_missing() {
        let server = MockServer::new();
        server
            .expect()
            .with_path(format!("{HPAS}/hpa1"))
            .and_return(404, &json!({}))
            .once();

        let err = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .with_name("hpa1")
            .require()
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_without_name_is_rejected() {
        let server = MockServer::new();
        let err = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .get()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(server.request_count(), 0);
    }

    #[tokio::test]
    async fn test_create() {
        let server = MockServer::new();
        server
            .expect()
            .post()
            .with_path(HPAS)
            .and_return(201, &with_rv(hpa_in("test", "web"), "1"))
            .once();

        let created = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .create(&hpa("web"))
            .await
            .unwrap();

        assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));
        let sent = body_of(&server, Method::POST, HPAS);
        assert_eq!(sent["metadata"]["name"], "web");
        assert_eq!(sent["kind"], "HorizontalPodAutoscaler");
    }

    #[tokio::test]
    async fn test_create_conflict_is_an_error() {
        let server = MockServer::new();
        server
            .expect()
            .post()
            .with_path(HPAS)
            .and_return(409, &json!({"message": "already exists"}))
            .once();

        let err = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .create(&hpa("web"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_create_with_mismatched_namespace_sends_nothing() {
        let server = MockServer::new();
        let err = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .in_namespace("ns1")
            .create(&hpa_in("ns2", "web"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NamespaceMismatch { .. }));
        assert_eq!(server.request_count(), 0);
    }

    #[tokio::test]
    async fn test_create_or_replace_creates() {
        let server = MockServer::new();
        server
            .expect()
            .post()
            .with_path(HPAS)
            .and_return(201, &with_rv(hpa_in("test", "web"), "1"))
            .once();

        server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .create_or_replace(&hpa("web"))
            .await
            .unwrap();
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_create_or_replace_falls_back_to_one_replace() {
        let server = MockServer::new();
        server
            .expect()
            .post()
            .with_path(HPAS)
            .and_return(409, &with_rv(hpa_in("test", "web"), "12"))
            .once();
        server
            .expect()
            .put()
            .with_path(format!("{HPAS}/web"))
            .and_return(200, &with_rv(hpa_in("test", "web"), "13"))
            .once();

        let replaced = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .create_or_replace(&hpa("web"))
            .await
            .unwrap();

        assert_eq!(replaced.metadata.resource_version.as_deref(), Some("13"));
        assert_eq!(server.request_count(), 2);
        let sent = body_of(&server, Method::PUT, &format!("{HPAS}/web"));
        assert_eq!(sent["metadata"]["resourceVersion"], "12");
    }

    #[tokio::test]
    async fn test_create_or_replace_does_not_retry_twice() {
        let server = MockServer::new();
        server
            .expect()
            .post()
            .with_path(HPAS)
            .and_return(409, &json!({"message": "exists"}))
            .always();
        server
            .expect()
            .put()
            .with_path(format!("{HPAS}/web"))
            .and_return(409, &json!({"message": "modified"}))
            .always();

        let err = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .create_or_replace(&hpa("web"))
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(server.request_count(), 2);
    }

    #[tokio::test]
    async fn test_replace_with_locked_resource_version() {
        let server = MockServer::new();
        let path = format!("{HPAS}/web");
        server
            .expect()
            .put()
            .with_path(&path)
            .and_return(200, &with_rv(hpa_in("test", "web"), "8"))
            .once();

        server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .lock_resource_version("7")
            .replace(&with_rv(hpa("web"), "3"))
            .await
            .unwrap();

        let sent = body_of(&server, Method::PUT, &path);
        assert_eq!(sent["metadata"]["resourceVersion"], "7");
    }

    #[tokio::test]
    async fn test_replace_conflict_is_not_retried() {
        let server = MockServer::new();
        server
            .expect()
            .put()
            .with_path(format!("{HPAS}/web"))
            .and_return(409, &json!({"message": "the object has been modified"}))
            .always();

        let err = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .lock_resource_version("7")
            .replace(&hpa("web"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Conflict { .. }));
        assert!(err.to_string().contains("the object has been modified"));
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_replace_name_mismatch() {
        let server = MockServer::new();
        let err = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .with_name("web")
            .replace(&hpa("api"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NameMismatch { .. }));
        assert_eq!(server.request_count(), 0);
    }

    #[tokio::test]
    async fn test_edit() {
        let server = MockServer::new();
        let path = format!("{HPAS}/web");
        server
            .expect()
            .get()
            .with_path(&path)
            .and_return(200, &with_rv(hpa_in("test", "web"), "4"))
            .once();
        server
            .expect()
            .put()
            .with_path(&path)
            .and_reply(200, |request, _| {
                serde_json::from_slice::<Value>(request.body.as_deref().unwrap_or_default())
                    .unwrap_or_default()
            })
            .once();

        let edited = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .with_name("web")
            .edit(|mut hpa| {
                if let Some(spec) = hpa.spec.as_mut() {
                    spec.max_replicas = 9;
                }
                hpa
            })
            .await
            .unwrap();

        assert_eq!(edited.spec.map(|s| s.max_replicas), Some(9));
        let sent = body_of(&server, Method::PUT, &path);
        assert_eq!(sent["metadata"]["resourceVersion"], "4");
    }

    #[tokio::test]
    async fn test_edit_missing() {
        let server = MockServer::new();
        let path = format!("{HPAS}/hpa1");
        server
            .expect()
            .get()
            .with_path(&path)
            .and_return(404, &json!({}))
            .once();

        let err = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .with_name("hpa1")
            .edit(|hpa| hpa)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(server.requests_to(Method::PUT, &path).is_empty());
    }

    #[tokio::test]
    async fn test_edit_conflict() {
        let server = MockServer::new();
        let path = format!("{HPAS}/web");
        server
            .expect()
            .get()
            .with_path(&path)
            .and_return(200, &with_rv(hpa_in("test", "web"), "4"))
            .once();
        server
            .expect()
            .put()
            .with_path(&path)
            .and_return(409, &json!({}))
            .once();

        let err = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .with_name("web")
            .edit(|hpa| hpa)
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(server.request_count(), 2);
    }

    #[tokio::test]
    async fn test_replace_status() {
        let server = MockServer::new();
        let path = format!("{HPAS}/web/status");
        server
            .expect()
            .put()
            .with_path(&path)
            .and_return(200, &hpa_in("test", "web"))
            .once();

        server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .replace_status(&hpa("web"))
            .await
            .unwrap();
        assert_eq!(server.requests_to(Method::PUT, &path).len(), 1);
    }

    #[tokio::test]
    #[allow(deprecated)]
    async fn test_update_status_targets_status_subresource() {
        let server = MockServer::new();
        let path = format!("{HPAS}/web/status");
        server
            .expect()
            .put()
            .with_path(&path)
            .and_return(200, &hpa_in("test", "web"))
            .once();

        server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .update_status(&hpa("web"))
            .await
            .unwrap();
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let server = MockServer::new();
        server
            .expect()
            .delete()
            .with_path(format!("{HPAS}/hpa1"))
            .and_return(200, &json!({}))
            .once();
        server
            .expect()
            .delete()
            .with_path(format!("{NS1_HPAS}/hpa2"))
            .and_return(200, &json!({}))
            .once();
        server
            .expect()
            .delete()
            .with_path(format!("{HPAS}/hpa3"))
            .and_return(404, &json!({}))
            .once();

        let hpas = server.client().resources::<HorizontalPodAutoscaler>();

        assert!(hpas.with_name("hpa1").delete().await.unwrap());
        assert!(hpas
            .in_namespace("ns1")
            .with_name("hpa2")
            .delete()
            .await
            .unwrap());
        assert!(!hpas.with_name("hpa3").delete().await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_multi() {
        let server = MockServer::new();
        server
            .expect()
            .delete()
            .with_path(format!("{NS1_HPAS}/hpa1"))
            .and_return(200, &json!({}))
            .times(2);
        server
            .expect()
            .delete()
            .with_path("/apis/autoscaling/v1/namespaces/ns2/horizontalpodautoscalers/hpa2")
            .and_return(200, &json!({}))
            .once();
        server
            .expect()
            .delete()
            .with_path(format!("{HPAS}/hpa3"))
            .and_return(404, &json!({}))
            .once();

        let hpas = server.client().resources::<HorizontalPodAutoscaler>();
        let hpa1 = hpa_in("ns1", "hpa1");
        let hpa2 = hpa_in("ns2", "hpa2");
        let hpa3 = hpa_in("test", "hpa3");

        assert!(hpas
            .in_any_namespace()
            .delete_items([&hpa1, &hpa2])
            .await
            .unwrap());

        assert!(!hpas.delete_items([&hpa1, &hpa3]).await.unwrap());
        assert_eq!(server.requests_to(Method::DELETE, &format!("{NS1_HPAS}/hpa1")).len(), 2);
    }

    #[tokio::test]
    async fn test_delete_items_attempts_every_item() {
        let server = MockServer::new();
        for (name, status) in [("a", 404), ("b", 200), ("c", 200)] {
            server
                .expect()
                .delete()
                .with_path(format!("{HPAS}/{name}"))
                .and_return(status, &json!({}))
                .once();
        }

        let items = [hpa("a"), hpa("b"), hpa("c")];
        let deleted = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .delete_items(&items)
            .await
            .unwrap();

        assert!(!deleted);
        assert_eq!(server.request_count(), 3);
    }

    #[tokio::test]
    async fn test_delete_items_skips_unaddressable_items() {
        let server = MockServer::new();
        server
            .expect()
            .delete()
            .with_path(format!("{HPAS}/b"))
            .and_return(200, &json!({}))
            .once();

        let items = [hpa_in("other", "a"), hpa("b")];
        let deleted = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .in_namespace("test")
            .delete_items(&items)
            .await
            .unwrap();

        assert!(!deleted);
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_items_reports_transport_failure_after_all_attempts() {
        let server = MockServer::new();
        server
            .expect()
            .with_path(format!("{HPAS}/a"))
            .and_fail("connection refused")
            .once();
        server
            .expect()
            .with_path(format!("{HPAS}/b"))
            .and_return(200, &json!({}))
            .once();

        let items = [hpa("a"), hpa("b")];
        let err = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .delete_items(&items)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(server.request_count(), 2);
    }

    #[tokio::test]
    async fn test_cluster_scoped_resources() {
        let server = MockServer::new();
        let mut node = Node::default();
        node.metadata.name = Some("node-1".to_string());
        server
            .expect()
            .get()
            .with_path("/api/v1/nodes/node-1")
            .and_return(200, &node)
            .once();

        let fetched = server
            .client()
            .resources::<Node>()
            .in_namespace("ignored")
            .with_name("node-1")
            .get()
            .await
            .unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn test_field_selector_follows_label_selector() {
        let server = MockServer::new();
        server
            .expect()
            .with_path(format!(
                "{HPAS}?labelSelector=app%3Dweb&fieldSelector=metadata.name%3Dweb"
            ))
            .and_return(200, &list_of(&[hpa("web")]))
            .once();

        let hpas = server
            .client()
            .resources::<HorizontalPodAutoscaler>()
            .with_field("metadata.name", "web")
            .with_label("app", "web")
            .list()
            .await
            .unwrap();
        assert_eq!(hpas.len(), 1);
    }

    #[tokio::test]
    async fn test_narrowing_does_not_mutate_the_original() {
        let server = MockServer::new();
        server
            .expect()
            .with_path(HPAS)
            .and_return(200, &list_of(&[]))
            .once();

        let base = server.client().resources::<HorizontalPodAutoscaler>();
        let _labelled = base.with_label("app", "web");
        let _named = base.with_name("web");

        base.list().await.unwrap();
        assert_eq!(server.requests()[0].path_and_query(), HPAS);
    }
}
