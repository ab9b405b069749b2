//! Basic resource operations against the mock server

use k8s_openapi::api::autoscaling::v1::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec,
};
use kube_resource_client::selector::label_selector_query;
use kube_resource_client::MockServer;
use serde_json::json;
use std::collections::BTreeMap;

const HPAS: &str = "/apis/autoscaling/v1/namespaces/test/horizontalpodautoscalers";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut hpa = HorizontalPodAutoscaler {
        spec: Some(HorizontalPodAutoscalerSpec {
            max_replicas: 5,
            scale_target_ref: CrossVersionObjectReference {
                kind: "Deployment".to_string(),
                name: "web".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    };
    hpa.metadata.name = Some("web".to_string());
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), "web".to_string());
    hpa.metadata.labels = Some(labels);

    // Stubbed mode: every request must be expected
    let server = MockServer::new();
    server
        .expect()
        .with_path(format!("{HPAS}{}", label_selector_query([("app", "web")])))
        .and_return(200, &json!({ "items": [hpa] }))
        .once();
    server
        .expect()
        .delete()
        .with_path(format!("{HPAS}/web"))
        .and_return(200, &json!({}))
        .once();

    let hpas = server.client().resources::<HorizontalPodAutoscaler>();
    let listed = hpas.with_label("app", "web").list().await?;
    println!("Stubbed list returned {} item(s)", listed.len());
    println!("Deleted: {}", hpas.with_name("web").delete().await?);
    println!("Requests sent: {}", server.request_count());

    // CRUD mode: unmatched requests hit an in-memory store
    let server = MockServer::crud();
    let hpas = server.client().resources::<HorizontalPodAutoscaler>();

    let created = hpas.create(&hpa).await?;
    println!(
        "\nCreated {} at resourceVersion {}",
        created.metadata.name.as_deref().unwrap_or_default(),
        created.metadata.resource_version.as_deref().unwrap_or_default()
    );

    let edited = hpas
        .with_name("web")
        .edit(|mut hpa| {
            if let Some(spec) = hpa.spec.as_mut() {
                spec.max_replicas = 10;
            }
            hpa
        })
        .await?;
    println!(
        "Edited maxReplicas to {} at resourceVersion {}",
        edited.spec.as_ref().map(|s| s.max_replicas).unwrap_or_default(),
        edited.metadata.resource_version.as_deref().unwrap_or_default()
    );

    match hpas.lock_resource_version("1").replace(&hpa).await {
        Err(err) if err.is_conflict() => println!("Stale replace rejected: {}", err),
        other => println!("Unexpected replace result: {:?}", other.map(|h| h.metadata.name)),
    }

    println!("Deleted: {}", hpas.delete_item(&edited).await?);
    println!("Still there: {}", hpas.with_name("web").get().await?.is_some());

    Ok(())
}
