//! Runs the create, create_or_update and watch scenario against the fake backend, with an informer
//! following along. Try `RUST_LOG=debug cargo run --example fake_pods`.
use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use kubegen::{
    api::{GetParams, ListParams, ObjectMeta, PostParams},
    core::labels::Selector,
    fake::FakeApi,
    runtime::{informer::Config, Informer, Lister},
    Event, ResourceApi, ResourceApiExt, ResourceExt,
};
use tracing::*;

fn pod(name: &str, labels: &[(&str, &str)]) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some("fake".into()),
            labels: Some(labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
            ..ObjectMeta::default()
        },
        ..Pod::default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kubegen=debug,kubegen_runtime=debug".into()),
        )
        .init();

    let pods = FakeApi::new([pod("fake", &[])])?;
    let mut watcher = pods.watch("fake", &ListParams::default()).await?;
    let informer = Informer::from_api(pods.clone(), "fake")
        .with_config(Config {
            retry_delay: Duration::from_millis(100),
            ..Config::default()
        })
        .start();

    let seeded = pods.get("fake", "fake", &GetParams::default()).await?;
    info!("seeded {}", seeded.name_any());

    let pp = PostParams::default();
    pods.create(&pod("fake2", &[("a", "b")]), &pp).await?;
    let updated = pods.create_or_update(&pod("fake2", &[("a", "modified")]), &pp).await?;
    info!("fake2 labels after create_or_update: {:?}", updated.labels());

    for _ in 0..2 {
        match watcher.recv().await {
            Some(Event::Added(p)) => info!("watch: added {}", p.name_any()),
            Some(Event::Modified(p)) => info!("watch: modified {} to {:?}", p.name_any(), p.labels()),
            Some(Event::Deleted(p)) => info!("watch: deleted {}", p.name_any()),
            None => warn!("watch ended early: {:?}", watcher.termination()),
        }
    }
    watcher.stop();

    informer.wait_until_synced().await;
    // give the informer a moment to apply the writes it raced with
    tokio::time::sleep(Duration::from_millis(50)).await;
    let modified: Selector = "a=modified".parse()?;
    for p in informer.store().by_namespace("fake").list(&modified) {
        info!("informer cache holds {} with {:?}", p.name_any(), p.labels());
    }
    for action in pods.to_client_set().actions() {
        debug!("recorded {} on {}", action.verb(), action.resource().resource);
    }
    informer.shutdown().await;
    Ok(())
}
