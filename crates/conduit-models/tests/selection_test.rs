//! Behavioural tests for model selection and canary routing.

use conduit_models::{
    CanaryConfig, CanaryConfigUpdate, InMemoryMetricsProvider, InMemoryModelRegistry, ModelConfig,
    ModelMetrics, ModelSelector, ModelStatus, Population, SelectionContext, SelectionReason,
    bucket_for,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn rollout_registry(role: &str) -> InMemoryModelRegistry {
    InMemoryModelRegistry::with_models([
        ModelConfig::new("stable-1", "anthropic", role).with_capabilities(["text"]),
        ModelConfig::new("canary-1", "anthropic", role)
            .with_capabilities(["text"])
            .with_status(ModelStatus::Canary),
    ])
}

fn canary(percentage: f64) -> CanaryConfig {
    CanaryConfig { enabled: true, percentage, ..CanaryConfig::default() }
}

#[tokio::test]
async fn test_repeated_selection_is_deterministic() {
    let selector = ModelSelector::new(Arc::new(rollout_registry("planner")))
        .with_canary_config(canary(50.0))
        .unwrap();
    let context = SelectionContext::for_role("planner")
        .with_user("consistent-user")
        .with_project("consistent-project");

    let first = selector.select_model(&context).await.unwrap();
    for _ in 0..2 {
        let next = selector.select_model(&context).await.unwrap();
        assert_eq!(next.model.id, first.model.id);
        assert_eq!(next.reason, first.reason);
    }
}

#[tokio::test]
async fn test_population_follows_bucket() {
    let selector = ModelSelector::new(Arc::new(rollout_registry("planner")))
        .with_canary_config(canary(30.0))
        .unwrap();

    for i in 0..200 {
        let user = format!("user-{i}");
        let context = SelectionContext::for_role("planner").with_user(user.clone()).with_project("p");
        let bucket = bucket_for(Some(user.as_str()), Some("p")).unwrap();

        let selection = selector.select_model(&context).await.unwrap();
        assert_eq!(selection.metadata.bucket, Some(bucket));
        if bucket < 30 {
            assert_eq!(selection.metadata.population, Population::Canary);
            assert_eq!(selection.reason, SelectionReason::Canary);
        } else {
            assert_eq!(selection.metadata.population, Population::Stable);
            assert_eq!(selection.model.id, "stable-1");
        }
    }

    let stats = selector.statistics();
    assert_eq!(stats.total_selections, 200);
    assert_eq!(stats.stable_selections + stats.canary_selections, 200);
    assert!(stats.canary_percentage > 15.0 && stats.canary_percentage < 45.0);
}

#[tokio::test]
async fn test_capability_filtering() {
    let registry = InMemoryModelRegistry::with_models([
        ModelConfig::new("stable-1", "anthropic", "analyst").with_capabilities(["text"]),
        ModelConfig::new("vision-model", "openai", "analyst").with_capabilities(["text", "vision"]),
    ]);
    let selector = ModelSelector::new(Arc::new(registry));

    for i in 0..20 {
        let context = SelectionContext::for_role("analyst")
            .with_capabilities(["vision"])
            .with_user(format!("user-{i}"));
        let selection = selector.select_model(&context).await.unwrap();
        assert_eq!(selection.model.id, "vision-model");
    }
}

#[tokio::test]
async fn test_excluded_role_never_uses_canary() {
    let config = CanaryConfig {
        enabled: true,
        percentage: 100.0,
        critical_tasks_only: false,
        exclude_roles: BTreeSet::from(["critical".to_string()]),
    };
    let selector = ModelSelector::new(Arc::new(rollout_registry("critical")))
        .with_canary_config(config)
        .unwrap();

    for i in 0..100 {
        let context = SelectionContext::for_role("critical")
            .with_user(format!("user-{i}"))
            .with_project("project")
            .critical();
        let selection = selector.select_model(&context).await.unwrap();
        assert_ne!(selection.reason, SelectionReason::Canary);
        assert!(!selection.metadata.canary_enabled);
    }
    assert_eq!(selector.statistics().canary_selections, 0);
}

#[tokio::test]
async fn test_critical_only_rollout() {
    let config = CanaryConfig { critical_tasks_only: true, ..canary(100.0) };
    let selector = ModelSelector::new(Arc::new(rollout_registry("planner")))
        .with_canary_config(config)
        .unwrap();
    let context = SelectionContext::for_role("planner").with_user("u").with_project("p");

    let regular = selector.select_model(&context).await.unwrap();
    assert_eq!(regular.model.id, "stable-1");
    assert!(!regular.metadata.canary_enabled);

    let critical = selector.select_model(&context.clone().critical()).await.unwrap();
    assert_eq!(critical.model.id, "canary-1");
    assert_eq!(critical.reason, SelectionReason::Canary);
}

#[tokio::test]
async fn test_empty_and_mismatched_inputs_yield_none() {
    let selector = ModelSelector::new(Arc::new(rollout_registry("planner")));

    let unknown_role = SelectionContext::for_role("nobody");
    assert!(selector.select_model(&unknown_role).await.is_none());

    let missing_capability = SelectionContext::for_role("planner").with_capabilities(["audio"]);
    assert!(selector.select_model(&missing_capability).await.is_none());
}

#[tokio::test]
async fn test_canary_ranked_by_metrics() {
    let registry = InMemoryModelRegistry::with_models([
        ModelConfig::new("stable-1", "anthropic", "planner"),
        ModelConfig::new("canary-a", "anthropic", "planner").with_status(ModelStatus::Canary),
        ModelConfig::new("canary-b", "anthropic", "planner").with_status(ModelStatus::Canary),
    ]);
    let metrics = InMemoryMetricsProvider::with_metrics([(
        "canary-b".to_string(),
        ModelMetrics { success_rate: 0.99, correction_rate: 0.01, avg_confidence: 0.95, avg_cost: 0.0 },
    )]);
    let selector = ModelSelector::new(Arc::new(registry))
        .with_metrics(Arc::new(metrics))
        .with_canary_config(canary(100.0))
        .unwrap();

    let context = SelectionContext::for_role("planner").with_user("u");
    let selection = selector.select_model(&context).await.unwrap();
    assert_eq!(selection.model.id, "canary-b");
    assert_eq!(selection.reason, SelectionReason::Canary);
    assert!(selection.confidence > 0.9);
}

#[tokio::test]
async fn test_concurrent_updates_never_tear() {
    let selector = Arc::new(
        ModelSelector::new(Arc::new(rollout_registry("planner")))
            .with_canary_config(CanaryConfig { enabled: false, ..canary(0.0) })
            .unwrap(),
    );

    let writer = {
        let selector = Arc::clone(&selector);
        tokio::spawn(async move {
            for i in 0..200 {
                let on = i % 2 == 0;
                let update = CanaryConfigUpdate {
                    enabled: Some(on),
                    percentage: Some(if on { 100.0 } else { 0.0 }),
                    ..CanaryConfigUpdate::default()
                };
                selector.update_canary(&update).unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    for _ in 0..200 {
        let config = selector.canary_config();
        // Every snapshot is one of the two configurations written above.
        let consistent = (config.enabled && (config.percentage - 100.0).abs() < f64::EPSILON)
            || (!config.enabled && config.percentage.abs() < f64::EPSILON);
        assert!(consistent, "torn configuration: {config:?}");
        tokio::task::yield_now().await;
    }

    writer.await.unwrap();
}

#[tokio::test]
async fn test_empty_population_falls_back_to_other() {
    let registry = InMemoryModelRegistry::with_models([
        ModelConfig::new("canary-only", "anthropic", "coder").with_status(ModelStatus::Canary),
    ]);
    let selector = ModelSelector::new(Arc::new(registry));
    let context = SelectionContext::for_role("coder").with_user("u").with_project("p");

    let selection = selector.select_model(&context).await.unwrap();
    assert_eq!(selection.model.id, "canary-only");
    assert_eq!(selection.reason, SelectionReason::Fallback);
    assert!(!selection.metadata.canary_enabled);

    let stable_only = InMemoryModelRegistry::with_models([ModelConfig::new("stable-only", "anthropic", "coder")]);
    let selector = ModelSelector::new(Arc::new(stable_only)).with_canary_config(canary(100.0)).unwrap();
    let selection = selector.select_model(&context).await.unwrap();
    assert_eq!(selection.model.id, "stable-only");
    assert_eq!(selection.metadata.population, Population::Stable);
    assert!(selection.metadata.canary_enabled);
}
