use ailab_inference::builder::{API_LABEL, DOCS_LABEL};
use ailab_inference::server::LABEL_INFERENCE_SERVER;
use ailab_inference::{
    CdiProbe, ContainerProviderConnection, EngineError, GpuInfo, GpuVendor, ImageCatalog,
    InferenceError, InferenceProvider, InferenceServerConfig, LlamaCppProvider, ModelInfo,
    ServerStatus, TaskRegistry, TaskState, VmType,
};
use ailab_testing::engine::{MOCK_CONTAINER_ID, MOCK_ENGINE_ID};
use ailab_testing::{
    EngineCall, MockConnectionRegistry, MockContainerEngine, MockGpuEnumerator,
    StaticConfiguration, server_config,
};
use std::sync::Arc;

struct Harness {
    provider: LlamaCppProvider,
    engine: MockContainerEngine,
    gpus: MockGpuEnumerator,
    tasks: Arc<TaskRegistry>,
}

fn harness(
    connections: MockConnectionRegistry,
    gpus: MockGpuEnumerator,
    configuration: StaticConfiguration,
    cdi_configured: bool,
) -> Harness {
    let engine = MockContainerEngine::new();
    let tasks = Arc::new(TaskRegistry::new());
    let provider = LlamaCppProvider::new(
        Arc::new(connections),
        Arc::new(gpus.clone()),
        Arc::new(configuration),
        Arc::new(engine.clone()),
        tasks.clone(),
    )
    .with_cdi_probe(CdiProbe::fixed(cdi_configured));

    Harness {
        provider,
        engine,
        gpus,
        tasks,
    }
}

fn nvidia() -> GpuInfo {
    GpuInfo::new(GpuVendor::Nvidia, "NVIDIA GeForce RTX 4090")
}

fn images() -> ImageCatalog {
    ImageCatalog::default()
}

#[tokio::test]
async fn test_cpu_only_native_launch() {
    let h = harness(
        MockConnectionRegistry::single(None),
        MockGpuEnumerator::new(vec![nvidia()]),
        StaticConfiguration::cpu_only(),
        true,
    );

    let server = h.provider.perform(&server_config(9000, "m.gguf")).await.unwrap();

    // GPU enumeration is skipped entirely without the experiment
    assert_eq!(h.gpus.call_count(), 0);
    assert_eq!(h.engine.pulled_images().await, vec![images().default]);

    let spec = h.engine.last_spec().await.unwrap();
    assert!(spec.host_config.devices.is_empty());
    assert!(spec.host_config.device_requests.is_empty());
    assert_eq!(spec.host_config.port_bindings["8000/tcp"][0].host_port, "9000");
    assert!(spec.env.contains(&"MODEL_PATH=/models/m.gguf".to_string()));
    assert!(spec.user.is_none());

    assert_eq!(server.container.engine_id, MOCK_ENGINE_ID);
    assert_eq!(server.container.container_id, MOCK_CONTAINER_ID);
    assert_eq!(server.connection.port, 9000);
    assert_eq!(server.status, ServerStatus::Running);
    assert_eq!(server.models.len(), 1);
    assert_eq!(server.labels, spec.labels);
    assert_eq!(server.labels[LABEL_INFERENCE_SERVER], r#"["hf.test.model"]"#);
    assert_eq!(server.labels[DOCS_LABEL], "http://localhost:10434/api-docs/9000");
    assert_eq!(server.labels[API_LABEL], "http://localhost:9000/v1");
}

#[tokio::test]
async fn test_native_nvidia_with_cdi() {
    let h = harness(
        MockConnectionRegistry::single(None),
        MockGpuEnumerator::new(vec![nvidia()]),
        StaticConfiguration::with_gpu(),
        true,
    );

    let server = h.provider.perform(&server_config(9000, "m.gguf")).await.unwrap();

    assert_eq!(h.engine.pulled_images().await, vec![images().cuda]);
    let spec = h.engine.last_spec().await.unwrap();
    assert_eq!(spec.host_config.devices.len(), 1);
    assert_eq!(spec.host_config.devices[0].path_on_host, "nvidia.com/gpu=all");
    assert!(spec.host_config.devices[0].path_in_container.is_empty());
    assert_eq!(spec.host_config.device_requests.len(), 1);
    assert_eq!(spec.user.as_deref(), Some("0"));
    assert_eq!(spec.labels["gpu"], "NVIDIA GeForce RTX 4090");
    assert!(spec.env.contains(&"GPU_LAYERS=999".to_string()));
    assert_eq!(server.labels["gpu"], "NVIDIA GeForce RTX 4090");
}

#[tokio::test]
async fn test_native_nvidia_without_cdi_runs_on_cpu() {
    let h = harness(
        MockConnectionRegistry::single(None),
        MockGpuEnumerator::new(vec![nvidia()]),
        StaticConfiguration::with_gpu(),
        false,
    );

    h.provider.perform(&server_config(9000, "m.gguf")).await.unwrap();

    assert_eq!(h.engine.pulled_images().await, vec![images().default]);
    let spec = h.engine.last_spec().await.unwrap();
    assert!(spec.host_config.devices.is_empty());
    assert!(spec.host_config.device_requests.is_empty());
    assert!(!spec.labels.contains_key("gpu"));
    assert!(!spec.env.iter().any(|e| e.starts_with("GPU_LAYERS")));
}

#[tokio::test]
async fn test_wsl_nvidia_uses_passthrough_shim() {
    let h = harness(
        MockConnectionRegistry::single(Some(VmType::Wsl)),
        MockGpuEnumerator::new(vec![nvidia()]),
        StaticConfiguration::with_gpu(),
        false,
    );

    let config = server_config(9000, "m.gguf").with_gpu_layers(32);
    h.provider.perform(&config).await.unwrap();

    assert_eq!(h.engine.pulled_images().await, vec![images().cuda]);
    let spec = h.engine.last_spec().await.unwrap();
    assert_eq!(spec.entrypoint.as_deref(), Some("/usr/bin/sh"));
    assert!(spec.cmd.is_some());
    assert_eq!(spec.user.as_deref(), Some("0"));
    assert!(spec.host_config.mounts.iter().any(|m| m.source == "/usr/lib/wsl"));
    assert_eq!(spec.host_config.devices[0].path_on_host, "/dev/dxg");
    assert!(spec.env.contains(&"GPU_LAYERS=32".to_string()));
}

#[tokio::test]
async fn test_wsl_amd_is_cpu_only() {
    let h = harness(
        MockConnectionRegistry::single(Some(VmType::Wsl)),
        MockGpuEnumerator::new(vec![GpuInfo::new(GpuVendor::Amd, "Radeon RX 7900")]),
        StaticConfiguration::with_gpu(),
        true,
    );

    h.provider.perform(&server_config(9000, "m.gguf")).await.unwrap();

    assert_eq!(h.engine.pulled_images().await, vec![images().default]);
    let spec = h.engine.last_spec().await.unwrap();
    assert!(spec.entrypoint.is_none());
    assert!(spec.cmd.is_none());
    assert!(spec.user.is_none());
    assert!(spec.host_config.devices.is_empty());
}

#[tokio::test]
async fn test_libkrun_gets_render_node_with_default_image() {
    for vm in [VmType::Libkrun, VmType::LibkrunLabel] {
        let h = harness(
            MockConnectionRegistry::single(Some(vm)),
            MockGpuEnumerator::new(vec![GpuInfo::new(GpuVendor::Unknown, "Apple M3 Max")]),
            StaticConfiguration::with_gpu(),
            false,
        );

        h.provider.perform(&server_config(9000, "m.gguf")).await.unwrap();

        assert_eq!(h.engine.pulled_images().await, vec![images().default]);
        let spec = h.engine.last_spec().await.unwrap();
        assert_eq!(spec.host_config.devices[0].path_on_host, "/dev/dri");
        assert_eq!(spec.labels["gpu"], "Apple M3 Max");
        assert!(spec.user.is_none());
    }
}

#[tokio::test]
async fn test_known_vendor_preferred_over_first_gpu() {
    let h = harness(
        MockConnectionRegistry::single(None),
        MockGpuEnumerator::new(vec![GpuInfo::new(GpuVendor::Unknown, "virtio-gpu"), nvidia()]),
        StaticConfiguration::with_gpu(),
        true,
    );

    h.provider.perform(&server_config(9000, "m.gguf")).await.unwrap();

    let spec = h.engine.last_spec().await.unwrap();
    assert_eq!(spec.labels["gpu"], "NVIDIA GeForce RTX 4090");
}

#[tokio::test]
async fn test_gpu_experiment_without_gpu_fails_before_engine() {
    let h = harness(
        MockConnectionRegistry::single(None),
        MockGpuEnumerator::none(),
        StaticConfiguration::with_gpu(),
        true,
    );

    let err = h.provider.perform(&server_config(9000, "m.gguf")).await.unwrap_err();
    assert!(matches!(err, InferenceError::Configuration(ref msg) if msg.contains("no gpu")));
    assert!(h.engine.history().await.is_empty());
}

#[tokio::test]
async fn test_gpu_enumeration_failure_propagates() {
    let h = harness(
        MockConnectionRegistry::single(None),
        MockGpuEnumerator::failing("nvidia-smi crashed"),
        StaticConfiguration::with_gpu(),
        true,
    );

    let err = h.provider.perform(&server_config(9000, "m.gguf")).await.unwrap_err();
    assert!(matches!(err, InferenceError::Gpu(_)));
}

#[tokio::test]
async fn test_no_running_connection() {
    let stopped = ContainerProviderConnection::new("machine", Some(VmType::Wsl))
        .with_status(ailab_inference::ConnectionStatus::Stopped);
    let h = harness(
        MockConnectionRegistry::new(vec![stopped]),
        MockGpuEnumerator::none(),
        StaticConfiguration::cpu_only(),
        false,
    );

    let err = h.provider.perform(&server_config(9000, "m.gguf")).await.unwrap_err();
    assert!(matches!(err, InferenceError::Configuration(_)));
    assert!(h.engine.history().await.is_empty());
}

#[tokio::test]
async fn test_named_connection_is_used() {
    let h = harness(
        MockConnectionRegistry::new(vec![
            ContainerProviderConnection::new("native", None),
            ContainerProviderConnection::new("wsl-machine", Some(VmType::Wsl)),
        ]),
        MockGpuEnumerator::new(vec![nvidia()]),
        StaticConfiguration::with_gpu(),
        false,
    );

    let config = server_config(9000, "m.gguf").with_connection("wsl-machine");
    h.provider.perform(&config).await.unwrap();

    match &h.engine.history().await[0] {
        EngineCall::Pull {
            connection, image, ..
        } => {
            assert_eq!(connection, "wsl-machine");
            assert_eq!(image, &images().cuda);
        }
        other => panic!("unexpected call {other:?}"),
    }

    let missing = server_config(9000, "m.gguf").with_connection("gone");
    let err = h.provider.perform(&missing).await.unwrap_err();
    assert!(matches!(err, InferenceError::Configuration(ref msg) if msg.contains("gone")));
}

#[tokio::test]
async fn test_image_override_wins() {
    let h = harness(
        MockConnectionRegistry::single(None),
        MockGpuEnumerator::new(vec![nvidia()]),
        StaticConfiguration::with_gpu(),
        true,
    );

    let config = server_config(9000, "m.gguf").with_image("localhost/llamacpp:dev");
    h.provider.perform(&config).await.unwrap();

    assert_eq!(h.engine.pulled_images().await, vec!["localhost/llamacpp:dev"]);
    let spec = h.engine.last_spec().await.unwrap();
    assert_eq!(spec.image, "sha256:localhost/llamacpp:dev");
    // acceleration does not depend on the image override
    assert_eq!(spec.host_config.devices.len(), 1);
}

#[tokio::test]
async fn test_pull_failure_aborts_launch() {
    let h = harness(
        MockConnectionRegistry::single(None),
        MockGpuEnumerator::none(),
        StaticConfiguration::cpu_only(),
        false,
    );
    let failure = EngineError::Pull {
        image: images().default,
        reason: "unauthorized".into(),
    };
    h.engine.fail_pull(failure.clone()).await;

    let config = server_config(9000, "m.gguf").with_label("trackingId", "launch-1");
    let err = h.provider.perform(&config).await.unwrap_err();

    match err {
        InferenceError::Engine(inner) => assert_eq!(inner, failure),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(h.engine.history().await.len(), 1);

    let tasks = h.tasks.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].state, TaskState::Error);
    assert_eq!(tasks[0].labels["trackingId"], "launch-1");
    assert!(tasks[0].error.as_ref().unwrap().contains("unauthorized"));
}

#[tokio::test]
async fn test_create_failure_aborts_launch() {
    let h = harness(
        MockConnectionRegistry::single(None),
        MockGpuEnumerator::none(),
        StaticConfiguration::cpu_only(),
        false,
    );
    h.engine
        .fail_create(EngineError::Create("port 9000 already allocated".into()))
        .await;

    let err = h.provider.perform(&server_config(9000, "m.gguf")).await.unwrap_err();
    assert!(matches!(err, InferenceError::Engine(EngineError::Create(_))));

    let states: Vec<TaskState> = h.tasks.tasks().into_iter().map(|t| t.state).collect();
    assert!(states.contains(&TaskState::Success));
    assert!(states.contains(&TaskState::Error));
}

#[tokio::test]
async fn test_model_count_is_validated_before_create() {
    let h = harness(
        MockConnectionRegistry::single(None),
        MockGpuEnumerator::none(),
        StaticConfiguration::cpu_only(),
        false,
    );

    let mut config = server_config(9000, "m.gguf");
    config
        .models
        .push(ModelInfo::new("second").with_file("/models", "s.gguf"));
    let err = h.provider.perform(&config).await.unwrap_err();
    assert!(matches!(err, InferenceError::Configuration(_)));

    config.models.clear();
    let err = h.provider.perform(&config).await.unwrap_err();
    assert!(matches!(err, InferenceError::Configuration(_)));

    assert!(h.engine.last_spec().await.is_none());
}

#[tokio::test]
async fn test_container_spec_contract() {
    let h = harness(
        MockConnectionRegistry::single(None),
        MockGpuEnumerator::none(),
        StaticConfiguration::cpu_only(),
        true,
    );
    let image = ailab_inference::ImageInfo::new("sha256:1", "engine");

    let spec = h
        .provider
        .container_spec(&server_config(9000, "m.gguf"), &image, VmType::Unknown, Some(&nvidia()))
        .unwrap();
    assert_eq!(spec.host_config.devices.len(), 1);
    assert_eq!(h.provider.inference_image(VmType::Unknown, Some(&nvidia())), images().cuda);

    let cfg: InferenceServerConfig = InferenceServerConfig {
        models: vec![],
        ..server_config(9000, "m.gguf")
    };
    assert!(h.provider.container_spec(&cfg, &image, VmType::Wsl, None).is_err());
}

#[test]
fn test_provider_builds_with_bundled_images() {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let h = harness(
            MockConnectionRegistry::empty(),
            MockGpuEnumerator::none(),
            StaticConfiguration::cpu_only(),
            false,
        );
        let _ = tx.send(h.provider.images().clone());
    });
    let catalog = rx
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("provider construction did not finish");
    assert_eq!(catalog, images());
}

#[tokio::test]
async fn test_unlisted_backend_tag_launches_cpu_only() {
    let connection: ContainerProviderConnection = serde_json::from_str(
        r#"{"name": "podman-machine-default", "status": "started", "vmType": "krunkit"}"#,
    )
    .unwrap();
    assert_eq!(connection.vm_type(), VmType::Other);

    let h = harness(
        MockConnectionRegistry::new(vec![connection]),
        MockGpuEnumerator::new(vec![nvidia()]),
        StaticConfiguration::with_gpu(),
        true,
    );

    let server = h.provider.perform(&server_config(9000, "m.gguf")).await.unwrap();

    assert_eq!(h.engine.pulled_images().await, vec![images().default]);
    let spec = h.engine.last_spec().await.unwrap();
    assert!(spec.host_config.devices.is_empty());
    assert!(spec.host_config.device_requests.is_empty());
    assert!(spec.user.is_none());
    assert!(!server.labels.contains_key("gpu"));
}
