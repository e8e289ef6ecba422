use anyhow::Context;
use clap::Parser;
use querent_core::core::runtime::{busy_detector, tokio_runtime};
use querent_core::utils::error::ErrorSeverity;
use querent_core::utils::{logger, validation::Validate};
use querent_core::{
    CliConfig, Config, EventDispatcher, EventHandler, EventState, EventType, ManagerSettings,
    MockWorkflow, QuerentError, Workflow, WorkflowManager,
};
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    busy_detector::set_enabled(cli.detect_busy);

    tracing::info!("🚀 Starting querent");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match cli.load_config().and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };
    tracing::info!(
        "✅ Configuration loaded: {} ({}), workflow {}",
        config.querent_name,
        config.querent_id,
        config.workflow.id
    );

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - the workflow will not be started");
        println!("{}", config);
        return Ok(());
    }

    let runtime = tokio_runtime().context("building the tokio runtime")?;
    let outcome = runtime.block_on(run(config))?;

    if let Err(e) = outcome {
        tracing::error!(
            "❌ Workflow run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

/// Setup problems surface through `anyhow`; the run's own failure comes back for exit-code mapping.
async fn run(config: Config) -> anyhow::Result<Result<(), QuerentError>> {
    let (events, receiver) = EventHandler::channel(256);
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(EventType::StateTransition, |_: EventType, state: EventState| {
        tracing::info!("🔁 {}", state.payload);
    });
    dispatcher.register(EventType::TokenProcessed, |_: EventType, state: EventState| {
        tracing::info!("📈 {}", state.payload);
    });
    dispatcher.register_all(|event_type: EventType, state: EventState| {
        tracing::debug!("Event {} at {:.3}", event_type, state.timestamp);
    });
    let dispatch_task = dispatcher.spawn(receiver);

    let manager = WorkflowManager::with_settings(
        ManagerSettings::from_config(&config).with_event_handler(events),
    );

    let runner = MockWorkflow::from_workflow_config(&config.workflow)
        .context("reading workflow options")?;
    let workflow = Workflow::builder(config.workflow.id.clone())
        .name(config.workflow.name.clone())
        .config(config)
        .runner(runner)
        .build()
        .context("building the workflow")?;
    manager.add_workflow(workflow).context("registering the workflow")?;

    let outcome = tokio::select! {
        result = manager.start_workflows() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("⚠️ Interrupted, stopping workflows");
            manager.stop_workflows().await
        }
    };

    let metrics = manager.metrics();
    tracing::info!("📊 Workflows: {} {:?}", metrics.total, metrics.by_status);
    if let Some(system) = &metrics.system {
        tracing::info!(
            "📊 CPU: {:.1}%, Memory: {}MB, Peak: {}MB",
            system.cpu_usage,
            system.memory_usage_mb,
            system.peak_memory_mb
        );
    }

    drop(manager);
    match tokio::time::timeout(Duration::from_secs(1), dispatch_task).await {
        Ok(Ok(seen)) => tracing::debug!("Dispatched {} events", seen),
        Ok(Err(e)) => tracing::warn!("⚠️ Event dispatcher ended abnormally: {}", e),
        Err(_) => tracing::debug!("Event dispatcher still draining, leaving it"),
    }

    Ok(outcome)
}
