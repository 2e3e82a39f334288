//! Cache window, queries, termination and refresh scheduling of the manager.

mod common;

use common::{app, ps_output, FakeRunner, StubIntrospect};
use herakles_proc_monitor::{
    CommandOutput, InventoryState, ManagerConfig, ProcessCategory, ProcessManager, ProcessType,
    ServiceInfo, StaticRegistry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const XCODE: &str = "/Applications/Xcode.app/Contents/MacOS/Xcode";

fn table() -> String {
    ps_output(&[
        "    0 4.0 0.0 kernel_task",
        "    1 0.0 0.1 launchd",
        "  310 0.2 0.3 cloudd",
        "  520 1.5 0.8 syncagent",
        " 4203 85.3 4.2 Xcode",
        " 5100 12.0 9.5 node",
    ])
}

fn config() -> ManagerConfig {
    ManagerConfig {
        cache_ttl: Duration::from_secs(60),
        kill_refresh_delay: Duration::from_millis(10),
        icon_prefetch_count: 5,
        ..ManagerConfig::default()
    }
}

fn introspect() -> StubIntrospect {
    StubIntrospect::default()
        .with_path(1, "/sbin/launchd")
        .with_service(
            310,
            ServiceInfo {
                service_type: Some("LaunchAgent".into()),
                path: Some("/Users/test/Library/LaunchAgents/com.example.cloudd.plist".into()),
                uid: Some(501),
            },
        )
}

fn manager_with(runner: Arc<FakeRunner>, config: ManagerConfig) -> Arc<ProcessManager> {
    Arc::new(ProcessManager::with_parts(
        config,
        runner,
        Arc::new(StaticRegistry::new(vec![app(4203, "Xcode", XCODE)])),
        Arc::new(introspect()),
    ))
}

fn ps_runner() -> FakeRunner {
    let table = table();
    FakeRunner::new().on("ps", move |args, _| {
        if args.iter().any(|a| a.contains("ppid=")) {
            Ok(CommandOutput::ok(" 1 0 01:00:00\n"))
        } else {
            Ok(CommandOutput::ok(table.clone()))
        }
    })
}

fn table_scans(runner: &FakeRunner) -> usize {
    runner
        .call_args("ps")
        .iter()
        .filter(|args| args.iter().any(|a| a == "-A"))
        .count()
}

#[tokio::test]
async fn test_at_most_one_scan_per_cache_window() {
    let runner = Arc::new(ps_runner());
    let manager = manager_with(runner.clone(), config());

    let first = manager.get_all(false).await;
    let second = manager.get_all(false).await;

    assert_eq!(first, second);
    assert_eq!(manager.scan_count(), 1);
    assert_eq!(table_scans(&runner), 1);

    manager.get_all(true).await;
    assert_eq!(manager.scan_count(), 2);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_scan() {
    let runner = Arc::new(ps_runner());
    let manager = manager_with(runner.clone(), config());

    let (a, b) = tokio::join!(manager.get_all(false), manager.get_all(false));
    assert_eq!(a.len(), b.len());
    assert_eq!(manager.scan_count(), 1);
}

#[tokio::test]
async fn test_expired_cache_rescans() {
    let runner = Arc::new(ps_runner());
    let manager = manager_with(
        runner.clone(),
        ManagerConfig {
            cache_ttl: Duration::from_millis(20),
            ..config()
        },
    );

    manager.get_all(false).await;
    tokio::time::sleep(Duration::from_millis(40)).await;
    manager.get_all(false).await;
    assert_eq!(manager.scan_count(), 2);
}

#[tokio::test]
async fn test_queries_never_scan() {
    let runner = Arc::new(ps_runner());
    let manager = manager_with(runner.clone(), config());

    assert_eq!(manager.state().await, InventoryState::Loading);
    assert!(manager.top_by_cpu(3).await.is_empty());
    assert!(manager.by_category(ProcessCategory::Applications).await.is_empty());
    assert_eq!(manager.scan_count(), 0);
    assert_eq!(table_scans(&runner), 0);

    manager.get_all(false).await;
    assert_eq!(manager.state().await, InventoryState::Ready);

    let top: Vec<u32> = manager.top_by_cpu(3).await.iter().map(|r| r.pid()).collect();
    assert_eq!(top, vec![4203, 5100, 0]);

    let by_memory: Vec<u32> = manager.top_by_memory(2).await.iter().map(|r| r.pid()).collect();
    assert_eq!(by_memory, vec![5100, 4203]);

    assert_eq!(manager.scan_count(), 1);
}

#[tokio::test]
async fn test_category_and_type_views() {
    let manager = manager_with(Arc::new(ps_runner()), config());
    manager.get_all(false).await;

    let apps = manager.by_category(ProcessCategory::Applications).await;
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].pid(), 4203);

    let system = manager.by_type(ProcessType::SystemDaemon).await;
    assert_eq!(system.iter().map(|r| r.pid()).collect::<Vec<_>>(), vec![1]);

    let daemons = manager.by_category(ProcessCategory::Daemons).await;
    assert_eq!(daemons.iter().map(|r| r.pid()).collect::<Vec<_>>(), vec![310]);

    // The type-group view also lists system daemons under Daemons.
    let mut group: Vec<u32> = manager
        .by_type_group(ProcessCategory::Daemons)
        .await
        .iter()
        .map(|r| r.pid())
        .collect();
    group.sort_unstable();
    assert_eq!(group, vec![1, 310]);

    let background = manager.by_type(ProcessType::BackgroundTask).await;
    assert_eq!(background.iter().map(|r| r.pid()).collect::<Vec<_>>(), vec![520]);
}

#[tokio::test]
async fn test_hidden_system_processes() {
    let manager = manager_with(
        Arc::new(ps_runner()),
        ManagerConfig {
            show_system_processes: false,
            ..config()
        },
    );

    let visible = manager.get_all(false).await;
    assert!(visible.iter().all(|r| !r.process_type().is_system()));
    assert!(visible.iter().any(|r| r.pid() == 4203));
    assert!(manager.by_type(ProcessType::Kernel).await.is_empty());
    assert!(manager.top_by_cpu(10).await.iter().all(|r| r.pid() != 0));

    // The snapshot itself still carries them.
    let snapshot = manager.snapshot(false).await;
    assert!(snapshot.get(0).is_some());
    assert!(snapshot.get(1).is_some());
}

#[tokio::test]
async fn test_degraded_state_when_table_fails() {
    let runner = Arc::new(FakeRunner::new().on("ps", |_, _| Ok(CommandOutput::failed(1))));
    let manager = manager_with(runner, config());

    let records = manager.get_all(false).await;
    assert!(!records.is_empty());
    assert_eq!(manager.state().await, InventoryState::Degraded);
}

#[tokio::test]
async fn test_kill_results_are_reported_truthfully() {
    let runner = Arc::new(ps_runner().on("kill", |args, _| {
        if args.first() == Some(&"-KILL") {
            Ok(CommandOutput::ok(""))
        } else {
            Ok(CommandOutput::failed(1))
        }
    }));
    let manager = manager_with(runner.clone(), config());
    manager.get_all(false).await;

    assert!(!manager.kill_process(5100).await);
    assert!(manager.force_kill_process(5100).await);

    assert_eq!(
        runner.call_args("kill"),
        vec![
            vec!["-TERM".to_string(), "5100".to_string()],
            vec!["-KILL".to_string(), "5100".to_string()],
        ]
    );

    // Both calls schedule a forced refresh shortly after.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(manager.scan_count() >= 2);
}

#[tokio::test]
async fn test_kill_spawn_failure_returns_false() {
    let runner = Arc::new(ps_runner());
    let manager = manager_with(runner, config());
    assert!(!manager.kill_process(4242).await);
    assert!(!manager.force_kill_process(4242).await);
}

#[tokio::test]
async fn test_inspect_adds_details_and_keeps_classification() {
    let manager = manager_with(Arc::new(ps_runner()), config());
    manager.get_all(false).await;

    let cached = manager.snapshot(false).await.get(4203).cloned().unwrap();
    let inspected = manager.inspect(4203).await.unwrap();

    assert_eq!(inspected.parent_pid, Some(1));
    assert!(inspected.owning_user.is_some());
    let started = inspected.start_time.unwrap();
    assert!(started < chrono::Utc::now() - chrono::Duration::minutes(59));

    assert_eq!(inspected.classification(), cached.classification());
    assert_eq!(inspected.cpu_percent, cached.cpu_percent);

    assert!(manager.inspect(999_999).await.is_none());
}

#[tokio::test]
async fn test_auto_refresh_runs_until_stopped() {
    let manager = manager_with(Arc::new(ps_runner()), config());
    let refreshes = Arc::new(AtomicUsize::new(0));

    let handle = {
        let refreshes = Arc::clone(&refreshes);
        manager.start_auto_refresh(Duration::from_millis(20), move |records| {
            assert!(!records.is_empty());
            refreshes.fetch_add(1, Ordering::SeqCst);
        })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(handle.is_running());
    handle.stop();

    let seen = refreshes.load(Ordering::SeqCst);
    assert!(seen >= 2, "expected at least two refreshes, saw {seen}");

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(refreshes.load(Ordering::SeqCst), seen);
}

#[tokio::test]
async fn test_scan_prefetches_icons() {
    let manager = manager_with(Arc::new(ps_runner()), config());
    manager.get_all(false).await;

    for _ in 0..50 {
        if !manager.icons().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!manager.icons().is_empty());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_system_info_reads_meminfo() {
    let manager = manager_with(Arc::new(FakeRunner::new()), config());
    let memory = manager.system_info().await.unwrap();
    assert!(memory.total_bytes > 0);
    assert!(memory.used_bytes <= memory.total_bytes);
    assert!((0.0..=100.0).contains(&memory.used_percent));
}
