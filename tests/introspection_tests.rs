//! Memoization and timeout handling of the introspection helper.

mod common;

use common::{app, ps_output, FakeRunner};
use herakles_proc_monitor::{
    ActivationPolicy, Classifier, CommandOutput, EmptyRegistry, Introspect, IntrospectionHelper,
    InventoryBuilder, ProcessType, RunnerError, StaticRegistry,
};
use std::sync::Arc;
use std::time::Duration;

// No real process has this pid, so the open-files fallback always runs.
const GHOST_PID: u32 = 4_000_000_000;

#[test]
fn test_service_query_timeout_is_cached() {
    let runner = Arc::new(FakeRunner::new().on("launchctl", |_, timeout| {
        Err(RunnerError::Timeout {
            program: "launchctl".to_string(),
            timeout,
        })
    }));
    let helper = IntrospectionHelper::new(runner.clone(), Arc::new(StaticRegistry::default()))
        .with_timeouts(Duration::from_millis(50), Duration::from_millis(50));

    assert_eq!(helper.service_info(812), None);
    assert_eq!(helper.service_info(812), None);
    assert_eq!(runner.calls("launchctl"), 1);
    assert_eq!(helper.cached_counts().2, 1);
}

#[test]
fn test_service_descriptor_is_parsed_once() {
    let runner = Arc::new(FakeRunner::new().answering(
        "launchctl",
        "\tpath = /Library/LaunchDaemons/org.example.backupd.plist\n\ttype = LaunchDaemon\n\tuid = 0\n",
    ));
    let helper = IntrospectionHelper::new(runner.clone(), Arc::new(StaticRegistry::default()));

    let first = helper.service_info(77).unwrap();
    let second = helper.service_info(77).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.path.as_deref(),
        Some("/Library/LaunchDaemons/org.example.backupd.plist")
    );
    assert!(!first.is_user_scope());
    assert_eq!(runner.calls("launchctl"), 1);
}

#[test]
fn test_path_fallback_is_memoized() {
    let runner = Arc::new(FakeRunner::new().answering(
        "lsof",
        &format!("p{GHOST_PID}\nftxt\nn/usr/local/bin/ghostd\n"),
    ));
    let helper = IntrospectionHelper::new(runner.clone(), Arc::new(StaticRegistry::default()));

    assert_eq!(
        helper.executable_path(GHOST_PID).as_deref(),
        Some("/usr/local/bin/ghostd")
    );
    assert_eq!(
        helper.executable_path(GHOST_PID).as_deref(),
        Some("/usr/local/bin/ghostd")
    );
    assert_eq!(runner.calls("lsof"), 1);
}

#[test]
fn test_failed_path_lookup_is_memoized() {
    let runner = Arc::new(FakeRunner::new().on("lsof", |_, _| Ok(CommandOutput::failed(1))));
    let helper = IntrospectionHelper::new(runner.clone(), Arc::new(StaticRegistry::default()));

    assert_eq!(helper.executable_path(GHOST_PID), None);
    assert_eq!(helper.executable_path(GHOST_PID), None);
    assert_eq!(runner.calls("lsof"), 1);
    assert_eq!(helper.cached_counts().0, 1);
}

#[test]
fn test_registry_lookups_are_memoized() {
    let helper = IntrospectionHelper::new(
        Arc::new(FakeRunner::new()),
        Arc::new(StaticRegistry::new(vec![app(
            4203,
            "Xcode",
            "/Applications/Xcode.app/Contents/MacOS/Xcode",
        )])),
    );

    assert_eq!(helper.running_application(4203).unwrap().name, "Xcode");
    assert!(helper.running_application(99).is_none());
    assert!(helper.running_application(99).is_none());
    assert_eq!(helper.cached_counts().1, 2);
}

#[test]
fn test_fresh_listing_replaces_stale_registry_miss() {
    let helper = IntrospectionHelper::new(Arc::new(FakeRunner::new()), Arc::new(EmptyRegistry));
    assert!(helper.running_application(812).is_none());

    let mut menu = app(812, "Menu", "/Applications/Menu.app/Contents/MacOS/Menu");
    menu.activation_policy = ActivationPolicy::Accessory;
    helper.record_application(&menu);

    assert_eq!(helper.running_application(812), Some(menu));
}

#[test]
fn test_late_registered_app_is_classified_from_its_listing() {
    let runner: Arc<FakeRunner> =
        Arc::new(FakeRunner::new().answering("ps", &ps_output(&["  812 0.3 0.2 Menu"])));
    // The pid was looked up before it registered, so the helper memoized a miss.
    let helper = Arc::new(IntrospectionHelper::new(runner.clone(), Arc::new(EmptyRegistry)));
    assert!(helper.running_application(812).is_none());

    let mut menu = app(812, "Menu", "/Applications/Menu.app/Contents/MacOS/Menu");
    menu.activation_policy = ActivationPolicy::Accessory;

    let snapshot = InventoryBuilder::new(
        runner,
        Arc::new(StaticRegistry::new(vec![menu])),
        helper,
        Classifier::default(),
    )
    .build();

    assert_eq!(snapshot.get(812).unwrap().process_type(), ProcessType::BackgroundTask);
}
