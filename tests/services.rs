mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{Journal, Recording, controller};
use servicevisor::{
    Config, Dependency, DependencyFlag, EventKind, Problem, ProblemReport, ServiceBuilder,
    ServiceContainer, ServiceError, ServiceMode, ServiceName, ServiceState, Severity,
    TransactionController, TxnError, Validate,
};
use tokio::sync::oneshot;

async fn commit(txn: &servicevisor::Transaction) {
    txn.prepare().await.unwrap();
    txn.commit().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn active_service_starts_on_commit() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let db = registry
        .install(&txn, ServiceBuilder::new("db", Recording::new("db", &journal)))
        .unwrap();
    commit(&txn).await;

    assert_eq!(db.state(), ServiceState::Up);
    assert_eq!(db.value_as::<String>().as_deref().map(String::as_str), Some("db-value"));
    assert!(registry.get_service("db").is_some());
    assert_eq!(journal.entries(), vec!["start db"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dependent_starts_after_dependency_and_sees_its_value() {
    use async_trait::async_trait;
    use servicevisor::{Service, StartContext};

    struct Api;

    #[async_trait]
    impl Service for Api {
        async fn start(&self, ctx: StartContext) {
            match ctx.dependency_as::<String>("db") {
                Some(url) => ctx.complete(format!("api over {url}")),
                None => ctx.fail("db value missing"),
            }
        }
    }

    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let api = registry
        .install(&txn, ServiceBuilder::new("api", Api).requires("db"))
        .unwrap();
    registry
        .install(&txn, ServiceBuilder::new("db", Recording::new("db", &journal)))
        .unwrap();
    commit(&txn).await;

    assert_eq!(api.state(), ServiceState::Up);
    assert_eq!(
        api.value_as::<String>().as_deref().map(String::as_str),
        Some("api over db-value")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn demand_starts_on_demand_dependency_first_and_stops_it_last() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let y = registry
        .install(
            &txn,
            ServiceBuilder::new("y", Recording::new("y", &journal)).with_mode(ServiceMode::OnDemand),
        )
        .unwrap();
    let x = registry
        .install(
            &txn,
            ServiceBuilder::new("x", Recording::new("x", &journal)).requires("y"),
        )
        .unwrap();
    commit(&txn).await;

    assert_eq!(y.state(), ServiceState::Up);
    assert_eq!(x.state(), ServiceState::Up);
    assert_eq!(y.demanded_by(), 1);
    assert!(journal.position("start y") < journal.position("start x"));

    journal.clear();
    let txn = ctl.create_update_transaction();
    x.remove(&txn).unwrap();
    commit(&txn).await;

    assert_eq!(x.state(), ServiceState::Removed);
    assert_eq!(y.state(), ServiceState::Down);
    assert_eq!(y.demanded_by(), 0);
    assert!(journal.position("stop x") < journal.position("stop y"));
    assert!(registry.get_service("x").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lazy_service_waits_for_demand() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let cache = registry
        .install(
            &txn,
            ServiceBuilder::new("cache", Recording::new("cache", &journal))
                .with_mode(ServiceMode::Lazy),
        )
        .unwrap();
    commit(&txn).await;
    assert_eq!(cache.state(), ServiceState::Down);

    let txn = ctl.create_update_transaction();
    let web = registry
        .install(
            &txn,
            ServiceBuilder::new("web", Recording::new("web", &journal)).requires("cache"),
        )
        .unwrap();
    commit(&txn).await;
    assert_eq!(cache.state(), ServiceState::Up);
    assert_eq!(web.state(), ServiceState::Up);

    // Lazy services stay up once demand is gone.
    let txn = ctl.create_update_transaction();
    web.remove(&txn).unwrap();
    commit(&txn).await;
    assert_eq!(cache.demanded_by(), 0);
    assert_eq!(cache.state(), ServiceState::Up);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn demanded_flag_pins_demand_even_for_lazy_dependents() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let base = registry
        .install(
            &txn,
            ServiceBuilder::new("base", Recording::new("base", &journal))
                .with_mode(ServiceMode::OnDemand),
        )
        .unwrap();
    let lazy = registry
        .install(
            &txn,
            ServiceBuilder::new("lazy", Recording::new("lazy", &journal))
                .with_mode(ServiceMode::Lazy)
                .with_dependency(Dependency::new("base", &[DependencyFlag::Demanded]).unwrap()),
        )
        .unwrap();
    commit(&txn).await;

    assert_eq!(base.demanded_by(), 1);
    assert_eq!(base.state(), ServiceState::Up);
    assert_eq!(lazy.state(), ServiceState::Down);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn undemanded_flag_never_demands() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let base = registry
        .install(
            &txn,
            ServiceBuilder::new("base", Recording::new("base", &journal))
                .with_mode(ServiceMode::OnDemand),
        )
        .unwrap();
    let top = registry
        .install(
            &txn,
            ServiceBuilder::new("top", Recording::new("top", &journal))
                .with_dependency(Dependency::new("base", &[DependencyFlag::Undemanded]).unwrap()),
        )
        .unwrap();
    commit(&txn).await;

    assert_eq!(base.demanded_by(), 0);
    assert_eq!(base.state(), ServiceState::Down);
    assert_eq!(top.state(), ServiceState::Down);
    assert_eq!(top.unsatisfied_dependencies(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_names_are_rejected_and_leave_no_trace() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    registry
        .install(
            &txn,
            ServiceBuilder::new("db", Recording::new("db", &journal)).with_alias("storage"),
        )
        .unwrap();

    let err = registry
        .install(&txn, ServiceBuilder::new("db", Recording::new("db2", &journal)))
        .unwrap_err();
    assert_eq!(err, ServiceError::Duplicate { name: ServiceName::from("db") });

    // Alias clash releases the primary name that was claimed first.
    let err = registry
        .install(
            &txn,
            ServiceBuilder::new("other", Recording::new("other", &journal)).with_alias("storage"),
        )
        .unwrap_err();
    assert_eq!(err.as_label(), "service_duplicate");
    registry
        .install(&txn, ServiceBuilder::new("other", Recording::new("other", &journal)))
        .unwrap();

    commit(&txn).await;
    let db = registry.get_service("storage").unwrap();
    assert_eq!(db.name().as_str(), "db");
    assert_eq!(db.aliases(), vec![ServiceName::from("storage")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cycles_are_rejected_atomically() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    registry
        .install(
            &txn,
            ServiceBuilder::new("a", Recording::new("a", &journal)).requires("b"),
        )
        .unwrap();
    registry
        .install(
            &txn,
            ServiceBuilder::new("b", Recording::new("b", &journal)).requires("c"),
        )
        .unwrap();

    let err = registry
        .install(
            &txn,
            ServiceBuilder::new("c", Recording::new("c", &journal))
                .with_alias("c-alias")
                .requires("a"),
        )
        .unwrap_err();
    let ServiceError::CircularDependency { path } = &err else {
        panic!("expected a cycle, got {err:?}");
    };
    let names: Vec<&str> = path.iter().map(ServiceName::as_str).collect();
    assert_eq!(names, vec!["c", "a", "b", "c"]);
    assert_eq!(err.to_string(), "circular dependency: c -> a -> b -> c");

    // Every slot touched by the failed install is free again.
    registry
        .install(&txn, ServiceBuilder::new("c", Recording::new("c", &journal)))
        .unwrap();
    registry
        .install(&txn, ServiceBuilder::new("c-alias", Recording::new("c2", &journal)))
        .unwrap();
    commit(&txn).await;

    assert_eq!(registry.get_service("a").unwrap().state(), ServiceState::Up);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn self_dependency_is_a_cycle() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let err = registry
        .install(
            &txn,
            ServiceBuilder::new("loop", Recording::new("loop", &journal)).requires("loop"),
        )
        .unwrap_err();
    assert_eq!(
        err,
        ServiceError::CircularDependency {
            path: vec![ServiceName::from("loop"), ServiceName::from("loop")]
        }
    );
    assert!(registry.get_service("loop").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn missing_required_dependency_blocks_commit() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let api = registry
        .install(
            &txn,
            ServiceBuilder::new("api", Recording::new("api", &journal)).requires("db"),
        )
        .unwrap();

    txn.prepare().await.unwrap();
    assert_eq!(api.state(), ServiceState::Down);
    assert_eq!(txn.problems().max_severity(), Some(Severity::Error));
    assert!(!txn.can_commit());
    assert!(matches!(
        txn.commit(),
        Err(TxnError::CommitBlocked { count: 1, .. })
    ));

    txn.abort().await.unwrap();
    assert!(registry.get_service("api").is_none());
    assert_eq!(api.state(), ServiceState::Removed);
    assert!(journal.entries().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn custom_validators_never_replace_service_validation() {
    struct Silent;

    impl Validate for Silent {
        fn validate(&self, _report: &mut ProblemReport) {}
    }

    struct Audit;

    impl Validate for Audit {
        fn validate(&self, report: &mut ProblemReport) {
            report.add(Problem::info("audited"));
        }
    }

    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    for _ in 0..64 {
        txn.add_validator(Arc::new(Silent));
    }
    txn.add_validator(Arc::new(Audit));
    let registry = container.new_registry(&txn).unwrap();
    registry
        .install(
            &txn,
            ServiceBuilder::new("api", Recording::new("api", &journal)).requires("db"),
        )
        .unwrap();

    txn.prepare().await.unwrap();
    let problems = txn.problems();
    assert_eq!(problems.max_severity(), Some(Severity::Error));
    assert!(problems.iter().any(|p| p.message() == "audited"));
    assert!(!txn.can_commit());
    txn.abort().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unrequired_dependency_may_be_missing() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let api = registry
        .install(
            &txn,
            ServiceBuilder::new("api", Recording::new("api", &journal))
                .with_dependency(Dependency::new("db", &[DependencyFlag::Unrequired]).unwrap()),
        )
        .unwrap();
    commit(&txn).await;

    assert_eq!(api.state(), ServiceState::Down);
    assert_eq!(api.unsatisfied_dependencies(), 1);

    let txn = ctl.create_update_transaction();
    registry
        .install(&txn, ServiceBuilder::new("db", Recording::new("db", &journal)))
        .unwrap();
    commit(&txn).await;
    assert_eq!(api.state(), ServiceState::Up);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn removing_a_required_dependency_is_reported() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let db = registry
        .install(&txn, ServiceBuilder::new("db", Recording::new("db", &journal)))
        .unwrap();
    let api = registry
        .install(
            &txn,
            ServiceBuilder::new("api", Recording::new("api", &journal)).requires("db"),
        )
        .unwrap();
    commit(&txn).await;

    let txn = ctl.create_update_transaction();
    db.remove(&txn).unwrap();
    txn.prepare().await.unwrap();
    assert_eq!(api.state(), ServiceState::Down);
    assert!(!txn.can_commit());

    txn.abort().await.unwrap();
    assert_eq!(db.state(), ServiceState::Up);
    assert_eq!(api.state(), ServiceState::Up);
    assert!(registry.get_service("db").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_start_is_a_warning_and_retry_recovers() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();
    let (svc, failing) = Recording::failing("flaky", &journal);

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let flaky = registry.install(&txn, ServiceBuilder::new("flaky", svc)).unwrap();
    txn.prepare().await.unwrap();
    assert_eq!(flaky.state(), ServiceState::Failed);
    assert_eq!(txn.problems().max_severity(), Some(Severity::Warning));
    txn.commit().unwrap();

    failing.store(false, Ordering::SeqCst);
    let txn = ctl.create_update_transaction();
    flaky.retry(&txn).unwrap();
    commit(&txn).await;

    assert_eq!(flaky.state(), ServiceState::Up);
    assert_eq!(journal.entries(), vec!["fail flaky", "start flaky"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retry_and_restart_ignore_other_states() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let svc = registry
        .install(&txn, ServiceBuilder::new("svc", Recording::new("svc", &journal)))
        .unwrap();
    commit(&txn).await;

    let txn = ctl.create_update_transaction();
    svc.retry(&txn).unwrap();
    commit(&txn).await;
    assert_eq!(journal.entries(), vec!["start svc"]);

    let txn = ctl.create_update_transaction();
    svc.restart(&txn).unwrap();
    commit(&txn).await;
    assert_eq!(journal.entries(), vec!["start svc", "stop svc", "start svc"]);
    assert_eq!(svc.state(), ServiceState::Up);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn restart_stops_dependents_first() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let db = registry
        .install(&txn, ServiceBuilder::new("db", Recording::new("db", &journal)))
        .unwrap();
    let api = registry
        .install(
            &txn,
            ServiceBuilder::new("api", Recording::new("api", &journal)).requires("db"),
        )
        .unwrap();
    commit(&txn).await;
    journal.clear();

    let txn = ctl.create_update_transaction();
    db.restart(&txn).unwrap();
    commit(&txn).await;

    assert_eq!(db.state(), ServiceState::Up);
    assert_eq!(api.state(), ServiceState::Up);
    assert_eq!(
        journal.entries(),
        vec!["stop api", "stop db", "start db", "start api"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disable_and_enable_toggle_the_service() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let svc = registry
        .install(&txn, ServiceBuilder::new("svc", Recording::new("svc", &journal)))
        .unwrap();
    commit(&txn).await;

    let txn = ctl.create_update_transaction();
    svc.disable(&txn).unwrap();
    commit(&txn).await;
    assert_eq!(svc.state(), ServiceState::Down);
    assert!(!svc.is_enabled());

    let txn = ctl.create_update_transaction();
    svc.enable(&txn).unwrap();
    commit(&txn).await;
    assert_eq!(svc.state(), ServiceState::Up);
    assert!(svc.is_enabled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn registry_disable_stops_everything_and_abort_restores() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let a = registry
        .install(&txn, ServiceBuilder::new("a", Recording::new("a", &journal)))
        .unwrap();
    let b = registry
        .install(
            &txn,
            ServiceBuilder::new("b", Recording::new("b", &journal)).requires("a"),
        )
        .unwrap();
    commit(&txn).await;

    let txn = ctl.create_update_transaction();
    registry.disable(&txn).unwrap();
    txn.prepare().await.unwrap();
    assert!(!registry.is_enabled());
    assert_eq!(a.state(), ServiceState::Down);
    assert_eq!(b.state(), ServiceState::Down);

    txn.abort().await.unwrap();
    assert!(registry.is_enabled());
    assert!(a.is_enabled());
    assert_eq!(a.state(), ServiceState::Up);
    assert_eq!(b.state(), ServiceState::Up);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn aborted_install_stops_what_it_started() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let svc = registry
        .install(&txn, ServiceBuilder::new("svc", Recording::new("svc", &journal)))
        .unwrap();
    txn.prepare().await.unwrap();
    assert_eq!(svc.state(), ServiceState::Up);
    txn.abort().await.unwrap();

    assert_eq!(journal.entries(), vec!["start svc", "stop svc"]);
    assert_eq!(svc.state(), ServiceState::Removed);
    assert!(registry.get_service("svc").is_none());

    // The name is free again.
    let txn = ctl.create_update_transaction();
    registry
        .install(&txn, ServiceBuilder::new("svc", Recording::new("svc", &journal)))
        .unwrap();
    commit(&txn).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn facade_checks_the_transaction() {
    let ctl = controller();
    let other = TransactionController::new(Config::default());
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let svc = registry
        .install(&txn, ServiceBuilder::new("svc", Recording::new("svc", &journal)))
        .unwrap();
    commit(&txn).await;

    let foreign = other.create_update_transaction();
    assert!(matches!(
        svc.disable(&foreign),
        Err(ServiceError::Txn(TxnError::ForeignTransaction { .. }))
    ));
    assert!(matches!(
        container.new_registry(&foreign),
        Err(ServiceError::Txn(TxnError::ForeignTransaction { .. }))
    ));

    let read = ctl.create_read_transaction();
    assert!(matches!(
        registry.install(&read, ServiceBuilder::new("x", Recording::new("x", &journal))),
        Err(ServiceError::Txn(TxnError::ReadOnly { .. }))
    ));

    // Committed transaction is no longer active.
    assert!(matches!(
        svc.remove(&txn),
        Err(ServiceError::Txn(TxnError::InvalidState { .. }))
    ));
    assert_eq!(svc.state(), ServiceState::Up);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lookup_reports_missing_services() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    commit(&txn).await;

    assert!(registry.get_service("ghost").is_none());
    assert_eq!(
        registry.get_required_service("ghost").unwrap_err(),
        ServiceError::NotFound { name: ServiceName::from("ghost") }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_removes_every_registry() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let first = container.new_registry(&txn).unwrap();
    let second = container.new_registry(&txn).unwrap();
    let a = first
        .install(&txn, ServiceBuilder::new("a", Recording::new("a", &journal)))
        .unwrap();
    let b = second
        .install(&txn, ServiceBuilder::new("b", Recording::new("b", &journal)))
        .unwrap();
    commit(&txn).await;

    let txn = ctl.create_update_transaction();
    container.shutdown(&txn).unwrap();
    commit(&txn).await;

    assert!(container.is_shut_down());
    assert!(first.is_removed() && second.is_removed());
    assert_eq!(a.state(), ServiceState::Removed);
    assert_eq!(b.state(), ServiceState::Removed);

    let txn = ctl.create_update_transaction();
    assert_eq!(
        container.new_registry(&txn).unwrap_err(),
        ServiceError::RegistryRemoved
    );
    assert_eq!(
        first
            .install(&txn, ServiceBuilder::new("c", Recording::new("c", &journal)))
            .unwrap_err(),
        ServiceError::RegistryRemoved
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn registry_removal_callback_runs_after_every_service_is_removed() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    let db = registry
        .install(&txn, ServiceBuilder::new("db", Recording::new("db", &journal)))
        .unwrap();
    let api = registry
        .install(
            &txn,
            ServiceBuilder::new("api", Recording::new("api", &journal)).requires("db"),
        )
        .unwrap();
    commit(&txn).await;

    let (tx, rx) = oneshot::channel();
    let seen = journal.clone();
    let services = [Arc::clone(&db), Arc::clone(&api)];
    let txn = ctl.create_update_transaction();
    registry
        .remove_with(&txn, move |registry| {
            let states: Vec<ServiceState> = services.iter().map(|s| s.state()).collect();
            let _ = tx.send((states, registry.is_removed(), seen.entries()));
        })
        .unwrap();
    commit(&txn).await;

    let (states, removed, entries) = rx.await.unwrap();
    assert_eq!(states, vec![ServiceState::Removed, ServiceState::Removed]);
    assert!(removed);
    assert!(entries.contains(&"stop api".to_string()));
    assert!(entries.contains(&"stop db".to_string()));

    // Nothing left to remove: the callback runs at once.
    let (tx, mut rx) = oneshot::channel();
    let txn = ctl.create_update_transaction();
    registry
        .remove_with(&txn, move |_| {
            let _ = tx.send(());
        })
        .unwrap();
    assert!(rx.try_recv().is_ok());
    commit(&txn).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_callback_waits_for_every_registry() {
    let ctl = controller();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let first = container.new_registry(&txn).unwrap();
    let second = container.new_registry(&txn).unwrap();
    let a = first
        .install(&txn, ServiceBuilder::new("a", Recording::new("a", &journal)))
        .unwrap();
    let b = second
        .install(&txn, ServiceBuilder::new("b", Recording::new("b", &journal)))
        .unwrap();
    second
        .install(
            &txn,
            ServiceBuilder::new("c", Recording::new("c", &journal)).requires("b"),
        )
        .unwrap();
    commit(&txn).await;

    let (tx, rx) = oneshot::channel();
    let services = [Arc::clone(&a), Arc::clone(&b)];
    let txn = ctl.create_update_transaction();
    container
        .shutdown_with(&txn, move |container| {
            let all_removed = services.iter().all(|s| s.state() == ServiceState::Removed);
            let _ = tx.send((all_removed, container.is_shut_down()));
        })
        .unwrap();
    commit(&txn).await;

    assert_eq!(rx.await.unwrap(), (true, true));
    assert!(second.get_service("c").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn service_transitions_are_published() {
    let ctl = controller();
    let mut rx = ctl.subscribe();
    let container = ServiceContainer::new(&ctl);
    let journal = Journal::default();

    let txn = ctl.create_update_transaction();
    let registry = container.new_registry(&txn).unwrap();
    registry
        .install(&txn, ServiceBuilder::new("svc", Recording::new("svc", &journal)))
        .unwrap();
    commit(&txn).await;

    let mut service_events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        if ev.service.as_deref() == Some("svc") {
            service_events.push(ev.kind);
        }
    }
    assert_eq!(
        service_events,
        vec![EventKind::ServiceStarting, EventKind::ServiceUp]
    );
}
