//! Demand counts and start order stay consistent for any mix of dependent
//! modes, any install order and concurrent transactions.

mod common;

use std::sync::Arc;

use common::{Journal, Recording, controller};
use proptest::prelude::*;
use servicevisor::{ServiceBuilder, ServiceContainer, ServiceMode, ServiceState};

const NAMES: [&str; 6] = ["s0", "s1", "s2", "s3", "s4", "s5"];

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn arb_mode() -> impl Strategy<Value = ServiceMode> {
    prop_oneof![
        Just(ServiceMode::Active),
        Just(ServiceMode::Lazy),
        Just(ServiceMode::OnDemand),
    ]
}

fn arb_install_order() -> impl Strategy<Value = Vec<usize>> {
    (2usize..=NAMES.len()).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// An on-demand service is demanded exactly by its active dependents,
    /// and runs exactly while that count is positive.
    #[test]
    fn demand_follows_active_dependents(
        modes in prop::collection::vec(arb_mode(), 1..NAMES.len()),
        removed_mask in any::<u8>(),
    ) {
        runtime().block_on(async {
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
            let mut dependents = Vec::new();
            for (i, mode) in modes.iter().enumerate() {
                let svc = registry
                    .install(
                        &txn,
                        ServiceBuilder::new(NAMES[i], Recording::new(NAMES[i], &journal))
                            .with_mode(*mode)
                            .requires("base"),
                    )
                    .unwrap();
                dependents.push((svc, *mode));
            }
            txn.prepare().await.unwrap();
            txn.commit().unwrap();

            let active = modes.iter().filter(|m| **m == ServiceMode::Active).count();
            assert_eq!(base.demanded_by(), active);
            assert_eq!(base.state() == ServiceState::Up, active > 0);
            for (svc, mode) in &dependents {
                assert_eq!(svc.state() == ServiceState::Up, *mode == ServiceMode::Active);
            }

            let txn = ctl.create_update_transaction();
            let mut remaining = 0;
            for (i, (svc, mode)) in dependents.iter().enumerate() {
                if removed_mask & (1 << i) != 0 {
                    svc.remove(&txn).unwrap();
                } else if *mode == ServiceMode::Active {
                    remaining += 1;
                }
            }
            txn.prepare().await.unwrap();
            txn.commit().unwrap();

            assert_eq!(base.demanded_by(), remaining);
            assert_eq!(base.state() == ServiceState::Up, remaining > 0);

            // Aborting a removal of everything restores the count.
            let txn = ctl.create_update_transaction();
            for (svc, _) in &dependents {
                if svc.state() != ServiceState::Removed {
                    svc.remove(&txn).unwrap();
                }
            }
            txn.prepare().await.unwrap();
            assert_eq!(base.demanded_by(), 0);
            txn.abort().await.unwrap();
            assert_eq!(base.demanded_by(), remaining);
            assert_eq!(base.state() == ServiceState::Up, remaining > 0);
        });
    }

    /// A dependency chain starts bottom-up whatever order it was installed in.
    #[test]
    fn chain_starts_in_dependency_order(order in arb_install_order()) {
        runtime().block_on(async {
            let ctl = controller();
            let container = ServiceContainer::new(&ctl);
            let journal = Journal::default();

            let txn = ctl.create_update_transaction();
            let registry = container.new_registry(&txn).unwrap();
            for &i in &order {
                let mut builder = ServiceBuilder::new(NAMES[i], Recording::new(NAMES[i], &journal));
                if i > 0 {
                    builder = builder.requires(NAMES[i - 1]);
                }
                registry.install(&txn, builder).unwrap();
            }
            txn.prepare().await.unwrap();
            txn.commit().unwrap();

            for i in 1..order.len() {
                let lower = journal.position(&format!("start {}", NAMES[i - 1]));
                let upper = journal.position(&format!("start {}", NAMES[i]));
                assert!(lower < upper, "{:?}", journal.entries());
            }

            let txn = ctl.create_update_transaction();
            registry.remove(&txn).unwrap();
            txn.prepare().await.unwrap();
            txn.commit().unwrap();
            for i in 1..order.len() {
                let upper = journal.position(&format!("stop {}", NAMES[i]));
                let lower = journal.position(&format!("stop {}", NAMES[i - 1]));
                assert!(upper < lower, "{:?}", journal.entries());
            }
        });
    }
}

/// Active dependents installed and removed from many concurrent transactions
/// leave the on-demand base demanded exactly by the survivors.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_transactions_keep_demand_exact() {
    const DEPENDENTS: usize = 32;

    let ctl = Arc::new(controller());
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
    txn.prepare().await.unwrap();
    txn.commit().unwrap();
    assert_eq!(base.state(), ServiceState::Down);

    let workers: Vec<_> = (0..DEPENDENTS)
        .map(|i| {
            let ctl = Arc::clone(&ctl);
            let registry = registry.clone();
            let journal = journal.clone();
            tokio::spawn(async move {
                let name: &'static str = Box::leak(format!("dep{i}").into_boxed_str());
                let txn = ctl.create_update_transaction();
                let svc = registry
                    .install(&txn, ServiceBuilder::new(name, Recording::new(name, &journal)).requires("base"))
                    .unwrap();
                txn.prepare().await.unwrap();
                txn.commit().unwrap();

                if i % 3 != 0 {
                    let txn = ctl.create_update_transaction();
                    svc.remove(&txn).unwrap();
                    txn.prepare().await.unwrap();
                    txn.commit().unwrap();
                }
                svc
            })
        })
        .collect();
    let mut survivors = Vec::new();
    for worker in workers {
        let svc = worker.await.unwrap();
        if svc.state() != ServiceState::Removed {
            survivors.push(svc);
        }
    }

    assert_eq!(survivors.len(), DEPENDENTS.div_ceil(3));
    assert_eq!(base.demanded_by(), survivors.len());
    assert_eq!(base.state(), ServiceState::Up);

    let removals: Vec<_> = survivors
        .into_iter()
        .map(|svc| {
            let ctl = Arc::clone(&ctl);
            tokio::spawn(async move {
                let txn = ctl.create_update_transaction();
                svc.remove(&txn).unwrap();
                txn.prepare().await.unwrap();
                txn.commit().unwrap();
            })
        })
        .collect();
    for removal in removals {
        removal.await.unwrap();
    }

    assert_eq!(base.demanded_by(), 0);
    assert_eq!(base.state(), ServiceState::Down);
}
