//! Load tests with 1000+ entities.
//!
//! These tests verify the cache under larger graphs:
//! - 1000 pools with members created in arbitrary order
//! - Concurrent notification sources funneled through one manager
//! - Link consistency after heavy churn
//!
//! Run with: `cargo test --package svcmon-integration-tests load_tests -- --nocapture`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use svc_monitor::cache::testing::RecordBuilder;
use svc_monitor::prelude::*;

use crate::support::{id, member, pool, Harness};

/// Test that the cache can mirror 1000 pools with their members.
#[test]
fn test_1000_pools_with_members() {
    let h = Harness::new();
    let num_pools = 1000;

    for i in 0..num_pools {
        h.put(EntityKind::LoadBalancerPool, &format!("pool-{i}"), pool(&format!("pool-{i}")));
        h.put(
            EntityKind::LoadBalancerMember,
            &format!("m-{i}"),
            member(&format!("m-{i}"), &format!("pool-{i}")),
        );
    }

    let start = Instant::now();

    // Members of even pools arrive before their pool.
    for i in 0..num_pools {
        let pool_id = (EntityKind::LoadBalancerPool, id(&format!("pool-{i}")));
        let member_id = (EntityKind::LoadBalancerMember, id(&format!("m-{i}")));
        let order = if i % 2 == 0 {
            [member_id, pool_id]
        } else {
            [pool_id, member_id]
        };
        for (kind, uuid) in &order {
            h.manager.on_create(*kind, uuid).unwrap();
        }
    }

    let duration = start.elapsed();
    println!(
        "Created {} entities in {:?} ({:.2} µs/op)",
        num_pools * 2,
        duration,
        duration.as_micros() as f64 / (num_pools * 2) as f64
    );

    assert_eq!(h.manager.pools().len(), num_pools);
    assert_eq!(h.manager.members().len(), num_pools);

    // Half of the containment memberships were deferred.
    let start = Instant::now();
    let report = h.manager.reconcile_links();
    println!("Reconciled in {:?}: {:?}", start.elapsed(), report);

    assert_eq!(report.containment_added, num_pools / 2);
    assert!(h.manager.check_consistency().is_empty());
}

/// Test concurrent notification sources against one manager.
#[test]
fn test_concurrent_notification_sources() {
    let h = Arc::new(Harness::new());
    let num_ports = 1000;
    let num_threads = 10;
    let ports_per_thread = num_ports / num_threads;

    let mut network = RecordBuilder::for_kind(EntityKind::VirtualNetwork, "vn");
    for i in 0..num_ports {
        let port = format!("vmi-{i}");
        network = network.back_reference(EntityKind::VirtualMachineInterface, &port);
        h.put(
            EntityKind::VirtualMachineInterface,
            &port,
            RecordBuilder::for_kind(EntityKind::VirtualMachineInterface, &port)
                .reference(EntityKind::VirtualNetwork, "vn"),
        );
    }
    h.create(EntityKind::VirtualNetwork, "vn", network);

    let barrier = Arc::new(Barrier::new(num_threads));
    let total_ops = Arc::new(AtomicU64::new(0));

    let start = Instant::now();

    thread::scope(|scope| {
        for thread_id in 0..num_threads {
            let h = Arc::clone(&h);
            let barrier = Arc::clone(&barrier);
            let total_ops = Arc::clone(&total_ops);

            scope.spawn(move || {
                // Wait for all threads to be ready
                barrier.wait();

                for i in thread_id * ports_per_thread..(thread_id + 1) * ports_per_thread {
                    let port = id(&format!("vmi-{i}"));
                    h.manager
                        .on_create(EntityKind::VirtualMachineInterface, &port)
                        .unwrap();
                    h.manager
                        .on_update(EntityKind::VirtualMachineInterface, &port)
                        .unwrap();
                    total_ops.fetch_add(2, Ordering::Relaxed);
                }
            });
        }
    });

    let duration = start.elapsed();
    let ops = total_ops.load(Ordering::Relaxed);

    println!(
        "Concurrent notifications: {} ops in {:?} ({:.2} µs/op, {:.0} ops/sec)",
        ops,
        duration,
        duration.as_micros() as f64 / ops as f64,
        ops as f64 / duration.as_secs_f64()
    );

    assert_eq!(h.manager.virtual_machine_interfaces().len(), num_ports);
    let vn = h.manager.virtual_networks().get(&id("vn")).unwrap();
    assert_eq!(vn.virtual_machine_interfaces().len(), num_ports);
    assert_eq!(h.manager.metrics().notifications(), ops + 1);
    assert!(h.manager.check_consistency().is_empty());
}

/// Test that heavy churn leaves no dangling back-links.
#[test]
fn test_churn_leaves_no_dangling_links() {
    let h = Harness::new();
    let num_pools = 50;

    for i in 0..num_pools {
        h.create(EntityKind::LoadBalancerPool, &format!("pool-{i}"), pool(&format!("pool-{i}")));
    }

    // Each round re-points every monitor at a sliding window of pools.
    for round in 0..20 {
        for m in 0..10 {
            let pools: Vec<String> = (0..5)
                .map(|k| format!("pool-{}", (round + m * 5 + k) % num_pools))
                .collect();
            let record = pools.iter().fold(
                RecordBuilder::for_kind(EntityKind::HealthMonitor, &format!("hm-{m}")),
                |record, pool| record.reference(EntityKind::LoadBalancerPool, pool),
            );
            h.update(EntityKind::HealthMonitor, &format!("hm-{m}"), record);
        }
    }
    assert!(h.manager.check_consistency().is_empty());

    for m in 0..10 {
        h.delete(EntityKind::HealthMonitor, &format!("hm-{m}"));
    }

    for pool in h.manager.pools().entities() {
        assert!(pool.health_monitors().is_empty(), "{} kept a monitor", pool.uuid());
    }
    assert!(h.manager.check_consistency().is_empty());
    assert_eq!(h.manager.entity_count(), num_pools);
}
