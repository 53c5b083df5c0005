//! Link bookkeeping properties across notification sequences.

use std::collections::BTreeSet;

use svc_monitor::cache::testing::RecordBuilder;
use svc_monitor::cache::Relation;
use svc_monitor::prelude::*;

use crate::support::{health_monitor, id, member, pool, vip, Harness};

fn port(name: &str, network: &str) -> RecordBuilder {
    RecordBuilder::for_kind(EntityKind::VirtualMachineInterface, name)
        .reference(EntityKind::VirtualNetwork, network)
}

fn network(name: &str) -> RecordBuilder {
    RecordBuilder::for_kind(EntityKind::VirtualNetwork, name)
}

#[test]
fn repeated_upserts_keep_one_entity() {
    let h = Harness::new();

    assert_eq!(
        h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web")),
        NotificationOutcome::Created
    );
    for _ in 0..5 {
        assert_eq!(
            h.update(EntityKind::LoadBalancerPool, "pool-1", pool("web")),
            NotificationOutcome::Refreshed
        );
        // A duplicate create behaves like an update.
        assert_eq!(
            h.manager.on_create(EntityKind::LoadBalancerPool, &id("pool-1")).unwrap(),
            NotificationOutcome::Refreshed
        );
    }

    assert_eq!(h.manager.pools().len(), 1);
    assert_eq!(h.manager.pools().stats().created(), 1);
    assert_eq!(h.manager.pools().stats().refreshed(), 10);
    // Unchanged snapshots are provisioned once.
    assert_eq!(h.agent.adds_for(&id("pool-1")), 1);
}

#[test]
fn forward_links_are_mirrored_on_registered_peers() {
    let h = Harness::new();

    h.create(EntityKind::VirtualNetwork, "vn-1", network("vn-1"));
    h.create(EntityKind::VirtualNetwork, "vn-2", network("vn-2"));
    for (uuid, vn) in [("vmi-1", "vn-1"), ("vmi-2", "vn-1"), ("vmi-3", "vn-2")] {
        h.create(EntityKind::VirtualMachineInterface, uuid, port(uuid, vn));
    }
    // Move a port between networks.
    h.update(EntityKind::VirtualMachineInterface, "vmi-2", port("vmi-2", "vn-2"));

    for vmi in h.manager.virtual_machine_interfaces().entities() {
        let vn = vmi.virtual_network().unwrap();
        let network = h.manager.virtual_networks().get(vn).unwrap();
        assert!(network.virtual_machine_interfaces().contains(vmi.uuid()));
    }

    let vn1 = h.manager.virtual_networks().get(&id("vn-1")).unwrap();
    assert_eq!(vn1.virtual_machine_interfaces().len(), 1);
    assert!(h.manager.check_consistency().is_empty());
}

#[test]
fn delete_unwinds_every_back_link() {
    let h = Harness::new();
    for uuid in ["p1", "p2", "p3"] {
        h.create(EntityKind::LoadBalancerPool, uuid, pool(uuid));
    }
    h.create(EntityKind::HealthMonitor, "hm", health_monitor("hm", &["p1", "p2", "p3"]));

    h.delete(EntityKind::HealthMonitor, "hm");

    for uuid in ["p1", "p2", "p3"] {
        let pool = h.manager.pools().get(&id(uuid)).unwrap();
        assert!(pool.health_monitors().is_empty(), "{uuid} still lists hm");
    }
    assert!(h.manager.check_consistency().is_empty());
}

#[test]
fn out_of_order_arrival_leaves_back_link_deferred() {
    let h = Harness::new();

    // The vip names a pool that has not been created yet.
    h.put(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    h.create(EntityKind::VirtualIp, "vip-1", vip("vip-1", "pool-1"));
    assert_eq!(h.manager.virtual_ips().stats().back_links_deferred(), 0);
    assert_eq!(h.manager.pools().stats().back_links_deferred(), 1);

    // The pool's own record does not list the vip, so its creation does not
    // re-derive the back-link. This is an accepted gap.
    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    assert_eq!(pool.links().back_refs(EntityKind::VirtualIp), Some(&BTreeSet::new()));
    assert!(pool.virtual_ips().is_empty());
    // The vip's own reference is unaffected.
    let vip = h.manager.virtual_ips().get(&id("vip-1")).unwrap();
    assert_eq!(vip.pool(), Some(&id("pool-1")));

    let violations = h.manager.check_consistency();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].owner, id("vip-1"));
    assert_eq!(violations[0].peer, id("pool-1"));
    assert_eq!(violations[0].relation, Relation::Reference);

    // An explicit repair pass closes the gap.
    let report = h.manager.reconcile_links();
    assert_eq!(report.back_links_added, 1);
    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    assert!(pool.virtual_ips().contains(&id("vip-1")));
    assert!(h.manager.check_consistency().is_empty());

    // Repair is idempotent.
    assert!(h.manager.reconcile_links().is_empty());
}

#[test]
fn out_of_order_arrival_self_heals_when_record_lists_back_ref() {
    let h = Harness::new();

    h.put(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    h.create(EntityKind::VirtualIp, "vip-1", vip("vip-1", "pool-1"));
    h.create(
        EntityKind::LoadBalancerPool,
        "pool-1",
        pool("web").back_reference(EntityKind::VirtualIp, "vip-1"),
    );

    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    assert_eq!(pool.virtual_ip(), Some(&id("vip-1")));
    assert!(h.manager.check_consistency().is_empty());
}

#[test]
fn reconcile_on_create_adopts_earlier_referrers() {
    let h = Harness::with(|builder| builder.reconcile_on_create(true));

    h.put(EntityKind::VirtualNetwork, "vn-1", network("vn-1"));
    h.create(EntityKind::VirtualMachineInterface, "vmi-1", port("vmi-1", "vn-1"));
    h.create(EntityKind::VirtualMachineInterface, "vmi-2", port("vmi-2", "vn-1"));
    h.create(EntityKind::VirtualNetwork, "vn-1", network("vn-1"));

    let vn = h.manager.virtual_networks().get(&id("vn-1")).unwrap();
    assert_eq!(vn.virtual_machine_interfaces().len(), 2);
    assert!(h.manager.check_consistency().is_empty());
}

#[test]
fn child_created_before_parent_is_adopted_by_repair() {
    let h = Harness::new();

    h.put(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    h.create(EntityKind::LoadBalancerMember, "m-1", member("m-1", "pool-1"));
    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));

    assert!(h.manager.pools().get(&id("pool-1")).unwrap().members().is_empty());
    let violations = h.manager.check_consistency();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].relation, Relation::Containment);

    let report = h.manager.reconcile_links();
    assert_eq!(report.containment_added, 1);
    assert!(h.manager.pools().get(&id("pool-1")).unwrap().members().contains(&id("m-1")));
}

#[test]
fn multi_valued_refresh_touches_only_the_difference() {
    let h = Harness::new();
    for uuid in ["x", "y", "z", "w"] {
        h.create(EntityKind::LoadBalancerPool, uuid, pool(uuid));
    }
    h.create(EntityKind::HealthMonitor, "hm", health_monitor("hm", &["x", "y", "z"]));

    let stats = h.manager.pools().stats();
    let (added, removed) = (stats.back_links_added(), stats.back_links_removed());

    h.update(EntityKind::HealthMonitor, "hm", health_monitor("hm", &["y", "z", "w"]));

    assert_eq!(stats.back_links_added(), added + 1);
    assert_eq!(stats.back_links_removed(), removed + 1);

    let monitors = |uuid: &str| h.manager.pools().get(&id(uuid)).unwrap().health_monitors();
    assert!(!monitors("x").contains(&id("hm")));
    for uuid in ["y", "z", "w"] {
        assert!(monitors(uuid).contains(&id("hm")));
    }
}

#[test]
fn second_delete_is_a_no_op() {
    let h = Harness::new();
    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));

    assert_eq!(
        h.delete(EntityKind::LoadBalancerPool, "pool-1"),
        NotificationOutcome::Removed
    );
    assert_eq!(
        h.delete(EntityKind::LoadBalancerPool, "pool-1"),
        NotificationOutcome::Ignored
    );

    assert_eq!(h.agent.deletes_for(&id("pool-1")), 1);
    assert_eq!(h.manager.pools().stats().removed(), 1);
}

#[test]
fn two_vips_on_one_pool_are_both_back_linked() {
    let h = Harness::new();

    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    h.create(EntityKind::VirtualIp, "vip-1", vip("vip-1", "pool-1"));
    h.create(EntityKind::VirtualIp, "vip-2", vip("vip-2", "pool-1"));

    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    let referrers: BTreeSet<_> = [id("vip-1"), id("vip-2")].into_iter().collect();
    assert_eq!(pool.links().back_refs(EntityKind::VirtualIp), Some(&referrers));
    assert!(h.manager.check_consistency().is_empty());
    assert!(h.manager.reconcile_links().is_empty());

    h.delete(EntityKind::VirtualIp, "vip-2");
    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    assert_eq!(pool.virtual_ips(), [id("vip-1")].into_iter().collect::<BTreeSet<_>>());
    assert_eq!(pool.virtual_ip(), Some(&id("vip-1")));
    assert!(h.manager.check_consistency().is_empty());
}

#[test]
fn two_instance_ips_on_one_port_survive_each_other() {
    let h = Harness::new();
    let instance_ip = |name: &str| {
        RecordBuilder::for_kind(EntityKind::InstanceIp, name)
            .reference(EntityKind::VirtualMachineInterface, "vmi-1")
    };

    h.create(
        EntityKind::VirtualMachineInterface,
        "vmi-1",
        RecordBuilder::for_kind(EntityKind::VirtualMachineInterface, "vmi-1"),
    );
    h.create(EntityKind::InstanceIp, "iip-1", instance_ip("iip-1"));
    h.create(EntityKind::InstanceIp, "iip-2", instance_ip("iip-2"));

    let vmi = h.manager.virtual_machine_interfaces().get(&id("vmi-1")).unwrap();
    assert_eq!(vmi.instance_ips().len(), 2);
    assert!(h.manager.check_consistency().is_empty());

    h.delete(EntityKind::InstanceIp, "iip-2");

    let iip = h.manager.instance_ips().get(&id("iip-1")).unwrap();
    assert_eq!(iip.virtual_machine_interface(), Some(&id("vmi-1")));
    let vmi = h.manager.virtual_machine_interfaces().get(&id("vmi-1")).unwrap();
    assert_eq!(vmi.instance_ip(), Some(&id("iip-1")));
    assert_eq!(vmi.instance_ips().len(), 1);
    assert!(h.manager.check_consistency().is_empty());
}

#[test]
fn referrer_refresh_leaves_peer_reference_intact() {
    let h = Harness::new();
    h.create(EntityKind::VirtualNetwork, "vn-1", network("vn-1"));
    h.create(EntityKind::VirtualMachineInterface, "vmi-1", port("vmi-1", "vn-1"));

    // The network lists the port, then stops listing it.
    h.update(
        EntityKind::VirtualNetwork,
        "vn-1",
        network("vn-1").back_reference(EntityKind::VirtualMachineInterface, "vmi-1"),
    );
    h.update(EntityKind::VirtualNetwork, "vn-1", network("vn-1"));

    let vmi = h.manager.virtual_machine_interfaces().get(&id("vmi-1")).unwrap();
    assert_eq!(vmi.virtual_network(), Some(&id("vn-1")));
    let vn = h.manager.virtual_networks().get(&id("vn-1")).unwrap();
    assert!(vn.virtual_machine_interfaces().contains(&id("vmi-1")));
    assert!(h.manager.check_consistency().is_empty());
}
