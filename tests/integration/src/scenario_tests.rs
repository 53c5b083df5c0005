//! End-to-end load-balancer flows.

use svc_monitor::cache::testing::{AgentCall, RecordBuilder};
use svc_monitor::prelude::*;

use crate::support::{health_monitor, id, member, pool, vip, Harness};

#[test]
fn member_joins_existing_pool_and_is_provisioned_once() {
    let h = Harness::new();

    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    assert!(h.manager.pools().get(&id("pool-1")).unwrap().members().is_empty());

    let outcome = h.create(EntityKind::LoadBalancerMember, "m-1", member("m-1", "pool-1"));
    assert_eq!(outcome, NotificationOutcome::Created);

    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    assert_eq!(pool.members().iter().collect::<Vec<_>>(), vec![&id("m-1")]);
    assert_eq!(h.agent.adds_for(&id("m-1")), 1);

    let member = h.manager.members().get(&id("m-1")).unwrap();
    assert_eq!(member.pool(), Some(&id("pool-1")));
    assert!(member.last_provisioned().is_some());
}

#[test]
fn deleting_pool_clears_vip_reference_and_deprovisions() {
    let h = Harness::new();

    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    h.create(EntityKind::VirtualIp, "vip-1", vip("vip-1", "pool-1"));
    assert_eq!(
        h.manager.pools().get(&id("pool-1")).unwrap().virtual_ip(),
        Some(&id("vip-1"))
    );

    let outcome = h.delete(EntityKind::LoadBalancerPool, "pool-1");
    assert_eq!(outcome, NotificationOutcome::Removed);

    assert!(!h.manager.pools().contains(&id("pool-1")));
    let vip = h.manager.virtual_ips().get(&id("vip-1")).unwrap();
    assert_eq!(vip.pool(), None);

    assert_eq!(h.agent.deletes_for(&id("pool-1")), 1);
    let handle = h.agent.last_delete_handle_for(&id("pool-1")).unwrap();
    assert!(handle.as_str().starts_with("loadbalancer_pool/pool-1#"));
}

#[test]
fn health_monitor_moves_between_pools() {
    let h = Harness::new();
    for uuid in ["p1", "p2", "p3"] {
        h.create(EntityKind::LoadBalancerPool, uuid, pool(uuid));
    }

    h.create(EntityKind::HealthMonitor, "hm", health_monitor("hm", &["p1", "p2"]));
    let added_before = h.manager.pools().stats().back_links_added();

    h.update(EntityKind::HealthMonitor, "hm", health_monitor("hm", &["p2", "p3"]));

    let monitors = |uuid: &str| h.manager.pools().get(&id(uuid)).unwrap().health_monitors();
    assert!(!monitors("p1").contains(&id("hm")));
    assert!(monitors("p2").contains(&id("hm")));
    assert!(monitors("p3").contains(&id("hm")));

    // Only p3 gained a back-link on the update.
    assert_eq!(h.manager.pools().stats().back_links_added(), added_before + 1);
    assert_eq!(
        h.manager.health_monitors().get(&id("hm")).unwrap().pools().len(),
        2
    );
}

#[test]
fn pool_refresh_provisions_members_and_vip() {
    let h = Harness::new();

    h.put(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    h.create(EntityKind::LoadBalancerMember, "m-1", member("m-1", "pool-1"));
    h.create(EntityKind::VirtualIp, "vip-1", vip("vip-1", "pool-1"));
    h.agent.clear();

    // The pool arrives last, listing its member and vip itself.
    h.create(
        EntityKind::LoadBalancerPool,
        "pool-1",
        pool("web")
            .child(EntityKind::LoadBalancerMember, "m-1")
            .back_reference(EntityKind::VirtualIp, "vip-1"),
    );

    let calls = h.agent.calls();
    assert!(matches!(&calls[0], AgentCall::Add(ProvisionSnapshot::Pool(_))));

    let ProvisionSnapshot::Pool(snapshot) = h.agent.last_add_for(&id("pool-1")).unwrap() else {
        panic!("expected a pool snapshot");
    };
    assert!(snapshot.members.contains(&id("m-1")));
    assert_eq!(snapshot.virtual_ip, Some(id("vip-1")));

    // Member and vip snapshots are unchanged, so the pool refresh skips them.
    assert_eq!(h.agent.adds_for(&id("m-1")), 0);
    assert_eq!(h.agent.adds_for(&id("vip-1")), 0);
}

#[test]
fn always_policy_reprovisions_children_on_pool_refresh() {
    let h = Harness::with(|builder| builder.provision_policy(ProvisionPolicy::Always));

    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    h.create(EntityKind::LoadBalancerMember, "m-1", member("m-1", "pool-1"));
    h.create(EntityKind::VirtualIp, "vip-1", vip("vip-1", "pool-1"));
    h.agent.clear();

    h.update(
        EntityKind::LoadBalancerPool,
        "pool-1",
        pool("web")
            .child(EntityKind::LoadBalancerMember, "m-1")
            .back_reference(EntityKind::VirtualIp, "vip-1"),
    );

    assert_eq!(h.agent.adds_for(&id("pool-1")), 1);
    assert_eq!(h.agent.adds_for(&id("m-1")), 1);
    assert_eq!(h.agent.adds_for(&id("vip-1")), 1);
}

#[test]
fn member_delete_leaves_pool_and_deprovisions() {
    let h = Harness::new();

    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    h.create(EntityKind::LoadBalancerMember, "m-1", member("m-1", "pool-1"));
    h.create(EntityKind::LoadBalancerMember, "m-2", member("m-2", "pool-1"));

    h.delete(EntityKind::LoadBalancerMember, "m-1");

    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    assert_eq!(pool.members().iter().collect::<Vec<_>>(), vec![&id("m-2")]);
    assert_eq!(h.agent.deletes_for(&id("m-1")), 1);
    assert!(h.manager.check_consistency().is_empty());
}

#[test]
fn logical_interface_registers_with_tagged_parent_only() {
    let h = Harness::new();

    h.create(
        EntityKind::PhysicalRouter,
        "pr-1",
        RecordBuilder::for_kind(EntityKind::PhysicalRouter, "qfx-1"),
    );
    h.create(
        EntityKind::PhysicalInterface,
        "pi-1",
        RecordBuilder::for_kind(EntityKind::PhysicalInterface, "xe-0")
            .parent(EntityKind::PhysicalRouter, "pr-1"),
    );
    h.create(
        EntityKind::LogicalInterface,
        "li-router",
        RecordBuilder::for_kind(EntityKind::LogicalInterface, "irb")
            .parent(EntityKind::PhysicalRouter, "pr-1"),
    );
    h.create(
        EntityKind::LogicalInterface,
        "li-port",
        RecordBuilder::for_kind(EntityKind::LogicalInterface, "xe-0.1")
            .parent(EntityKind::PhysicalInterface, "pi-1"),
    );

    let router = h.manager.physical_routers().get(&id("pr-1")).unwrap();
    assert!(router.physical_interfaces().contains(&id("pi-1")));
    assert_eq!(
        router.logical_interfaces().iter().collect::<Vec<_>>(),
        vec![&id("li-router")]
    );

    let interface = h.manager.physical_interfaces().get(&id("pi-1")).unwrap();
    assert_eq!(
        interface.logical_interfaces().iter().collect::<Vec<_>>(),
        vec![&id("li-port")]
    );

    h.delete(EntityKind::LogicalInterface, "li-router");
    let router = h.manager.physical_routers().get(&id("pr-1")).unwrap();
    assert!(router.logical_interfaces().is_empty());
    // Physical kinds are never handed to the agent.
    assert!(h.agent.calls().is_empty());
}

#[test]
fn service_template_and_instance_reconcile_independently() {
    let h = Harness::new();
    let record = |kind, name| RecordBuilder::for_kind(kind, name);

    h.create(
        EntityKind::ServiceTemplate,
        "st-1",
        record(EntityKind::ServiceTemplate, "haproxy")
            .back_reference(EntityKind::ServiceInstance, "si-1"),
    );
    h.create(
        EntityKind::ServiceInstance,
        "si-1",
        record(EntityKind::ServiceInstance, "lb-si").reference(EntityKind::ServiceTemplate, "st-1"),
    );

    let template = h.manager.service_templates().get(&id("st-1")).unwrap();
    assert!(template.service_instances().contains(&id("si-1")));

    // The template stops listing the instance; the instance still names it.
    h.update(EntityKind::ServiceTemplate, "st-1", record(EntityKind::ServiceTemplate, "haproxy"));

    let instance = h.manager.service_instances().get(&id("si-1")).unwrap();
    assert_eq!(instance.service_template(), Some(&id("st-1")));
    let template = h.manager.service_templates().get(&id("st-1")).unwrap();
    assert!(template.service_instances().contains(&id("si-1")));
    assert!(h.manager.check_consistency().is_empty());

    // Only the instance's own refresh drops its reference.
    h.update(EntityKind::ServiceInstance, "si-1", record(EntityKind::ServiceInstance, "lb-si"));
    let instance = h.manager.service_instances().get(&id("si-1")).unwrap();
    assert_eq!(instance.service_template(), None);
    let template = h.manager.service_templates().get(&id("st-1")).unwrap();
    assert!(template.service_instances().is_empty());
}

#[test]
fn pool_refresh_keeps_vip_reference() {
    let h = Harness::new();
    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    h.create(EntityKind::VirtualIp, "vip-1", vip("vip-1", "pool-1"));

    // The pool's record does not list the vip; refreshing it changes nothing
    // on the vip side.
    h.update(EntityKind::LoadBalancerPool, "pool-1", pool("web"));

    let vip = h.manager.virtual_ips().get(&id("vip-1")).unwrap();
    assert_eq!(vip.pool(), Some(&id("pool-1")));
    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    assert_eq!(pool.virtual_ip(), Some(&id("vip-1")));
    assert!(h.manager.check_consistency().is_empty());
}

#[test]
fn raw_notifications_are_routed_by_type_name() {
    let h = Harness::new();
    h.put(EntityKind::LoadBalancerPool, "pool-1", pool("web"));

    let outcome = h
        .manager
        .handle_raw("CREATE", "loadbalancer-pool", "pool-1")
        .unwrap();
    assert_eq!(outcome, NotificationOutcome::Created);

    let outcome = h
        .manager
        .handle_raw("UPDATE", "loadbalancer_pool", "pool-1")
        .unwrap();
    assert_eq!(outcome, NotificationOutcome::Refreshed);

    assert!(h.manager.handle_raw("RENAME", "loadbalancer-pool", "pool-1").is_err());
    assert!(h.manager.handle_raw("CREATE", "route-table", "rt-1").is_err());
    assert_eq!(h.manager.entity_count(), 1);
}
