//! Read, parse, and agent failures.

use serde_json::json;
use svc_monitor::cache::testing::RecordBuilder;
use svc_monitor::prelude::*;

use crate::support::{id, member, pool, vip, Harness};

#[test]
fn transient_read_failure_leaves_registries_untouched() {
    let h = Harness::new();
    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));

    h.server.fail_next("connection reset");
    h.put(EntityKind::LoadBalancerPool, "pool-1", pool("web").display_name("renamed"));
    let err = h
        .manager
        .on_update(EntityKind::LoadBalancerPool, &id("pool-1"))
        .unwrap_err();

    assert!(matches!(err, SvcMonError::Transient { .. }));
    assert!(err.is_retryable());
    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    assert_eq!(pool.meta().effective_name(), "web");
    assert_eq!(h.manager.metrics().failures(), 1);

    // The retry succeeds.
    h.manager
        .on_update(EntityKind::LoadBalancerPool, &id("pool-1"))
        .unwrap();
    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    assert_eq!(pool.meta().effective_name(), "renamed");
}

#[test]
fn malformed_refresh_keeps_previous_state() {
    let h = Harness::new();
    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    h.create(EntityKind::VirtualIp, "vip-1", vip("vip-1", "pool-1"));

    // Drop the required properties while also moving the pool reference.
    h.put(
        EntityKind::VirtualIp,
        "vip-1",
        RecordBuilder::for_kind(EntityKind::VirtualIp, "vip-1")
            .field("virtual_ip_properties", json!(null))
            .reference(EntityKind::LoadBalancerPool, "pool-2"),
    );
    let err = h
        .manager
        .on_update(EntityKind::VirtualIp, &id("vip-1"))
        .unwrap_err();

    assert!(matches!(err, SvcMonError::MalformedObject { .. }));
    assert!(!err.is_retryable());

    let vip = h.manager.virtual_ips().get(&id("vip-1")).unwrap();
    assert_eq!(vip.pool(), Some(&id("pool-1")));
    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    assert_eq!(pool.virtual_ip(), Some(&id("vip-1")));
}

#[test]
fn malformed_create_registers_nothing() {
    let h = Harness::new();
    h.put(
        EntityKind::LoadBalancerMember,
        "m-1",
        RecordBuilder::for_kind(EntityKind::LoadBalancerMember, "m-1"),
    );

    let err = h
        .manager
        .on_create(EntityKind::LoadBalancerMember, &id("m-1"))
        .unwrap_err();

    assert!(matches!(err, SvcMonError::MalformedObject { .. }));
    assert!(h.manager.members().is_empty());
    assert!(h.agent.calls().is_empty());
}

#[test]
fn missing_object_on_refresh_is_torn_down() {
    let h = Harness::new();
    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    h.create(EntityKind::LoadBalancerMember, "m-1", member("m-1", "pool-1"));

    // An update arrives after the object was deleted on the server.
    h.server.remove(EntityKind::LoadBalancerMember, "m-1");
    let outcome = h
        .manager
        .on_update(EntityKind::LoadBalancerMember, &id("m-1"))
        .unwrap();

    assert_eq!(outcome, NotificationOutcome::Removed);
    assert!(!h.manager.members().contains(&id("m-1")));
    assert!(h.manager.pools().get(&id("pool-1")).unwrap().members().is_empty());
    assert_eq!(h.agent.deletes_for(&id("m-1")), 1);
}

#[test]
fn missing_object_on_create_is_ignored() {
    let h = Harness::new();

    let outcome = h
        .manager
        .on_create(EntityKind::VirtualNetwork, &id("vn-gone"))
        .unwrap();

    assert_eq!(outcome, NotificationOutcome::Ignored);
    assert_eq!(h.manager.entity_count(), 0);
}

#[test]
fn agent_add_failure_propagates_and_next_update_retries() {
    let h = Harness::new();
    h.agent.fail_add_for("pool-1");
    h.put(EntityKind::LoadBalancerPool, "pool-1", pool("web"));

    let err = h
        .manager
        .on_create(EntityKind::LoadBalancerPool, &id("pool-1"))
        .unwrap_err();
    assert!(matches!(err, SvcMonError::Agent { operation: "add", .. }));

    // The registry keeps the refreshed entity, unprovisioned.
    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    assert!(pool.last_provisioned().is_none());

    h.agent.reset_failures();
    h.manager
        .on_update(EntityKind::LoadBalancerPool, &id("pool-1"))
        .unwrap();

    let pool = h.manager.pools().get(&id("pool-1")).unwrap();
    assert!(pool.last_provisioned().is_some());
    assert_eq!(h.agent.adds_for(&id("pool-1")), 2);
}

#[test]
fn agent_delete_failure_still_erases_entity() {
    let h = Harness::new();
    h.create(EntityKind::LoadBalancerPool, "pool-1", pool("web"));
    h.create(EntityKind::VirtualIp, "vip-1", vip("vip-1", "pool-1"));
    h.agent.fail_delete_for("pool-1");

    h.server.remove(EntityKind::LoadBalancerPool, "pool-1");
    let err = h
        .manager
        .on_delete(EntityKind::LoadBalancerPool, &id("pool-1"))
        .unwrap_err();

    assert!(matches!(err, SvcMonError::Agent { operation: "delete", .. }));
    assert!(!h.manager.pools().contains(&id("pool-1")));
    assert_eq!(h.manager.virtual_ips().get(&id("vip-1")).unwrap().pool(), None);

    // A repeated delete finds nothing left to do.
    assert_eq!(
        h.manager
            .on_delete(EntityKind::LoadBalancerPool, &id("pool-1"))
            .unwrap(),
        NotificationOutcome::Ignored
    );
}

#[test]
fn deleting_unprovisioned_entity_passes_no_handle() {
    let h = Harness::new();
    h.agent.fail_add_for("vip-1");
    h.put(EntityKind::VirtualIp, "vip-1", vip("vip-1", "pool-1"));
    let _ = h.manager.on_create(EntityKind::VirtualIp, &id("vip-1"));

    h.delete(EntityKind::VirtualIp, "vip-1");

    assert_eq!(h.agent.deletes_for(&id("vip-1")), 1);
    assert_eq!(h.agent.last_delete_handle_for(&id("vip-1")), None);
}

#[test]
fn failures_are_counted_per_notification() {
    let h = Harness::new();
    h.server.fail_next("down");
    h.server.fail_next("down");

    for _ in 0..2 {
        assert!(h
            .manager
            .on_create(EntityKind::Project, &id("p1"))
            .is_err());
    }
    assert!(h.manager.handle_raw("CREATE", "no-such-kind", "x").is_err());

    // Unparseable notifications never reach dispatch.
    assert_eq!(h.manager.metrics().failures(), 2);
    assert_eq!(h.manager.metrics().notifications(), 0);
}
