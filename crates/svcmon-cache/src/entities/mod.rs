//! Typed entity kinds.
//!
//! One struct per mirrored kind, grouped by the subsystem that owns it.

mod loadbalancer;
mod network;
mod physical;
mod project;
mod service;

pub use loadbalancer::{
    HealthMonitor, HealthMonitorProperties, LoadBalancerMember, LoadBalancerPool,
    MemberProperties, PoolProperties, VirtualIp, VirtualIpProperties,
};
pub use network::{InstanceIp, VirtualMachineInterface, VirtualNetwork};
pub use physical::{LogicalInterface, LogicalInterfaceParent, PhysicalInterface, PhysicalRouter};
pub use project::Project;
pub use service::{ServiceInstance, ServiceTemplate};
