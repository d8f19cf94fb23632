//! Frame and lifecycle dispatch on [`ScriptSystem`]

use crate::instance::{HookFailure, HookKind, InstanceRef};
use crate::role::ScriptRole;
use crate::system::ScriptSystem;
use std::sync::atomic::Ordering;

/// Outcome of one bulk hook dispatch
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Hooks invoked
    pub invoked: usize,
    /// Hooks that returned an error or panicked
    pub failures: Vec<HookFailure>,
}

impl DispatchReport {
    /// No hook failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl ScriptSystem {
    // ========== Lifecycle Methods ==========

    /// Advance the frame clock and update every flagged instance
    ///
    /// Instances in the `Unknown` bucket are never updated. A failing hook is
    /// logged and the remaining instances still run.
    pub fn on_update(&self, delta_time: f32) -> DispatchReport {
        self.clock.advance(delta_time);

        let instances: Vec<InstanceRef> = {
            let registry = self.registry.read();
            ScriptRole::ALL
                .iter()
                .filter(|role| !role.is_any())
                .flat_map(|role| registry.instances_in(*role))
                .collect()
        };

        self.dispatch(instances, HookKind::Update, |i| i.receives_updates())
    }

    /// Notify every live instance that a reload completed
    pub fn on_post_reload(&self) -> DispatchReport {
        let instances = self.registry.read().instances_in(ScriptRole::Unknown);
        self.dispatch(instances, HookKind::ScriptReload, |_| true)
    }

    /// Flush flow node registrations queued before the flow system was ready
    pub fn post_init(&self) {
        self.flow_ready.store(true, Ordering::Release);

        let nodes = std::mem::take(&mut *self.deferred_flow_nodes.lock());
        for node in &nodes {
            self.host.register_flow_node(node);
        }
        if !nodes.is_empty() {
            log::info!("Registered {} deferred flow node(s)", nodes.len());
        }
    }

    /// Whether `post_init` has run
    pub fn is_flow_ready(&self) -> bool {
        self.flow_ready.load(Ordering::Acquire)
    }

    fn dispatch(
        &self,
        instances: Vec<InstanceRef>,
        hook: HookKind,
        mut filter: impl FnMut(&InstanceRef) -> bool,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for instance in instances {
            // Removed by an earlier hook in this pass
            if instance.is_removed() || !filter(&instance) {
                continue;
            }

            report.invoked += 1;
            if let Err(failure) = instance.invoke(hook) {
                log::warn!("{}", failure);
                report.failures.push(failure);
            }
        }

        report
    }
}
