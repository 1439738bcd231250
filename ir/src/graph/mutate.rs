//! Edge retargeting.
//!
//! Every operation here validates all affected edges (type equality and
//! acyclicity) before changing any of them, so a rejected replacement leaves
//! the graph exactly as it was.

use smallvec::SmallVec;
use snafu::ensure;

use super::{Graph, NodeId, Use, Value};
use crate::error::*;

impl Graph {
    /// Point input `input` of `consumer` at `new`.
    pub fn replace_input(&mut self, consumer: NodeId, input: usize, new: Value) -> Result<()> {
        let old = self.input(consumer, input)?;
        if old == new {
            return Ok(());
        }
        self.check_retarget(old, new, consumer)?;
        self.retarget(Use { consumer, input }, old, new);
        Ok(())
    }

    /// Point every consumer of `old` at `new`.
    ///
    /// Consumers that are `new` itself keep reading `old`, so a replacement
    /// may wrap the value it replaces.
    pub fn replace_output(&mut self, old: Value, new: Value) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let uses = self.pending_uses(old, new.node)?;
        for usage in &uses {
            self.check_retarget(old, new, usage.consumer)?;
        }
        for usage in uses {
            self.retarget(usage, old, new);
        }
        Ok(())
    }

    /// Retarget every output of `old` to the same-index output of `new`.
    ///
    /// Both nodes must have the same number of outputs with equal types.
    /// The replacement is all-or-nothing across outputs.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let (old_outputs, new_outputs) = (self.node(old)?.outputs.len(), self.node(new)?.outputs.len());
        ensure!(old_outputs == new_outputs, OutputCountMismatchSnafu { old: old_outputs, new: new_outputs });

        let mut plan: SmallVec<[(Use, Value, Value); 8]> = SmallVec::new();
        for index in 0..old_outputs {
            let (from, to) = (Value::new(old, index), Value::new(new, index));
            for usage in self.pending_uses(from, new)? {
                self.check_retarget(from, to, usage.consumer)?;
                plan.push((usage, from, to));
            }
            // Unused outputs still have to agree for the nodes to be interchangeable.
            self.check_types(from, to)?;
        }

        for (usage, from, to) in plan {
            self.retarget(usage, from, to);
        }
        self.replace_root(old, new);
        Ok(())
    }

    /// Uses of `old` that a replacement by `new` would retarget.
    fn pending_uses(&self, old: Value, new: NodeId) -> Result<SmallVec<[Use; 4]>> {
        Ok(self.users(old)?.iter().copied().filter(|usage| usage.consumer != new).collect())
    }

    fn check_types(&self, old: Value, new: Value) -> Result<()> {
        let (old_ty, new_ty) = (self.ty(old)?, self.ty(new)?);
        ensure!(old_ty == new_ty, ReplacementTypeMismatchSnafu { old: old_ty.clone(), new: new_ty.clone() });
        Ok(())
    }

    fn check_retarget(&self, old: Value, new: Value, consumer: NodeId) -> Result<()> {
        self.check_types(old, new)?;
        let cyclic = consumer == new.node || self.depends_on(new.node, consumer);
        ensure!(!cyclic, WouldCreateCycleSnafu { consumer, producer: new.node });
        Ok(())
    }

    fn retarget(&mut self, usage: Use, old: Value, new: Value) {
        let users = &mut self.output_mut(old).users;
        if let Some(position) = users.iter().position(|u| *u == usage) {
            users.remove(position);
        }
        self.output_mut(new).users.push(usage);
        if let Ok(consumer) = self.node_mut(usage.consumer) {
            consumer.inputs[usage.input] = new;
        }
        tracing::trace!(consumer = %usage.consumer, input = usage.input, from = %old, to = %new, "edge retargeted");
    }

    /// Keep declared results pointing at live nodes after a replacement.
    fn replace_root(&mut self, old: NodeId, new: NodeId) {
        for root in self.results.iter_mut() {
            if *root == old {
                *root = new;
            }
        }
    }
}
