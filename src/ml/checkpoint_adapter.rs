// ============================================================
// Layer 5 — Checkpoint Adapter
// ============================================================
// Turns a foreign parameter set (a checkpoint trained on another
// label taxonomy, possibly saved from a replicated-training run)
// into a set the live model can load.
//
//   1. drop     remove every name in `drop_names`; used for the
//               output layer, whose shape depends on class count
//   2. rename   if ALL foreign names carry the replication prefix
//               and NO target name does, strip it; the reverse case
//               adds it; anything else leaves names untouched
//   3. match    Partial: keep only names the target expects
//               Strict:  any name left over on either side fails
//
// Shape checks happen afterwards, against the live model's
// shapes, in `load_into`.

use std::collections::BTreeSet;

use anyhow::{Context, Result};

use crate::domain::error::AdaptError;
use crate::domain::parameter_set::ParameterSet;
use crate::domain::traits::ParameterStore;

/// Prefix that multi-device replication adds to every parameter name.
pub const REPLICATION_PREFIX: &str = "module.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Missing/unknown names on either side are tolerated
    Partial,
    /// Both name sets must agree exactly after dropping and renaming
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixAction {
    Strip,
    Add,
    Keep,
}

/// Decide how foreign names must be rewritten to line up with the target.
pub fn reconcile_prefix<'a, F, T>(foreign: F, target: T, prefix: &str) -> PrefixAction
where
    F: IntoIterator<Item = &'a String>,
    T: IntoIterator<Item = &'a String>,
{
    let (f_prefixed, f_plain) = count_prefixed(foreign, prefix);
    let (t_prefixed, t_plain) = count_prefixed(target, prefix);

    let foreign_all  = f_plain == 0 && f_prefixed > 0;
    let foreign_none = f_prefixed == 0 && f_plain > 0;
    let target_all   = t_plain == 0 && t_prefixed > 0;
    let target_none  = t_prefixed == 0 && t_plain > 0;

    match (foreign_all, foreign_none, target_all, target_none) {
        (true, _, _, true) => PrefixAction::Strip,
        (_, true, true, _) => PrefixAction::Add,
        _ => PrefixAction::Keep,
    }
}

fn count_prefixed<'a, I>(names: I, prefix: &str) -> (usize, usize)
where
    I: IntoIterator<Item = &'a String>,
{
    names.into_iter().fold((0, 0), |(with, without), name| {
        if name.starts_with(prefix) {
            (with + 1, without)
        } else {
            (with, without + 1)
        }
    })
}

/// Apply a `PrefixAction` to every key of `params`.
pub fn rename_keys(params: ParameterSet, action: PrefixAction, prefix: &str) -> ParameterSet {
    match action {
        PrefixAction::Keep => params,
        PrefixAction::Strip => params
            .into_iter()
            .map(|(name, t)| match name.strip_prefix(prefix) {
                Some(rest) => (rest.to_string(), t),
                None => (name, t),
            })
            .collect(),
        PrefixAction::Add => params
            .into_iter()
            .map(|(name, t)| (format!("{prefix}{name}"), t))
            .collect(),
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointAdapter {
    mode: LoadMode,
}

impl CheckpointAdapter {
    pub fn new(mode: LoadMode) -> Self {
        Self { mode }
    }

    /// Produce the subset of `foreign` that maps onto `target_names`.
    pub fn adapt(
        &self,
        mut foreign:  ParameterSet,
        target_names: &BTreeSet<String>,
        drop_names:   &BTreeSet<String>,
    ) -> Result<ParameterSet, AdaptError> {
        for name in drop_names {
            if foreign.remove(name).is_some() {
                tracing::debug!("Dropped '{}' from foreign checkpoint", name);
            }
        }

        let foreign_names = foreign.names();
        let action = reconcile_prefix(&foreign_names, target_names, REPLICATION_PREFIX);
        if action != PrefixAction::Keep {
            tracing::info!("Rewriting checkpoint names ({:?} '{}')", action, REPLICATION_PREFIX);
        }
        let mut foreign = rename_keys(foreign, action, REPLICATION_PREFIX);

        let names = foreign.names();
        let missing: Vec<String>    = target_names.difference(&names).cloned().collect();
        let unexpected: Vec<String> = names.difference(target_names).cloned().collect();

        match self.mode {
            LoadMode::Strict if !missing.is_empty() || !unexpected.is_empty() => {
                Err(AdaptError::NameMismatch { missing, unexpected })
            }
            _ => {
                if !unexpected.is_empty() {
                    tracing::debug!("Ignoring {} unknown checkpoint parameter(s)", unexpected.len());
                }
                if !missing.is_empty() {
                    tracing::info!(
                        "{} parameter(s) keep their initial values: {:?}",
                        missing.len(),
                        missing
                    );
                }
                foreign.retain(|name| target_names.contains(name));
                Ok(foreign)
            }
        }
    }

    /// Adapt `foreign` to `model`, check shapes, and load it.
    ///
    /// Returns the number of parameters overwritten. Nothing is loaded
    /// unless every adapted parameter has the shape the model expects.
    pub fn load_into<M: ParameterStore>(
        &self,
        model:      &mut M,
        foreign:    ParameterSet,
        drop_names: &BTreeSet<String>,
    ) -> Result<usize> {
        let shapes  = model.parameter_shapes();
        let targets: BTreeSet<String> = shapes.keys().cloned().collect();

        let adapted = self.adapt(foreign, &targets, drop_names)?;
        adapted.check_shapes(&shapes)?;

        let loaded = adapted.len();
        model
            .load_state_dict(adapted)
            .context("model rejected adapted parameters")?;
        tracing::info!(
            "Loaded {}/{} parameters from checkpoint ({:?} mode)",
            loaded,
            targets.len(),
            self.mode
        );
        Ok(loaded)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parameter_set::ParamTensor;
    use std::collections::BTreeMap;

    fn set(entries: &[(&str, f32)]) -> ParameterSet {
        entries
            .iter()
            .map(|(n, v)| (n.to_string(), ParamTensor::scalar(*v)))
            .collect()
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strips_prefix_when_only_foreign_has_it() {
        let adapter = CheckpointAdapter::new(LoadMode::Partial);
        let out = adapter
            .adapt(set(&[("module.w", 1.0)]), &names(&["w"]), &BTreeSet::new())
            .unwrap();
        assert_eq!(out, set(&[("w", 1.0)]));
    }

    #[test]
    fn test_adds_prefix_when_only_target_has_it() {
        let adapter = CheckpointAdapter::new(LoadMode::Strict);
        let out = adapter
            .adapt(set(&[("a", 1.0), ("b", 2.0)]), &names(&["module.a", "module.b"]), &BTreeSet::new())
            .unwrap();
        assert_eq!(out.names(), names(&["module.a", "module.b"]));
    }

    #[test]
    fn test_mixed_prefixes_leave_names_alone() {
        let foreign = names(&["module.a", "b"]);
        let target  = names(&["a", "b"]);
        assert_eq!(reconcile_prefix(&foreign, &target, "module."), PrefixAction::Keep);
        assert_eq!(reconcile_prefix(&target, &target, "module."), PrefixAction::Keep);
    }

    #[test]
    fn test_drop_names_removed_even_if_target_expects_them() {
        let adapter = CheckpointAdapter::new(LoadMode::Partial);
        let out = adapter
            .adapt(
                set(&[("classifier.weight", 1.0), ("features.weight", 2.0)]),
                &names(&["classifier.weight", "features.weight"]),
                &names(&["classifier.weight"]),
            )
            .unwrap();
        assert_eq!(out, set(&[("features.weight", 2.0)]));
    }

    #[test]
    fn test_drop_happens_before_prefix_stripping() {
        let adapter = CheckpointAdapter::new(LoadMode::Partial);
        let out = adapter
            .adapt(
                set(&[("module.classifier.bias", 1.0), ("module.conv.bias", 2.0)]),
                &names(&["classifier.bias", "conv.bias"]),
                &names(&["module.classifier.bias"]),
            )
            .unwrap();
        assert_eq!(out, set(&[("conv.bias", 2.0)]));
    }

    #[test]
    fn test_partial_ignores_unknown_and_missing() {
        let adapter = CheckpointAdapter::new(LoadMode::Partial);
        let out = adapter
            .adapt(set(&[("a", 1.0), ("extra", 9.0)]), &names(&["a", "b"]), &BTreeSet::new())
            .unwrap();
        assert_eq!(out, set(&[("a", 1.0)]));
    }

    #[test]
    fn test_strict_reports_both_mismatch_lists() {
        let adapter = CheckpointAdapter::new(LoadMode::Strict);
        let err = adapter
            .adapt(set(&[("a", 1.0), ("extra", 9.0)]), &names(&["a", "b"]), &BTreeSet::new())
            .unwrap_err();
        assert_eq!(
            err,
            AdaptError::NameMismatch {
                missing:    vec!["b".into()],
                unexpected: vec!["extra".into()],
            }
        );
        assert!(err.to_string().contains("1 missing"));
    }

    // Minimal in-memory model for load_into
    struct FakeModel {
        params: ParameterSet,
    }

    impl ParameterStore for FakeModel {
        fn parameter_shapes(&self) -> BTreeMap<String, Vec<usize>> {
            self.params.iter().map(|(n, t)| (n.clone(), t.shape.clone())).collect()
        }

        fn state_dict(&self) -> Result<ParameterSet> {
            Ok(self.params.clone())
        }

        fn load_state_dict(&mut self, params: ParameterSet) -> Result<()> {
            for (name, t) in params {
                self.params.insert(name, t);
            }
            Ok(())
        }
    }

    #[test]
    fn test_load_into_keeps_unmatched_parameters() {
        let mut model = FakeModel { params: set(&[("a", 0.0), ("classifier", 0.0)]) };
        let loaded = CheckpointAdapter::new(LoadMode::Partial)
            .load_into(
                &mut model,
                set(&[("module.a", 5.0), ("module.classifier", 7.0)]),
                &names(&["module.classifier"]),
            )
            .unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(model.params, set(&[("a", 5.0), ("classifier", 0.0)]));
    }

    #[test]
    fn test_load_into_rejects_shape_mismatch_without_loading() {
        let mut model = FakeModel { params: set(&[("a", 0.0), ("b", 0.0)]) };
        let mut foreign = set(&[("a", 3.0)]);
        foreign.insert("b", ParamTensor::new(vec![2], vec![1.0, 2.0]));

        let err = CheckpointAdapter::new(LoadMode::Partial)
            .load_into(&mut model, foreign, &BTreeSet::new())
            .unwrap_err();
        let adapt = err.downcast_ref::<AdaptError>().unwrap();
        assert!(matches!(adapt, AdaptError::ShapeMismatch { name, .. } if name == "b"));
        assert_eq!(model.params, set(&[("a", 0.0), ("b", 0.0)]));
    }
}
