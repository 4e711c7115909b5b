//! Version-selector resolution: from a parsed name spec to a concrete
//! remote read.
//!
//! `name` reads the current version; `name#<sel>` an absolute one; and
//! `name~N` counts back N versions from the current one. Parameters
//! count back on their linear version number; secrets walk their version
//! list ordered newest-first.

use suve_types::spec::{ParamSpec, SecretSpec};

use crate::remote::{ParamOps, Parameter, RemoteError, SecretOps, SecretValue};

/// Fetches the parameter version a spec points at.
pub fn resolve_param(ops: &dyn ParamOps, spec: &ParamSpec) -> Result<Parameter, RemoteError> {
    if let Some(version) = spec.version {
        return ops.get_version(&spec.name, version);
    }
    if spec.shift == 0 {
        return ops.get(&spec.name);
    }

    let current = ops.get(&spec.name)?;
    let shift = i64::try_from(spec.shift)
        .map_err(|_| RemoteError::not_found(&spec.name))?;
    let target = current.version - shift;
    if target < 1 {
        return Err(RemoteError::not_found(&spec.name));
    }
    ops.get_version(&spec.name, target)
}

/// Fetches the secret version a spec points at.
pub fn resolve_secret(ops: &dyn SecretOps, spec: &SecretSpec) -> Result<SecretValue, RemoteError> {
    if let Some(selector) = &spec.selector {
        return ops.get_value(&spec.name, Some(selector));
    }
    if spec.shift == 0 {
        return ops.get_value(&spec.name, None);
    }

    // Walk back through the version list, newest first. The current
    // value anchors position zero.
    let mut versions = ops.list_versions(&spec.name)?;
    versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let current = ops.get_value(&spec.name, None)?;
    let position = versions
        .iter()
        .position(|v| v.id == current.version_id)
        .unwrap_or(0);
    let target = versions
        .get(position + spec.shift as usize)
        .ok_or_else(|| RemoteError::not_found(&spec.name))?;
    ops.get_value(
        &spec.name,
        Some(&suve_types::spec::SecretSelector::Id(target.id.clone())),
    )
}
