// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Secret helpers shared by product reconcilers.
//!
//! Secrets are always written through `data` (base64 bytes) rather than
//! `stringData`, so the observed and desired objects compare equal once written.

use crate::client::{get_typed, ClusterClient};
use crate::crd::{Installation, PullSecretSpec};
use crate::labels::add_owner_annotations;
use crate::reconcilers::resources::{create_or_update_typed, OperationResult};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

/// Generate `len` random bytes, base64 encoded.
#[must_use]
pub fn generate_password(len: usize) -> String {
    let bytes: Vec<u8> = (0..len).map(|_| rand::random::<u8>()).collect();
    BASE64.encode(bytes)
}

/// Read `key` from a secret's data as UTF-8.
///
/// # Errors
///
/// Returns an error if the key is missing or not valid UTF-8.
pub fn secret_value(secret: &Secret, key: &str) -> Result<String> {
    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .ok_or_else(|| anyhow!("secret {} has no key {key}", secret.name_any()))?;
    String::from_utf8(bytes.0.clone())
        .with_context(|| format!("secret {} key {key} is not UTF-8", secret.name_any()))
}

/// Read `key` from a secret's data, treating a missing key as empty.
#[must_use]
pub fn secret_value_or_empty(secret: &Secret, key: &str) -> String {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
        .unwrap_or_default()
}

/// Build secret data from string pairs.
#[must_use]
pub fn string_data<I, K, V>(pairs: I) -> BTreeMap<String, ByteString>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: AsRef<[u8]>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), ByteString(v.as_ref().to_vec())))
        .collect()
}

/// Copy secret `from_ns/from_name` to `to_ns/to_name`, keeping its data and type.
///
/// # Errors
///
/// Returns the client error if the source cannot be read (including not-found)
/// or the destination cannot be written.
pub async fn copy_secret(
    client: &dyn ClusterClient,
    from_ns: &str,
    from_name: &str,
    to_ns: &str,
    to_name: &str,
) -> Result<OperationResult> {
    let source: Secret = get_typed(client, Some(from_ns), from_name)
        .await
        .with_context(|| format!("failed to get secret {from_ns}/{from_name}"))?;

    let (_, result) = create_or_update_typed::<Secret, _>(client, Some(to_ns), to_name, |mut target| {
        target.data = source.data.clone();
        target.type_ = source.type_.clone();
        Ok(target)
    })
    .await?;
    debug!(from = %format!("{from_ns}/{from_name}"), to = %format!("{to_ns}/{to_name}"), result = %result, "Copied secret");
    Ok(result)
}

/// Copy the installation's registry pull secret into `namespace` as `name`.
///
/// Installations without a pull secret have nothing to copy.
///
/// # Errors
///
/// Returns the error of [`copy_secret`].
pub async fn copy_pull_secret(
    client: &dyn ClusterClient,
    installation: &Installation,
    namespace: &str,
    name: &str,
) -> Result<OperationResult> {
    let Some(PullSecretSpec {
        name: source_name,
        namespace: source_ns,
    }) = installation.spec.pull_secret.as_ref()
    else {
        return Ok(OperationResult::Unchanged);
    };
    copy_secret(client, source_ns, source_name, namespace, name).await
}

/// Create or update an owned secret whose data is fully described by `data`.
///
/// # Errors
///
/// Returns the client error of the read or write.
pub async fn reconcile_owned_secret(
    client: &dyn ClusterClient,
    installation: &Installation,
    namespace: &str,
    name: &str,
    data: BTreeMap<String, ByteString>,
) -> Result<OperationResult> {
    let (_, result) = create_or_update_typed::<Secret, _>(client, Some(namespace), name, |mut secret| {
        add_owner_annotations(&mut secret.metadata, installation);
        secret.data = Some(data);
        Ok(secret)
    })
    .await?;
    Ok(result)
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod secrets_tests;
