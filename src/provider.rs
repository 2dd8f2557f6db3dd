//! Resolves lookups against Route 53 and records them in the lookup context.

use aws_sdk_route53::error::DisplayErrorContext;
use aws_sdk_route53::Client;
use tracing::{debug, info};

use crate::config::Environment;
use crate::error::{Error, Result};
use crate::lookup::{strip_zone_prefix, validate_query, ContextCache, HostedZone, HostedZoneQuery};

/// One zone returned by `ListHostedZonesByName`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneCandidate {
    pub id: String,
    pub name: String,
    pub private_zone: bool,
}

/// Picks the single zone named exactly like the query. Route 53 lists zones
/// starting at the queried name, so later entries are usually unrelated.
pub fn select_zone(query: &HostedZoneQuery, candidates: &[ZoneCandidate]) -> Result<HostedZone> {
    let domain = query.domain_name.trim_end_matches('.');
    let matching: Vec<&ZoneCandidate> = candidates
        .iter()
        .filter(|z| z.name.trim_end_matches('.').eq_ignore_ascii_case(domain))
        .filter(|z| z.private_zone == query.private_zone)
        .collect();
    match matching[..] {
        [zone] => Ok(HostedZone {
            id: strip_zone_prefix(&zone.id).to_string(),
            name: zone.name.clone(),
        }),
        [] => Err(Error::HostedZoneLookup {
            domain: query.domain_name.clone(),
            reason: "no matching hosted zone".to_string(),
        }),
        _ => Err(Error::HostedZoneLookup {
            domain: query.domain_name.clone(),
            reason: format!("found {} matching hosted zones, expected exactly one", matching.len()),
        }),
    }
}

pub async fn resolve_hosted_zone(client: &Client, query: &HostedZoneQuery) -> Result<HostedZone> {
    validate_query(query)?;
    let resp = client
        .list_hosted_zones_by_name()
        .dns_name(query.domain_name.trim_end_matches('.'))
        .send()
        .await
        .map_err(|e| Error::Aws(DisplayErrorContext(&e).to_string()))?;
    let candidates: Vec<ZoneCandidate> = resp
        .hosted_zones()
        .iter()
        .map(|z| ZoneCandidate {
            id: z.id().to_string(),
            name: z.name().to_string(),
            private_zone: z.config().map(|c| c.private_zone()).unwrap_or(false),
        })
        .collect();
    debug!(domain = %query.domain_name, candidates = candidates.len(), "listed hosted zones");
    select_zone(query, &candidates)
}

/// Resolves every query that has no cached answer yet. Returns how many
/// entries were added.
pub async fn fill_context(
    client: &Client,
    cache: &mut ContextCache,
    env: &Environment,
    queries: &[HostedZoneQuery],
) -> Result<usize> {
    let mut added = 0;
    for query in queries {
        if cache.hosted_zone(env, query).is_some() {
            continue;
        }
        let zone = resolve_hosted_zone(client, query).await?;
        info!(domain = %query.domain_name, zone_id = %zone.id, "resolved hosted zone");
        cache.set_hosted_zone(env, query, &zone)?;
        added += 1;
    }
    Ok(added)
}
