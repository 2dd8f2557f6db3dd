//! Read-only lookups of resources that live outside the stack.
//!
//! Synthesis never calls AWS. Lookups are answered from a [`ContextCache`]
//! that the CLI fills beforehand (see [`crate::provider`]), so the same
//! context always produces the same template.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Environment;
use crate::error::{Error, Result};

pub const DEFAULT_CONTEXT_FILE: &str = "static_basic.context.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZoneQuery {
    pub domain_name: String,
    pub private_zone: bool,
}

impl HostedZoneQuery {
    pub fn new(domain_name: &str) -> Self {
        Self {
            domain_name: domain_name.to_string(),
            private_zone: false,
        }
    }

    pub fn context_key(&self, env: &Environment) -> String {
        let mut key = format!(
            "hosted-zone:account={}:domainName={}:region={}",
            env.account, self.domain_name, env.region
        );
        if self.private_zone {
            key.push_str(":privateZone=true");
        }
        key
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    /// zone id without the `/hostedzone/` prefix
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
}

pub trait HostedZoneLookup {
    fn lookup_hosted_zone(&self, env: &Environment, query: &HostedZoneQuery) -> Result<HostedZone>;
}

/// Cached lookup results, persisted as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextCache {
    entries: BTreeMap<String, Value>,
}

impl ContextCache {
    /// A missing file is an empty context.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::io(path, e)),
        };
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cache: Self = serde_json::from_str(&data)?;
        debug!(?path, entries = cache.entries.len(), "loaded lookup context");
        Ok(cache)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body).map_err(|e| Error::io(path, e))
    }

    pub fn hosted_zone(&self, env: &Environment, query: &HostedZoneQuery) -> Option<HostedZone> {
        let value = self.entries.get(&query.context_key(env))?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn set_hosted_zone(&mut self, env: &Environment, query: &HostedZoneQuery, zone: &HostedZone) -> Result<()> {
        let value = serde_json::to_value(zone)?;
        self.entries.insert(query.context_key(env), value);
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl HostedZoneLookup for ContextCache {
    fn lookup_hosted_zone(&self, env: &Environment, query: &HostedZoneQuery) -> Result<HostedZone> {
        validate_query(query)?;
        let zone = self
            .hosted_zone(env, query)
            .ok_or_else(|| Error::MissingContext(query.context_key(env)))?;
        debug!(domain = %query.domain_name, zone_id = %zone.id, "hosted zone from context");
        Ok(zone)
    }
}

pub(crate) fn validate_query(query: &HostedZoneQuery) -> Result<()> {
    if query.domain_name.trim().is_empty() {
        return Err(Error::HostedZoneLookup {
            domain: query.domain_name.clone(),
            reason: "domain name is empty".to_string(),
        });
    }
    Ok(())
}

/// Zone ids come back from Route 53 as `/hostedzone/<id>`.
pub fn strip_zone_prefix(id: &str) -> &str {
    id.strip_prefix("/hostedzone/").unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        Environment {
            account: "123456789012".into(),
            region: "us-east-1".into(),
        }
    }

    fn zone() -> HostedZone {
        HostedZone {
            id: "Z0123456789".into(),
            name: "example.com.".into(),
        }
    }

    #[test]
    fn context_keys() {
        let mut query = HostedZoneQuery::new("example.com");
        assert_eq!(
            query.context_key(&env()),
            "hosted-zone:account=123456789012:domainName=example.com:region=us-east-1"
        );
        query.private_zone = true;
        assert!(query.context_key(&env()).ends_with(":privateZone=true"));
    }

    #[test]
    fn cache_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctx.json");
        let query = HostedZoneQuery::new("example.com");

        let mut cache = ContextCache::load(&path).unwrap();
        assert!(cache.is_empty());
        cache.set_hosted_zone(&env(), &query, &zone()).unwrap();
        cache.save(&path).unwrap();

        let loaded = ContextCache::load(&path).unwrap();
        assert_eq!(loaded.lookup_hosted_zone(&env(), &query).unwrap(), zone());
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[query.context_key(&env())]["Id"], "Z0123456789");
    }

    #[test]
    fn missing_entries_and_empty_domains_fail() {
        let cache = ContextCache::default();
        let err = cache.lookup_hosted_zone(&env(), &HostedZoneQuery::new("example.com")).unwrap_err();
        assert!(matches!(err, Error::MissingContext(_)));
        let err = cache.lookup_hosted_zone(&env(), &HostedZoneQuery::new("")).unwrap_err();
        assert!(matches!(err, Error::HostedZoneLookup { .. }));
    }

    #[test]
    fn strips_zone_prefix() {
        assert_eq!(strip_zone_prefix("/hostedzone/Z123"), "Z123");
        assert_eq!(strip_zone_prefix("Z123"), "Z123");
    }
}
