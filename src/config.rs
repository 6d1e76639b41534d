//! Route configuration.
//!
//! Stored as a JSON file on disk:
//! ```json
//! {
//!   "timezone": "America/Los_Angeles",
//!   "routes": [
//!     { "id": "home-work", "name": "Home to work", "origin": "...", "destination": "..." }
//!   ]
//! }
//! ```
//! `outbound` trips run origin to destination, `inbound` trips the reverse.

use anyhow::{Context, Result, anyhow, bail};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashSet;

use crate::models::{Direction, Localizer};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteConfig {
    pub id: String,
    pub name: String,
    pub origin: String,
    pub destination: String,
}

impl RouteConfig {
    /// `(from, to)` endpoints for a direction.
    pub fn endpoints(&self, direction: Direction) -> (&str, &str) {
        match direction {
            Direction::Outbound => (&self.origin, &self.destination),
            Direction::Inbound => (&self.destination, &self.origin),
        }
    }
}

#[derive(Deserialize)]
struct RawRoutesConfig {
    timezone: String,
    routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone)]
pub struct RoutesConfig {
    pub timezone: Tz,
    pub routes: Vec<RouteConfig>,
}

impl RoutesConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read routes config '{path}'"))?;
        Self::from_json(&content).with_context(|| format!("invalid routes config '{path}'"))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawRoutesConfig = serde_json::from_str(content)?;
        let timezone: Tz = raw
            .timezone
            .parse()
            .map_err(|e| anyhow!("unknown timezone '{}': {}", raw.timezone, e))?;

        let mut seen = HashSet::new();
        for route in &raw.routes {
            if !seen.insert(route.id.as_str()) {
                bail!("duplicate route id '{}'", route.id);
            }
        }

        Ok(Self {
            timezone,
            routes: raw.routes,
        })
    }

    pub fn localizer(&self) -> Localizer {
        Localizer::new(self.timezone)
    }

    pub fn route(&self, id: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|r| r.id == id)
    }
}
