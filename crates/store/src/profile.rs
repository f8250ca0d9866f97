//! Tenant registry.
//!
//! Persists tenant profiles in `tenants.json` under the state path. A
//! profile is read once at session open and treated as immutable for the
//! session's lifetime; catalog sync and OAuth bootstrap write through the
//! registry between sessions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use vg_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store profile
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-tenant snapshot consumed by the session engine at connect time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreProfile {
    pub tenant_id: String,
    #[serde(default)]
    pub name: String,
    /// Persona prompt fragment ("You are the friendly host of …").
    #[serde(default)]
    pub persona_prompt: String,
    #[serde(default)]
    pub hours_text: String,
    /// Location / parking notes.
    #[serde(default)]
    pub location_text: String,
    #[serde(default)]
    pub custom_knowledge: String,
    /// Menu text written by catalog sync; read by `get_menu` without I/O.
    #[serde(default)]
    pub menu_cache: String,
    /// `None` is treated as active — records created before the flag
    /// existed carry no value.
    #[serde(default)]
    pub active: Option<bool>,
    /// POS merchant id attached by the OAuth bootstrap flow.
    #[serde(default)]
    pub pos_merchant_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl StoreProfile {
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(true)
    }

    /// Compose the system prompt: the non-empty fragments, in order,
    /// separated by blank lines. Falls back to a minimal persona when every
    /// fragment is empty.
    pub fn system_prompt(&self) -> String {
        let fragments = [
            self.persona_prompt.as_str(),
            self.hours_text.as_str(),
            self.location_text.as_str(),
            self.custom_knowledge.as_str(),
            self.menu_cache.as_str(),
        ];
        let composed: Vec<&str> = fragments
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .collect();

        if composed.is_empty() {
            "You are a polite restaurant phone assistant. Keep answers short \
             and spoken-friendly."
                .to_string()
        } else {
            composed.join("\n\n")
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tenant registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// JSON-file-backed tenant registry.
pub struct TenantRegistry {
    tenants_path: PathBuf,
    tenants: RwLock<HashMap<String, StoreProfile>>,
}

impl TenantRegistry {
    /// Load or create the registry at `state_path/tenants.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;

        let tenants_path = state_path.join("tenants.json");
        let tenants: HashMap<String, StoreProfile> = if tenants_path.exists() {
            let raw = std::fs::read_to_string(&tenants_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            tenants = tenants.len(),
            path = %tenants_path.display(),
            "tenant registry loaded"
        );

        Ok(Self {
            tenants_path,
            tenants: RwLock::new(tenants),
        })
    }

    /// Look up a tenant profile by id.
    pub fn resolve(&self, tenant_id: &str) -> Option<StoreProfile> {
        self.tenants.read().get(tenant_id).cloned()
    }

    /// Insert or replace a tenant profile.
    pub fn upsert(&self, profile: StoreProfile) -> Result<()> {
        {
            let mut tenants = self.tenants.write();
            tenants.insert(profile.tenant_id.clone(), profile);
        }
        self.persist()
    }

    /// Replace a tenant's cached menu text (the catalog-sync write path).
    pub fn update_menu_cache(&self, tenant_id: &str, menu_text: &str) -> Result<()> {
        {
            let mut tenants = self.tenants.write();
            let profile = tenants
                .get_mut(tenant_id)
                .ok_or_else(|| Error::Store(format!("unknown tenant: {tenant_id}")))?;
            profile.menu_cache = menu_text.to_string();
            profile.updated_at = Utc::now();
        }
        self.persist()
    }

    /// Attach the POS merchant id produced by the OAuth bootstrap exchange.
    pub fn set_pos_merchant(&self, tenant_id: &str, merchant_id: &str) -> Result<()> {
        {
            let mut tenants = self.tenants.write();
            let profile = tenants
                .get_mut(tenant_id)
                .ok_or_else(|| Error::Store(format!("unknown tenant: {tenant_id}")))?;
            profile.pos_merchant_id = Some(merchant_id.to_string());
            profile.updated_at = Utc::now();
        }
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let snapshot = self.tenants.read().clone();
        let raw = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.tenants_path, raw).map_err(Error::Io)
    }
}
