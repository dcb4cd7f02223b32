// ABOUTME: Builds registry providers from their configuration by provider kind.

use super::providers::{
    Acr, Custom, Ecr, Gcr, Ghcr, GhcrFlavor, Gitea, GiteaFlavor, Gitlab, Hub, Quay,
};
use super::{Registry, RegistryClient, RegistryError};
use std::sync::Arc;

/// Every supported provider kind, in match-priority order.
pub const PROVIDER_KINDS: &[&str] = &[
    "ecr", "gcr", "ghcr", "hub", "quay", "acr", "lscr", "trueforge", "gitlab", "gitea", "forgejo",
    "codeberg", "custom",
];

/// Instantiate the provider `kind` named `name`.
pub fn create_registry(
    kind: &str,
    name: &str,
    config: &serde_yaml::Value,
    client: RegistryClient,
) -> Result<Arc<dyn Registry>, RegistryError> {
    let registry: Arc<dyn Registry> = match kind.to_ascii_lowercase().as_str() {
        "acr" => Arc::new(Acr::new(name, config, client)?),
        "codeberg" => Arc::new(Gitea::new(GiteaFlavor::Codeberg, name, config, client)?),
        "custom" => Arc::new(Custom::new(name, config, client)?),
        "ecr" => Arc::new(Ecr::new(name, config, client)?),
        "forgejo" => Arc::new(Gitea::new(GiteaFlavor::Forgejo, name, config, client)?),
        "gcr" => Arc::new(Gcr::new(name, config, client)?),
        "ghcr" => Arc::new(Ghcr::new(GhcrFlavor::Ghcr, name, config, client)?),
        "gitea" => Arc::new(Gitea::new(GiteaFlavor::Gitea, name, config, client)?),
        "gitlab" => Arc::new(Gitlab::new(name, config, client)?),
        "hub" => Arc::new(Hub::new(name, config, client)?),
        "lscr" => Arc::new(Ghcr::new(GhcrFlavor::Lscr, name, config, client)?),
        "quay" => Arc::new(Quay::new(name, config, client)?),
        "trueforge" => Arc::new(Ghcr::new(GhcrFlavor::Trueforge, name, config, client)?),
        other => return Err(RegistryError::UnknownProvider(other.to_string())),
    };
    Ok(registry)
}

/// Position of `kind` in [`PROVIDER_KINDS`]; unknown kinds sort last.
pub(crate) fn priority(kind: &str) -> usize {
    PROVIDER_KINDS
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(PROVIDER_KINDS.len())
}
