// ABOUTME: Builders for container records as a watcher would produce them.

use std::collections::BTreeMap;
use tagwatch::model::{Container, Image, ImageDigest, ImageRegistry, ImageTag};
use tagwatch::types::{ContainerId, ImageId};

/// A container running `registry_url/name:tag` on linux/amd64, claimed by `registry`.
pub fn container(registry: &str, registry_url: &str, name: &str, tag: &str) -> Container {
    Container {
        id: ContainerId::new(format!("id-{}", name.replace('/', "-"))),
        name: name.rsplit('/').next().unwrap_or(name).to_string(),
        display_name: String::new(),
        display_icon: String::new(),
        status: "running".to_string(),
        watcher: "local".to_string(),
        include_tags: None,
        exclude_tags: None,
        transform_tags: None,
        link_template: None,
        trigger_include: None,
        trigger_exclude: None,
        image: Image {
            id: ImageId::new("sha256:0123456789abcdef"),
            registry: ImageRegistry {
                name: registry.to_string(),
                url: registry_url.to_string(),
            },
            name: name.to_string(),
            tag: ImageTag {
                value: tag.to_string(),
                is_semver: tagwatch::tag::parse(tag).is_some(),
            },
            digest: ImageDigest::default(),
            architecture: "amd64".to_string(),
            os: "linux".to_string(),
            variant: None,
            created_at: None,
        },
        result: None,
        error: None,
        labels: BTreeMap::new(),
    }
}
