//! Command implementations. Each returns the text to print.

use anyhow::Context as _;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tributary_core::{AuthCatalog, CatalogConfig, DestinationConfig, PluginRegistry};
use tributary_graph::{SyncDagDefinition, validate};

fn catalog_path(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match path {
        Some(p) => Ok(p),
        None => Ok(CatalogConfig::from_env()?.path()),
    }
}

#[tracing::instrument(level = "info")]
pub async fn catalog_validate(path: Option<PathBuf>) -> anyhow::Result<String> {
    let path = catalog_path(path)?;
    let catalog = AuthCatalog::load(&path).await?;
    let mut out = format!("{}: {} integrations\n", path.display(), catalog.len());
    for (short_name, strategy) in catalog.iter() {
        writeln!(out, "  {short_name}: {}", strategy.auth_type().as_str())?;
    }
    Ok(out)
}

#[tracing::instrument(level = "info")]
pub async fn catalog_show(short_name: &str, path: Option<PathBuf>) -> anyhow::Result<String> {
    let catalog = AuthCatalog::load(catalog_path(path)?).await?;
    let strategy = catalog.get(short_name)?;
    Ok(serde_yaml::to_string(strategy)?)
}

#[tracing::instrument(level = "info")]
pub async fn dag_validate(file: &Path) -> anyhow::Result<String> {
    let doc = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("read {}", file.display()))?;
    let definition = SyncDagDefinition::from_yaml_str(&doc)?;
    let dag = validate(&definition)?;

    let mut out = String::new();
    for id in dag.topological_order() {
        if let Some(node) = dag.node(*id) {
            writeln!(out, "{id} {} {}", node.node_type, node.name)?;
        }
    }
    Ok(out)
}

#[tracing::instrument(level = "info")]
pub fn plugins() -> anyhow::Result<String> {
    let mut registry = PluginRegistry::new();
    tributary_integrations::register_builtins(&mut registry, &DestinationConfig::from_env()?)?;
    let mut out = String::new();
    for descriptor in registry.descriptors() {
        writeln!(out, "{descriptor}")?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
integrations:
  local_files:
    auth_type: none
  linear:
    auth_type: api_key
"#;

    const DAG: &str = r#"
id: 00000000-0000-0000-0000-000000000010
sync_id: 00000000-0000-0000-0000-000000000001
name: files
nodes:
  - id: 00000000-0000-0000-0000-0000000000a1
    type: source
    name: Local files
    connection_id: 00000000-0000-0000-0000-0000000000c1
  - id: 00000000-0000-0000-0000-0000000000a2
    type: destination
    name: Vectors
    connection_id: 00000000-0000-0000-0000-0000000000c2
edges:
  - from_node_id: 00000000-0000-0000-0000-0000000000a1
    to_node_id: 00000000-0000-0000-0000-0000000000a2
"#;

    #[tokio::test]
    async fn catalog_commands_read_the_given_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.integrations.yaml");
        std::fs::write(&path, CATALOG).unwrap();

        let out = catalog_validate(Some(path.clone())).await.unwrap();
        assert!(out.contains("2 integrations"));
        assert!(out.contains("linear: api_key"));

        let shown = catalog_show("local_files", Some(path.clone())).await.unwrap();
        assert!(shown.contains("auth_type: none"));
        assert!(catalog_show("slack", Some(path)).await.is_err());
    }

    #[tokio::test]
    async fn bundled_dev_catalog_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../catalogs/dev.integrations.yaml");
        let out = catalog_validate(Some(path)).await.unwrap();
        assert!(out.contains("jira: oauth2_with_refresh_rotating"));
        assert!(out.contains("aws_s3: sigv4"));
    }

    #[tokio::test]
    async fn dag_validate_prints_topological_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dag.yaml");
        std::fs::write(&path, DAG).unwrap();

        let out = dag_validate(&path).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("source Local files"));
        assert!(lines[1].ends_with("destination Vectors"));
    }
}
