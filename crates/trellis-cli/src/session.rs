//! Everything a command needs: the loaded project, its siblings, and a
//! resolver wired to the repository named in `[resolution]`.

use std::path::{Path, PathBuf};

use trellis_core::config::GlobalConfig;
use trellis_core::lockfile::Lockfile;
use trellis_core::manifest::Manifest;
use trellis_core::notation::NotationRegistry;
use trellis_core::project::Project;
use trellis_resolver::graph::ResolvedGraph;
use trellis_resolver::{RepositoryFixture, Resolver, ResolverOptions};
use trellis_util::errors::TrellisError;
use trellis_util::fs::{find_manifest, LOCKFILE};

pub struct Session {
    pub root: PathBuf,
    pub project: Project,
    pub resolver: Resolver,
}

impl Session {
    /// Load the project at `manifest_path`, or the nearest `Trellis.toml`
    /// above the current directory. With `use_lockfile`, versions in
    /// `Trellis.lock` are pinned.
    pub fn load(manifest_path: Option<&Path>, use_lockfile: bool) -> miette::Result<Self> {
        let manifest_path = match manifest_path {
            Some(path) => path.to_path_buf(),
            None => find_manifest(&std::env::current_dir().map_err(TrellisError::Io)?)?,
        };
        let root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let manifest = Manifest::from_path(&manifest_path)?;
        let notations = NotationRegistry::default();
        let project = manifest.into_project(&notations)?;
        let projects = manifest.load_projects(&root, &notations)?;

        let repository = match manifest.resolution.repository {
            Some(ref path) => RepositoryFixture::from_path(&root.join(path), &notations)?,
            None => {
                tracing::warn!("No [resolution] repository configured; only project and file dependencies will resolve");
                RepositoryFixture::new()
            }
        };

        let global = GlobalConfig::load()?;
        let mut options = ResolverOptions::from_manifest(&manifest, &global)?;
        let lockfile_path = root.join(LOCKFILE);
        if use_lockfile && lockfile_path.is_file() {
            tracing::debug!("Pinning versions from {}", lockfile_path.display());
            options = options.with_lockfile(Lockfile::from_path(&lockfile_path)?);
        }

        let resolver = Resolver::new(repository)
            .with_projects(projects)
            .with_schema(manifest.schema.clone())
            .with_options(options);

        // Ctrl-C stops resolution before the next dependency is visited, keeping the partial graph.
        let cancellation = resolver.cancellation().clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellation.cancel();
            }
        });

        Ok(Self {
            root,
            project,
            resolver,
        })
    }

    pub async fn resolve(&self, configuration: &str) -> ResolvedGraph {
        self.resolver
            .resolve_configuration(&self.project, configuration)
            .await
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.root.join(LOCKFILE)
    }
}
