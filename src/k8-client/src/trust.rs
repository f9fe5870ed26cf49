//! Trust material for one cluster: CA file, bearer token and an optional
//! kubeconfig, kept in a private scratch directory.
//!
//! Bundles are shared through `Arc`. The scratch directory disappears when
//! the bundle is disposed or when its last holder lets go of it, so a
//! bundle that is replaced in the cache stays intact for callers still
//! using it.

use std::collections::HashMap;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tempfile::TempDir;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use k8_config::Exec;
use k8_config::KubeConfig;
use k8_config::UserDetail;
use k8_eks_auth::AuthError;
use k8_eks_auth::BearerToken;
use k8_eks_auth::ClusterDirectory;
use k8_eks_auth::ClusterEndpoint;
use k8_eks_auth::ClusterRef;
use k8_eks_auth::TokenSource;

use crate::config::KubeconfigMode;
use crate::ClientError;

const CA_FILE: &str = "ca.crt";
const KUBECONFIG_FILE: &str = "kubeconfig.yaml";
const SCRATCH_PREFIX: &str = "eks-gateway-";

pub struct TrustBundle {
    cluster: ClusterRef,
    endpoint: ClusterEndpoint,
    token: BearerToken,
    ca_file: PathBuf,
    kubeconfig: Option<PathBuf>,
    inactive_status: Option<String>,
    created_at: Instant,
    scratch: Mutex<Option<TempDir>>,
}

impl TrustBundle {
    pub fn cluster(&self) -> &ClusterRef {
        &self.cluster
    }

    pub fn endpoint(&self) -> &ClusterEndpoint {
        &self.endpoint
    }

    pub fn token(&self) -> &BearerToken {
        &self.token
    }

    pub fn ca_file(&self) -> &Path {
        &self.ca_file
    }

    pub fn kubeconfig(&self) -> Option<&Path> {
        self.kubeconfig.as_deref()
    }

    /// status of a cluster that was not ACTIVE when the bundle was made
    pub fn inactive_status(&self) -> Option<&str> {
        self.inactive_status.as_deref()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// fresh while strictly younger than `ttl`
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }

    /// remove the scratch directory; later calls do nothing
    pub fn dispose(&self) -> Result<(), ClientError> {
        let scratch = match self.scratch.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(dir) = scratch {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!(cluster = %self.cluster, path = %path.display(), "disposed trust bundle"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    trace!(path = %path.display(), "scratch already gone")
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        match self.scratch.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl std::fmt::Debug for TrustBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("TrustBundle")
            .field("cluster", &self.cluster)
            .field("endpoint", &self.endpoint.api_server_url)
            .field("ca_file", &self.ca_file)
            .field("kubeconfig", &self.kubeconfig)
            .field("inactive_status", &self.inactive_status)
            .field("age", &self.age())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MaterializeOptions {
    pub ttl: Duration,
    pub kubeconfig: KubeconfigMode,
    pub exec_command: PathBuf,
    pub scratch_dir: Option<PathBuf>,
    pub allow_inactive: bool,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            kubeconfig: KubeconfigMode::None,
            exec_command: PathBuf::from("eks-gateway"),
            scratch_dir: None,
            allow_inactive: false,
        }
    }
}

type Slot = Arc<tokio::sync::Mutex<Option<Arc<TrustBundle>>>>;

/// produces trust bundles and caches one per cluster for the freshness window
pub struct TrustMaterializer {
    directory: Arc<dyn ClusterDirectory>,
    tokens: Arc<dyn TokenSource>,
    options: MaterializeOptions,
    cache: Mutex<HashMap<ClusterRef, Slot>>,
    inactive: Mutex<HashMap<ClusterRef, String>>,
}

impl TrustMaterializer {
    pub fn new(
        directory: Arc<dyn ClusterDirectory>,
        tokens: Arc<dyn TokenSource>,
        options: MaterializeOptions,
    ) -> Self {
        Self {
            directory,
            tokens,
            options,
            cache: Mutex::new(HashMap::new()),
            inactive: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &MaterializeOptions {
        &self.options
    }

    pub fn directory(&self) -> &Arc<dyn ClusterDirectory> {
        &self.directory
    }

    /// cached bundle when younger than the ttl, otherwise a new one
    ///
    /// Concurrent callers for the same cluster wait for the one
    /// materialization in flight.
    pub async fn get_or_create(&self, cluster: &ClusterRef) -> Result<Arc<TrustBundle>, ClientError> {
        let slot = self.slot(cluster);
        let mut current = slot.lock().await;

        if let Some(bundle) = current.as_ref() {
            if bundle.is_fresh(self.options.ttl) {
                trace!(%cluster, age = ?bundle.age(), "trust bundle cache hit");
                return Ok(bundle.clone());
            }
        }

        if let Some(stale) = current.take() {
            debug!(%cluster, age = ?stale.age(), "replacing stale trust bundle");
            release(stale);
        }

        let bundle = Arc::new(self.create(cluster).await?);
        if !self.options.ttl.is_zero() {
            *current = Some(bundle.clone());
        }
        Ok(bundle)
    }

    /// resolve, mint and materialize without touching the cache
    pub async fn create(&self, cluster: &ClusterRef) -> Result<TrustBundle, ClientError> {
        let (endpoint, inactive_status) = match self.directory.resolve(cluster).await {
            Ok(endpoint) => (endpoint, None),
            Err(AuthError::ClusterNotActive {
                cluster: inactive,
                status,
                endpoint,
            }) if self.options.allow_inactive && !endpoint.api_server_url.is_empty() => {
                warn!(cluster = %inactive, %status, "cluster is not ACTIVE, proceeding anyway");
                (*endpoint, Some(status))
            }
            Err(err) => return Err(err.into()),
        };
        self.record_status(cluster, inactive_status.clone());
        let token = self.tokens.token(cluster).await?;
        let mut bundle = self.materialize(cluster, endpoint, token)?;
        bundle.inactive_status = inactive_status;
        Ok(bundle)
    }

    /// non-ACTIVE status seen by the last resolve of `cluster`
    pub fn inactive_status(&self, cluster: &ClusterRef) -> Option<String> {
        let inactive = match self.inactive.lock() {
            Ok(inactive) => inactive,
            Err(poisoned) => poisoned.into_inner(),
        };
        inactive.get(cluster).cloned()
    }

    fn record_status(&self, cluster: &ClusterRef, status: Option<String>) {
        let mut inactive = match self.inactive.lock() {
            Ok(inactive) => inactive,
            Err(poisoned) => poisoned.into_inner(),
        };
        match status {
            Some(status) => inactive.insert(cluster.clone(), status),
            None => inactive.remove(cluster),
        };
    }

    /// write CA and optional kubeconfig into a fresh scratch directory
    pub fn materialize(
        &self,
        cluster: &ClusterRef,
        endpoint: ClusterEndpoint,
        token: BearerToken,
    ) -> Result<TrustBundle, ClientError> {
        let ca = STANDARD
            .decode(endpoint.ca_certificate_b64.trim())
            .map_err(|err| ClientError::decode("cluster certificate authority", err))?;

        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let scratch = match &self.options.scratch_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };

        let ca_file = scratch.path().join(CA_FILE);
        write_private(&ca_file)?.write_all(&ca)?;

        let kubeconfig = match self.options.kubeconfig {
            KubeconfigMode::None => None,
            mode => {
                let user = if mode == KubeconfigMode::ExecPlugin {
                    UserDetail::with_exec(Exec::new(
                        self.options.exec_command.display().to_string(),
                        vec![
                            "mint-token",
                            "--cluster-name",
                            cluster.name.as_str(),
                            "--region",
                            cluster.region.as_str(),
                        ],
                    ))
                } else {
                    UserDetail::with_token(token.value())
                };
                let document = KubeConfig::single_cluster(
                    &cluster.name,
                    endpoint.host(),
                    &endpoint.ca_certificate_b64,
                    user,
                );
                let path = scratch.path().join(KUBECONFIG_FILE);
                document.to_yaml_writer(write_private(&path)?)?;
                Some(path)
            }
        };

        debug!(%cluster, scratch = %scratch.path().display(), kubeconfig = kubeconfig.is_some(), "materialized trust bundle");
        Ok(TrustBundle {
            cluster: cluster.clone(),
            endpoint,
            token,
            ca_file,
            kubeconfig,
            inactive_status: None,
            created_at: Instant::now(),
            scratch: Mutex::new(Some(scratch)),
        })
    }

    /// drop every cached bundle, removing files nobody else holds
    ///
    /// A bundle still held by a caller keeps its files until that caller
    /// drops it.
    pub fn purge(&self) {
        let slots: Vec<Slot> = match self.cache.lock() {
            Ok(mut cache) => cache.drain().map(|(_, slot)| slot).collect(),
            Err(poisoned) => poisoned.into_inner().drain().map(|(_, slot)| slot).collect(),
        };
        for slot in slots {
            // a slot locked by an in-flight call is released by that call
            if let Ok(mut current) = slot.try_lock() {
                if let Some(bundle) = current.take() {
                    release(bundle);
                }
            }
        }
    }

    pub fn cached_clusters(&self) -> usize {
        match self.cache.lock() {
            Ok(cache) => cache.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn slot(&self, cluster: &ClusterRef) -> Slot {
        let mut cache = match self.cache.lock() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.entry(cluster.clone()).or_default().clone()
    }
}

impl Drop for TrustMaterializer {
    fn drop(&mut self) {
        self.purge();
    }
}

/// dispose a bundle the cache no longer references, unless a caller still holds it
fn release(bundle: Arc<TrustBundle>) {
    match Arc::try_unwrap(bundle) {
        Ok(bundle) => {
            if let Err(err) = bundle.dispose() {
                warn!(cluster = %bundle.cluster(), %err, "unable to remove trust bundle");
            }
        }
        Err(held) => trace!(cluster = %held.cluster(), "bundle still in use, its last holder removes it"),
    }
}

/// create a file only the current user can read
fn write_private(path: &Path) -> Result<File, ClientError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    Ok(options.open(path)?)
}

#[cfg(test)]
mod test {

    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;
    use chrono::Utc;

    use k8_eks_auth::eks::{CertificateAuthority, EksCluster, EksNodegroup};
    use k8_eks_auth::token::TOKEN_TTL;

    use super::*;

    const CA_B64: &str = "LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0t";

    struct FakeDirectory {
        status: &'static str,
        describes: AtomicUsize,
    }

    #[async_trait]
    impl ClusterDirectory for FakeDirectory {
        async fn list_clusters(&self, _region: &str) -> Result<Vec<String>, AuthError> {
            Ok(vec![])
        }

        async fn describe_cluster(&self, cluster: &ClusterRef) -> Result<EksCluster, AuthError> {
            self.describes.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(EksCluster {
                name: cluster.name.clone(),
                status: self.status.to_owned(),
                endpoint: "https://api.example".to_owned(),
                certificate_authority: CertificateAuthority {
                    data: CA_B64.to_owned(),
                },
                ..Default::default()
            })
        }

        async fn list_nodegroups(&self, _cluster: &ClusterRef) -> Result<Vec<String>, AuthError> {
            Ok(vec![])
        }

        async fn describe_nodegroup(
            &self,
            cluster: &ClusterRef,
            nodegroup: &str,
        ) -> Result<EksNodegroup, AuthError> {
            Err(AuthError::NodegroupNotFound {
                cluster: cluster.clone(),
                nodegroup: nodegroup.to_owned(),
            })
        }
    }

    struct FakeTokens(AtomicUsize);

    #[async_trait]
    impl TokenSource for FakeTokens {
        async fn token(&self, _cluster: &ClusterRef) -> Result<BearerToken, AuthError> {
            let count = self.0.fetch_add(1, Ordering::SeqCst);
            BearerToken::from_value(format!("k8s-aws-v1.dG9rZW4{count}"), Utc::now(), TOKEN_TTL)
        }
    }

    fn materializer(status: &'static str, options: MaterializeOptions) -> TrustMaterializer {
        TrustMaterializer::new(
            Arc::new(FakeDirectory {
                status,
                describes: AtomicUsize::new(0),
            }),
            Arc::new(FakeTokens(AtomicUsize::new(0))),
            options,
        )
    }

    #[tokio::test]
    async fn test_materialize_writes_private_ca() {
        let materializer = materializer("ACTIVE", MaterializeOptions::default());
        let bundle = materializer
            .create(&ClusterRef::new("prod", "us-east-1"))
            .await
            .expect("bundle");

        let ca = std::fs::read(bundle.ca_file()).expect("ca");
        assert_eq!(ca, b"-----BEGIN CERTIFICATE-----");
        assert!(bundle.kubeconfig().is_none());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(bundle.ca_file()).expect("meta").permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let ca_file = bundle.ca_file().to_path_buf();
        bundle.dispose().expect("dispose");
        bundle.dispose().expect("second dispose");
        assert!(bundle.is_disposed());
        assert!(!ca_file.exists());
    }

    #[tokio::test]
    async fn test_static_token_kubeconfig() {
        let materializer = materializer(
            "ACTIVE",
            MaterializeOptions {
                kubeconfig: KubeconfigMode::StaticToken,
                ..Default::default()
            },
        );
        let bundle = materializer
            .create(&ClusterRef::new("prod", "us-east-1"))
            .await
            .expect("bundle");
        let config = KubeConfig::from_file(bundle.kubeconfig().expect("kubeconfig")).expect("read");

        assert_eq!(config.current_context, "eks-prod");
        assert_eq!(config.clusters[0].cluster.server, "https://api.example");
        assert_eq!(
            config.clusters[0].cluster.certificate_authority_data.as_deref(),
            Some(CA_B64)
        );
        assert_eq!(config.users[0].user.token.as_deref(), Some("k8s-aws-v1.dG9rZW40"));
    }

    #[tokio::test]
    async fn test_exec_plugin_kubeconfig() {
        let materializer = materializer(
            "ACTIVE",
            MaterializeOptions {
                kubeconfig: KubeconfigMode::ExecPlugin,
                exec_command: PathBuf::from("/usr/local/bin/eks-gateway"),
                ..Default::default()
            },
        );
        let bundle = materializer
            .create(&ClusterRef::new("prod", "eu-west-1"))
            .await
            .expect("bundle");
        let config = KubeConfig::from_file(bundle.kubeconfig().expect("kubeconfig")).expect("read");
        let exec = config.users[0].user.exec.as_ref().expect("exec");

        assert_eq!(exec.command, "/usr/local/bin/eks-gateway");
        assert_eq!(
            exec.args,
            vec!["mint-token", "--cluster-name", "prod", "--region", "eu-west-1"]
        );
        assert_eq!(exec.api_version, "client.authentication.k8s.io/v1beta1");
        assert!(config.users[0].user.token.is_none());
    }

    #[tokio::test]
    async fn test_inactive_cluster() {
        let cluster = ClusterRef::new("prod", "us-east-1");

        let strict = materializer("CREATING", MaterializeOptions::default());
        let err = strict.create(&cluster).await.expect_err("inactive");
        assert_eq!(err.code(), crate::ErrorCode::ClusterNotActive);

        let lenient = materializer(
            "UPDATING",
            MaterializeOptions {
                allow_inactive: true,
                ..Default::default()
            },
        );
        let bundle = lenient.create(&cluster).await.expect("lenient");
        assert_eq!(bundle.inactive_status(), Some("UPDATING"));
        assert_eq!(lenient.inactive_status(&cluster).as_deref(), Some("UPDATING"));

        let active = materializer("ACTIVE", MaterializeOptions::default());
        let bundle = active.create(&cluster).await.expect("active");
        assert_eq!(bundle.inactive_status(), None);
        assert_eq!(active.inactive_status(&cluster), None);
    }

    #[tokio::test]
    async fn test_invalid_ca_leaves_nothing_behind() {
        let scratch = tempfile::tempdir().expect("dir");
        let materializer = materializer(
            "ACTIVE",
            MaterializeOptions {
                scratch_dir: Some(scratch.path().to_path_buf()),
                ..Default::default()
            },
        );
        let token = BearerToken::from_value("k8s-aws-v1.eA", Utc::now(), TOKEN_TTL).expect("token");
        let err = materializer
            .materialize(
                &ClusterRef::new("prod", "us-east-1"),
                ClusterEndpoint::new("https://api.example", "%%% not base64"),
                token,
            )
            .expect_err("bad ca");
        assert_eq!(err.code(), crate::ErrorCode::DecodeError);
        assert_eq!(std::fs::read_dir(scratch.path()).expect("list").count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_window() {
        let materializer = materializer("ACTIVE", MaterializeOptions::default());
        let cluster = ClusterRef::new("prod", "us-east-1");

        let first = materializer.get_or_create(&cluster).await.expect("first");
        tokio::time::advance(Duration::from_secs(599)).await;
        let second = materializer.get_or_create(&cluster).await.expect("second");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.token().value(), "k8s-aws-v1.dG9rZW40");

        let old_ca = first.ca_file().to_path_buf();
        drop(first);
        drop(second);
        tokio::time::advance(Duration::from_secs(1)).await;

        let third = materializer.get_or_create(&cluster).await.expect("third");
        assert_ne!(third.ca_file(), old_ca.as_path());
        assert!(!old_ca.exists());
        assert!(third.ca_file().exists());
        assert_eq!(third.token().value(), "k8s-aws-v1.dG9rZW41");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_bundle_in_use_survives_replacement() {
        let materializer = materializer("ACTIVE", MaterializeOptions::default());
        let cluster = ClusterRef::new("prod", "us-east-1");

        let held = materializer.get_or_create(&cluster).await.expect("first");
        tokio::time::advance(Duration::from_secs(600)).await;
        let fresh = materializer.get_or_create(&cluster).await.expect("second");

        assert!(!Arc::ptr_eq(&held, &fresh));
        assert!(held.ca_file().exists());
        let old_ca = held.ca_file().to_path_buf();
        drop(held);
        assert!(!old_ca.exists());
    }

    #[tokio::test]
    async fn test_zero_ttl_never_caches() {
        let materializer = materializer(
            "ACTIVE",
            MaterializeOptions {
                ttl: Duration::ZERO,
                ..Default::default()
            },
        );
        let cluster = ClusterRef::new("prod", "us-east-1");
        let first = materializer.get_or_create(&cluster).await.expect("first");
        let second = materializer.get_or_create(&cluster).await.expect("second");
        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(first.token().value(), second.token().value());
    }

    #[tokio::test]
    async fn test_purge_keeps_held_bundle() {
        let materializer = materializer("ACTIVE", MaterializeOptions::default());
        let held = materializer
            .get_or_create(&ClusterRef::new("prod", "us-east-1"))
            .await
            .expect("bundle");

        materializer.purge();
        assert_eq!(materializer.cached_clusters(), 0);
        assert!(held.ca_file().exists());
        assert!(!held.is_disposed());

        let ca_file = held.ca_file().to_path_buf();
        drop(materializer);
        assert!(held.ca_file().exists());
        drop(held);
        assert!(!ca_file.exists());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_bundle() {
        let directory = Arc::new(FakeDirectory {
            status: "ACTIVE",
            describes: AtomicUsize::new(0),
        });
        let tokens = Arc::new(FakeTokens(AtomicUsize::new(0)));
        let materializer =
            TrustMaterializer::new(directory.clone(), tokens.clone(), MaterializeOptions::default());
        let cluster = ClusterRef::new("prod", "us-east-1");

        let (a, b, c, d, e) = tokio::join!(
            materializer.get_or_create(&cluster),
            materializer.get_or_create(&cluster),
            materializer.get_or_create(&cluster),
            materializer.get_or_create(&cluster),
            materializer.get_or_create(&cluster),
        );
        let first = a.expect("a");
        for other in [b, c, d, e] {
            assert!(Arc::ptr_eq(&first, &other.expect("bundle")));
        }
        assert_eq!(directory.describes.load(Ordering::SeqCst), 1);
        assert_eq!(tokens.0.load(Ordering::SeqCst), 1);
        assert_eq!(materializer.cached_clusters(), 1);
    }

    #[tokio::test]
    async fn test_purge_removes_cached_files() {
        let materializer = materializer("ACTIVE", MaterializeOptions::default());
        let bundle = materializer
            .get_or_create(&ClusterRef::new("prod", "us-east-1"))
            .await
            .expect("bundle");
        let ca_file = bundle.ca_file().to_path_buf();
        drop(bundle);

        materializer.purge();
        assert_eq!(materializer.cached_clusters(), 0);
        assert!(!ca_file.exists());
    }
}
