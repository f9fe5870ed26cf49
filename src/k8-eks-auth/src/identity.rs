use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use aws_sigv4::http_request::sign;
use aws_sigv4::http_request::SignableBody;
use aws_sigv4::http_request::SignableRequest;
use aws_sigv4::http_request::SignatureLocation;
use aws_sigv4::http_request::SigningParams;
use aws_sigv4::http_request::SigningSettings;
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use chrono::DateTime;
use chrono::Utc;
use tracing::trace;
use url::Url;

use crate::cluster::aws_domain;
use crate::AuthError;
use crate::ClusterRef;
use crate::Credentials;
use crate::CredentialsProvider;

/// header binding a presigned identity request to one cluster
pub const CLUSTER_ID_HEADER: &str = "x-k8s-aws-id";

/// validity window of the presigned request
pub const PRESIGN_EXPIRES_SECS: u64 = 60;

const STS_SERVICE: &str = "sts";
const STS_QUERY: &str = "Action=GetCallerIdentity&Version=2011-06-15";

/// regional STS `GetCallerIdentity` url
pub fn sts_url(region: &str) -> Result<Url, AuthError> {
    let raw = format!("https://sts.{}.{}/?{}", region, aws_domain(region), STS_QUERY);
    Url::parse(&raw).map_err(|err| AuthError::InvalidRequest(format!("{raw}: {err}")))
}

/// `GetCallerIdentity` url signed for a cluster, ready to be wrapped into a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedRequest {
    pub url: String,
    pub signed_at: DateTime<Utc>,
    pub expires_in: Duration,
}

fn signing_failed(err: impl ToString) -> AuthError {
    AuthError::InvalidRequest(format!("presign GetCallerIdentity: {}", err.to_string()))
}

/// presign the identity request for `cluster` at a given instant
pub fn presign_identity(
    credentials: &Credentials,
    cluster: &ClusterRef,
    time: DateTime<Utc>,
) -> Result<PresignedRequest, AuthError> {
    let mut url = sts_url(&cluster.region)?;
    let identity: Identity = credentials.clone().into();

    let mut settings = SigningSettings::default();
    settings.signature_location = SignatureLocation::QueryParams;
    settings.expires_in = Some(Duration::from_secs(PRESIGN_EXPIRES_SECS));
    let params: SigningParams = v4::SigningParams::builder()
        .identity(&identity)
        .region(&cluster.region)
        .name(STS_SERVICE)
        .time(SystemTime::from(time))
        .settings(settings)
        .build()
        .map_err(signing_failed)?
        .into();

    let unsigned = url.to_string();
    let headers = [(CLUSTER_ID_HEADER, cluster.name.as_str())];
    let request = SignableRequest::new(
        "GET",
        unsigned.as_str(),
        headers.into_iter(),
        SignableBody::Bytes(&[]),
    )
    .map_err(signing_failed)?;
    let (instructions, _signature) = sign(request, &params).map_err(signing_failed)?.into_parts();

    {
        let mut query = url.query_pairs_mut();
        for (name, value) in instructions.params() {
            query.append_pair(name, value);
        }
    }
    trace!(%cluster, "presigned identity request");
    Ok(PresignedRequest {
        url: url.to_string(),
        signed_at: time,
        expires_in: Duration::from_secs(PRESIGN_EXPIRES_SECS),
    })
}

/// produces presigned identity requests with the ambient credentials
#[derive(Debug, Clone)]
pub struct IdentitySigner {
    credentials: Arc<dyn CredentialsProvider>,
}

impl IdentitySigner {
    pub fn new(credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialsProvider> {
        &self.credentials
    }

    pub async fn sign(&self, cluster: &ClusterRef) -> Result<PresignedRequest, AuthError> {
        let credentials = self.credentials.credentials().await?;
        presign_identity(&credentials, cluster, Utc::now())
    }
}
