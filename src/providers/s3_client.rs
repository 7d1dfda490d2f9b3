use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::Client;

use crate::config::S3Settings;

/// Build an S3 client from the run settings.
///
/// Explicit keys win over the SDK default credential chain; a profile name
/// only affects the default chain.
pub async fn create_s3_client(settings: &S3Settings) -> Client {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(settings.region.clone()));

    if let Some(profile) = &settings.profile {
        loader = loader.profile_name(profile);
    }

    if let (Some(access_key_id), Some(secret_access_key)) =
        (&settings.access_key_id, &settings.secret_access_key)
    {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "s3sync",
        );
        loader = loader.credentials_provider(credentials);
    }

    let shared_config = loader.load().await;
    let mut builder = S3ConfigBuilder::from(&shared_config);

    if let Some(endpoint_url) = &settings.endpoint_url {
        builder = builder.endpoint_url(endpoint_url);
    }

    if settings.force_path_style {
        builder = builder.force_path_style(true);
    }

    Client::from_conf(builder.build())
}
