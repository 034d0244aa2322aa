//! Configuration for Firmament
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

use crate::access::PolicyTable;
use crate::blob::S3Config;

/// Firmament - backend for the digital star memorial platform
#[derive(Parser, Debug, Clone)]
#[command(name = "firmament")]
#[command(about = "REST backend for stars, shared media and access control")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5001")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory fallbacks, insecure JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "firmament")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds (7 days)
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "604800")]
    pub jwt_expiry_seconds: u64,

    /// Object store configuration
    #[command(flatten)]
    pub s3: S3Args,

    /// Lifetime of signed URLs returned in listings
    #[arg(long, env = "SIGN_TTL_LIST_SECONDS", default_value = "3600")]
    pub sign_ttl_list_seconds: u64,

    /// Lifetime of signed URLs returned by detail views
    #[arg(long, env = "SIGN_TTL_DETAIL_SECONDS", default_value = "36000")]
    pub sign_ttl_detail_seconds: u64,

    /// Maximum accepted request body size for uploads
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "209715200")]
    pub max_upload_bytes: usize,

    /// Resources whose listings only return items the caller can see
    /// (comma-separated slugs, e.g. "photo-albums,video-albums")
    #[arg(long, env = "FILTERED_LISTING")]
    pub filtered_listing: Option<String>,

    /// Resources that only the star owner may list
    #[arg(long, env = "OWNER_ONLY_LIST")]
    pub owner_only_list: Option<String>,

    /// Resources that only the star owner may delete
    #[arg(long, env = "OWNER_ONLY_DELETE")]
    pub owner_only_delete: Option<String>,

    /// Resources listed without authentication when the star is not private
    #[arg(long, env = "PUBLIC_LISTING")]
    pub public_listing: Option<String>,
}

/// S3-compatible object store connection
#[derive(Parser, Debug, Clone)]
pub struct S3Args {
    /// Object store endpoint (virtual-hosted style)
    #[arg(long, env = "S3_ENDPOINT", default_value = "https://s3.eu-central-1.wasabisys.com")]
    pub s3_endpoint: String,

    /// Object store region
    #[arg(long, env = "S3_REGION", default_value = "eu-central-1")]
    pub s3_region: String,

    /// Bucket holding all media
    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Access key id
    #[arg(long, env = "S3_ACCESS_KEY")]
    pub s3_access_key: Option<String>,

    /// Secret access key
    #[arg(long, env = "S3_SECRET_KEY")]
    pub s3_secret_key: Option<String>,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> Option<String> {
        match &self.jwt_secret {
            Some(secret) => Some(secret.clone()),
            None if self.dev_mode => Some("dev-only-insecure-secret-not-for-production".to_string()),
            None => None,
        }
    }

    /// Object store settings, if fully configured
    pub fn s3_config(&self) -> Option<S3Config> {
        let s3 = &self.s3;
        match (&s3.s3_bucket, &s3.s3_access_key, &s3.s3_secret_key) {
            (Some(bucket), Some(access_key), Some(secret_key)) => Some(S3Config {
                endpoint: s3.s3_endpoint.clone(),
                region: s3.s3_region.clone(),
                bucket: bucket.clone(),
                access_key_id: access_key.clone(),
                secret_access_key: secret_key.clone(),
            }),
            _ => None,
        }
    }

    /// Build the per-resource access policy table from defaults and overrides
    pub fn policy_table(&self) -> Result<PolicyTable, String> {
        let mut table = PolicyTable::default();
        table.apply_overrides(
            self.filtered_listing.as_deref().map(split_list),
            self.owner_only_list.as_deref().map(split_list),
            self.owner_only_delete.as_deref().map(split_list),
            self.public_listing.as_deref().map(split_list),
        )?;
        Ok(table)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.jwt_secret.is_none() {
                return Err("JWT_SECRET is required in production mode".to_string());
            }
            if self.s3_config().is_none() {
                return Err(
                    "S3_BUCKET, S3_ACCESS_KEY and S3_SECRET_KEY are required in production mode"
                        .to_string(),
                );
            }
        }

        if self.sign_ttl_list_seconds == 0 || self.sign_ttl_detail_seconds == 0 {
            return Err("Signed URL lifetimes must be greater than zero".to_string());
        }

        self.policy_table()?;

        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["firmament"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_production_requires_secrets() {
        let args = parse(&[]);
        assert!(args.validate().is_err());

        let args = parse(&[
            "--jwt-secret",
            "a-secret-that-is-at-least-32-characters",
            "--s3-bucket",
            "stars",
            "--s3-access-key",
            "AK",
            "--s3-secret-key",
            "SK",
        ]);
        assert!(args.validate().is_ok());
        assert!(args.s3_config().is_some());
    }

    #[test]
    fn test_dev_mode_defaults() {
        let args = parse(&["--dev-mode"]);
        assert!(args.validate().is_ok());
        assert!(args.jwt_secret().is_some());
        assert!(args.s3_config().is_none());
        assert_eq!(args.sign_ttl_list_seconds, 3600);
        assert_eq!(args.sign_ttl_detail_seconds, 36000);
    }

    #[test]
    fn test_unknown_policy_slug_rejected() {
        let args = parse(&["--dev-mode", "--owner-only-delete", "documents,starships"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, ,b "), vec!["a", "b"]);
        assert!(split_list("").is_empty());
    }
}
