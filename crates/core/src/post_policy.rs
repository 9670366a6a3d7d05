//! Pre-signed POST policies for browser-form uploads
//!
//! The SDK has no POST policy surface, so the policy document is built and
//! signed here: conditions are serialized to JSON, base64-encoded, and the
//! encoded policy is signed with the standard SigV4 signing key
//! (service `s3`). The result is a target URL plus the form fields a client
//! submits alongside the file payload.

use crate::config::{StorageConfig, MAX_EXPIRATION_SECS};
use crate::error::{Error, Result};
use aws_sigv4::sign::v4::{calculate_signature, generate_signing_key};
use aws_smithy_types::base64;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::time::{Duration, SystemTime};

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// A policy condition restricting what the form may submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostCondition {
    /// Field must equal this value exactly
    Eq(String, String),
    /// Field must start with this prefix
    StartsWith(String, String),
    /// Payload size must fall within [min, max] bytes
    ContentLengthRange(u64, u64),
}

/// How the object key is constrained
#[derive(Debug, Clone)]
enum KeyMatch {
    Exact(String),
    Prefix(String),
}

/// Signing inputs for a POST policy
#[derive(Debug, Clone)]
pub struct PostSigningParams {
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub now: DateTime<Utc>,
}

impl PostSigningParams {
    /// Build signing params from storage config; POST policies need the raw
    /// secret key, so the environment credential chain cannot be used here
    pub fn from_storage_config(config: &StorageConfig) -> Result<Self> {
        let access_key_id = config.access_key_id.clone().ok_or_else(|| {
            Error::InvalidInput(
                "POST policies require access_key_id/secret_access_key in the configuration"
                    .to_string(),
            )
        })?;
        let secret_access_key = config.secret_access_key.clone().ok_or_else(|| {
            Error::InvalidInput(
                "POST policies require access_key_id/secret_access_key in the configuration"
                    .to_string(),
            )
        })?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            region: config.region.clone(),
            access_key_id,
            secret_access_key,
            now: Utc::now(),
        })
    }
}

/// A signed POST policy: the target URL plus the form fields to submit
/// (in order, before the file part)
#[derive(Debug, Clone)]
pub struct PresignedPost {
    pub url: String,
    pub fields: Vec<(String, String)>,
}

impl PresignedPost {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Builder for a POST policy
///
/// Every form field added here is also emitted as a policy condition, so a
/// policy built through this type never rejects its own form.
#[derive(Debug, Clone)]
pub struct PostPolicyBuilder {
    bucket: String,
    key: KeyMatch,
    expires_in: Duration,
    fields: Vec<(String, String)>,
    conditions: Vec<PostCondition>,
}

impl PostPolicyBuilder {
    /// Policy for an exact object key
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: KeyMatch::Exact(key.into()),
            expires_in: Duration::from_secs(3600),
            fields: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Allow any key under the given prefix instead of an exact key
    pub fn key_starts_with(mut self, prefix: impl Into<String>) -> Self {
        self.key = KeyMatch::Prefix(prefix.into());
        self
    }

    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = expires_in;
        self
    }

    /// Add an exact-match form field (e.g. `Content-Type`, `acl`,
    /// `success_action_redirect`)
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Add a bare condition (no pre-filled form field)
    pub fn condition(mut self, condition: PostCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Restrict the payload size to [min, max] bytes
    pub fn content_length_range(self, min: u64, max: u64) -> Self {
        self.condition(PostCondition::ContentLengthRange(min, max))
    }

    /// Sign the policy
    pub fn build(self, params: &PostSigningParams) -> Result<PresignedPost> {
        if self.expires_in.as_secs() == 0 || self.expires_in.as_secs() > MAX_EXPIRATION_SECS {
            return Err(Error::Policy(format!(
                "Policy expiration must be between 1 and {} seconds",
                MAX_EXPIRATION_SECS
            )));
        }
        for condition in &self.conditions {
            if let PostCondition::ContentLengthRange(min, max) = condition {
                if min > max {
                    return Err(Error::Policy(format!(
                        "content-length-range minimum {} exceeds maximum {}",
                        min, max
                    )));
                }
            }
        }

        let date = params.now.format("%Y%m%d").to_string();
        let amz_date = params.now.format("%Y%m%dT%H%M%SZ").to_string();
        let credential = format!(
            "{}/{}/{}/s3/aws4_request",
            params.access_key_id, date, params.region
        );
        let ttl = chrono::Duration::from_std(self.expires_in)
            .map_err(|e| Error::Policy(format!("Invalid expiration: {}", e)))?;
        let expiration = (params.now + ttl).format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();

        let mut conditions: Vec<Value> = vec![json!({ "bucket": self.bucket })];
        conditions.push(match &self.key {
            KeyMatch::Exact(key) => json!({ "key": key }),
            KeyMatch::Prefix(prefix) => json!(["starts-with", "$key", prefix]),
        });
        for (name, value) in &self.fields {
            conditions.push(eq_condition(name, value));
        }
        for condition in &self.conditions {
            conditions.push(match condition {
                PostCondition::Eq(name, value) => eq_condition(name, value),
                PostCondition::StartsWith(name, prefix) => {
                    json!(["starts-with", format!("${}", name), prefix])
                }
                PostCondition::ContentLengthRange(min, max) => {
                    json!(["content-length-range", min, max])
                }
            });
        }
        conditions.push(json!({ "x-amz-algorithm": ALGORITHM }));
        conditions.push(json!({ "x-amz-credential": credential }));
        conditions.push(json!({ "x-amz-date": amz_date }));

        let policy = json!({
            "expiration": expiration,
            "conditions": conditions,
        });
        let policy_b64 = base64::encode(policy.to_string());

        let signing_key = generate_signing_key(
            &params.secret_access_key,
            SystemTime::from(params.now),
            &params.region,
            "s3",
        );
        let signature = calculate_signature(signing_key, policy_b64.as_bytes());

        let url = format!("{}/{}", params.endpoint.trim_end_matches('/'), self.bucket);

        let mut fields = Vec::new();
        match self.key {
            KeyMatch::Exact(key) => fields.push(("key".to_string(), key)),
            // The uploader completes the key; the prefix is pre-filled
            KeyMatch::Prefix(prefix) => fields.push(("key".to_string(), prefix)),
        }
        fields.extend(self.fields);
        fields.push(("x-amz-algorithm".to_string(), ALGORITHM.to_string()));
        fields.push(("x-amz-credential".to_string(), credential));
        fields.push(("x-amz-date".to_string(), amz_date));
        fields.push(("policy".to_string(), policy_b64));
        fields.push(("x-amz-signature".to_string(), signature));

        Ok(PresignedPost { url, fields })
    }
}

/// `{"name": "value"}` condition with a runtime key
fn eq_condition(name: &str, value: &str) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(name.to_string(), Value::String(value.to_string()));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signing_params() -> PostSigningParams {
        PostSigningParams {
            endpoint: "https://storage.example.com".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG/bPxRCYEXAMPLEKEY".to_string(),
            now: Utc.with_ymd_and_hms(2026, 8, 23, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_post_policy_fields() {
        let post = PostPolicyBuilder::new("test-bucket", "uploads/avatar.png")
            .expires_in(Duration::from_secs(900))
            .field("Content-Type", "image/png")
            .content_length_range(1, 10 * 1024 * 1024)
            .build(&signing_params())
            .unwrap();

        assert_eq!(post.url, "https://storage.example.com/test-bucket");
        assert_eq!(post.field("key"), Some("uploads/avatar.png"));
        assert_eq!(post.field("Content-Type"), Some("image/png"));
        assert_eq!(post.field("x-amz-algorithm"), Some("AWS4-HMAC-SHA256"));
        assert_eq!(
            post.field("x-amz-credential"),
            Some("AKIDEXAMPLE/20260823/us-east-1/s3/aws4_request")
        );
        assert_eq!(post.field("x-amz-date"), Some("20260823T120000Z"));
        assert!(post.field("policy").is_some());

        let signature = post.field("x-amz-signature").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_policy_document_conditions() {
        let post = PostPolicyBuilder::new("test-bucket", "uploads/avatar.png")
            .field("Content-Type", "image/png")
            .content_length_range(1, 1024)
            .build(&signing_params())
            .unwrap();

        let decoded = base64::decode(post.field("policy").unwrap()).unwrap();
        let policy: Value = serde_json::from_slice(&decoded).unwrap();

        assert_eq!(policy["expiration"], "2026-08-23T13:00:00.000Z");
        let conditions = policy["conditions"].as_array().unwrap();
        assert!(conditions.contains(&json!({ "bucket": "test-bucket" })));
        assert!(conditions.contains(&json!({ "key": "uploads/avatar.png" })));
        assert!(conditions.contains(&json!({ "Content-Type": "image/png" })));
        assert!(conditions.contains(&json!(["content-length-range", 1, 1024])));
        assert!(conditions.contains(&json!({ "x-amz-date": "20260823T120000Z" })));
    }

    #[test]
    fn test_key_prefix_condition() {
        let post = PostPolicyBuilder::new("test-bucket", "ignored")
            .key_starts_with("user-uploads/")
            .build(&signing_params())
            .unwrap();

        let decoded = base64::decode(post.field("policy").unwrap()).unwrap();
        let policy: Value = serde_json::from_slice(&decoded).unwrap();
        let conditions = policy["conditions"].as_array().unwrap();

        assert!(conditions.contains(&json!(["starts-with", "$key", "user-uploads/"])));
        assert_eq!(post.field("key"), Some("user-uploads/"));
    }

    #[test]
    fn test_starts_with_field_condition() {
        let post = PostPolicyBuilder::new("test-bucket", "k")
            .condition(PostCondition::StartsWith(
                "success_action_redirect".to_string(),
                "https://app.example.com/".to_string(),
            ))
            .build(&signing_params())
            .unwrap();

        let decoded = base64::decode(post.field("policy").unwrap()).unwrap();
        let policy: Value = serde_json::from_slice(&decoded).unwrap();
        let conditions = policy["conditions"].as_array().unwrap();

        assert!(conditions.contains(&json!([
            "starts-with",
            "$success_action_redirect",
            "https://app.example.com/"
        ])));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = PostPolicyBuilder::new("b", "k").build(&signing_params()).unwrap();
        let b = PostPolicyBuilder::new("b", "k").build(&signing_params()).unwrap();
        assert_eq!(a.field("x-amz-signature"), b.field("x-amz-signature"));
    }

    #[test]
    fn test_invalid_content_length_range() {
        let result = PostPolicyBuilder::new("b", "k")
            .content_length_range(100, 1)
            .build(&signing_params());
        assert!(result.is_err());
    }

    #[test]
    fn test_expiration_ceiling() {
        let result = PostPolicyBuilder::new("b", "k")
            .expires_in(Duration::from_secs(MAX_EXPIRATION_SECS + 1))
            .build(&signing_params());
        assert!(result.is_err());

        let result = PostPolicyBuilder::new("b", "k")
            .expires_in(Duration::from_secs(MAX_EXPIRATION_SECS))
            .build(&signing_params());
        assert!(result.is_ok());
    }

    #[test]
    fn test_signing_params_require_static_keys() {
        let config = StorageConfig {
            endpoint: "https://storage.example.com".to_string(),
            region: "auto".to_string(),
            access_key_id: None,
            secret_access_key: None,
            default_bucket: "b".to_string(),
            default_expiration: 3600,
        };
        assert!(PostSigningParams::from_storage_config(&config).is_err());
    }
}
