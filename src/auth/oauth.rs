//! ID token verification for OpenID Connect issuers that publish RSA signing
//! keys as a JWKS, such as Firebase Authentication
//! (`https://securetoken.google.com/<project>`).
//!
//! Signature, `exp`, `iss` and `aud` are all enforced by the `Validation`
//! built once from the configuration. Keys are cached per `kid` and the JWKS
//! is re-downloaded when a token names a key we have not seen.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::AuthUser;
use crate::config::OAuthConfig;

const SIGNING_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// Unknown key ids trigger at most one JWKS download per interval
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    sub: Option<String>,
    /// Firebase mirrors `sub` here
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

pub struct OAuthValidator {
    jwks_uri: String,
    client: Client,
    validation: Validation,
    /// kid -> verification key. Rotated-out keys age out with the TTL.
    keys: Cache<String, Arc<DecodingKey>>,
    last_fetch: Mutex<Option<Instant>>,
}

impl OAuthValidator {
    pub async fn from_config(config: &OAuthConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("qrtrack-token-verifier/0.1.0")
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client for token verification")?;

        let jwks_uri = match &config.jwks_url {
            Some(url) => url.clone(),
            None => discover_jwks_uri(&client, &config.issuer_url).await?,
        };

        let keys = Cache::builder()
            .time_to_live(Duration::from_secs(config.jwks_cache_ttl_secs.max(60)))
            .build();

        let validator = Self {
            jwks_uri,
            client,
            validation: build_validation(&config.issuer_url, &config.audience),
            keys,
            last_fetch: Mutex::new(None),
        };

        let loaded = validator.fetch_keys().await?;
        *validator.last_fetch.lock().await = Some(Instant::now());
        info!("OAuth: loaded {} signing keys from {}", loaded, validator.jwks_uri);

        Ok(validator)
    }

    /// Verify a bearer token and map its claims to the caller identity
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser> {
        let header = decode_header(token).context("malformed token header")?;
        let kid = header
            .kid
            .ok_or_else(|| anyhow!("token header has no 'kid'"))?;

        let key = self.key_for(&kid).await?;
        verify(token, &key, &self.validation)
    }

    async fn key_for(&self, kid: &str) -> Result<Arc<DecodingKey>> {
        if let Some(key) = self.keys.get(kid).await {
            return Ok(key);
        }

        self.refresh().await?;
        self.keys
            .get(kid)
            .await
            .ok_or_else(|| anyhow!("no signing key with id '{kid}'"))
    }

    async fn refresh(&self) -> Result<()> {
        let mut last_fetch = self.last_fetch.lock().await;
        if matches!(*last_fetch, Some(at) if at.elapsed() < MIN_REFRESH_INTERVAL) {
            debug!("JWKS fetched recently, not refreshing");
            return Ok(());
        }

        let loaded = self.fetch_keys().await?;
        *last_fetch = Some(Instant::now());
        debug!("Refreshed JWKS: {} signing keys", loaded);
        Ok(())
    }

    async fn fetch_keys(&self) -> Result<usize> {
        let jwks: JwkSet = self
            .client
            .get(&self.jwks_uri)
            .send()
            .await
            .context("failed to request JWKS")?
            .error_for_status()
            .context("JWKS endpoint returned an error status")?
            .json()
            .await
            .context("failed to parse JWKS response")?;

        let keys = signing_keys(&jwks);
        if keys.is_empty() {
            bail!("JWKS at {} has no usable RSA signing keys", self.jwks_uri);
        }

        let loaded = keys.len();
        for (kid, key) in keys {
            self.keys.insert(kid, Arc::new(key)).await;
        }
        Ok(loaded)
    }
}

fn build_validation(issuer: &str, audience: &str) -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.algorithms = SIGNING_ALGORITHMS.to_vec();
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    validation
}

/// RSA keys that carry a key id. Other key types are skipped.
fn signing_keys(jwks: &JwkSet) -> Vec<(String, DecodingKey)> {
    jwks.keys
        .iter()
        .filter_map(|jwk| {
            let kid = jwk.common.key_id.clone()?;
            if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
                debug!(kid = %kid, "skipping non-RSA JWKS entry");
                return None;
            }
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => Some((kid, key)),
                Err(e) => {
                    warn!(kid = %kid, error = %e, "skipping unreadable JWKS entry");
                    None
                }
            }
        })
        .collect()
}

fn verify(token: &str, key: &DecodingKey, validation: &Validation) -> Result<AuthUser> {
    let data = decode::<IdTokenClaims>(token, key, validation).context("token rejected")?;
    user_from_claims(data.claims)
}

fn user_from_claims(claims: IdTokenClaims) -> Result<AuthUser> {
    let uid = claims
        .sub
        .filter(|uid| !uid.is_empty())
        .or(claims.user_id.filter(|uid| !uid.is_empty()))
        .ok_or_else(|| anyhow!("token has no subject"))?;

    Ok(AuthUser {
        uid,
        email: claims.email,
    })
}

async fn discover_jwks_uri(client: &Client, issuer_url: &str) -> Result<String> {
    #[derive(Deserialize)]
    struct ProviderMetadata {
        jwks_uri: Option<String>,
    }

    let discovery_url = format!(
        "{}/.well-known/openid-configuration",
        issuer_url.trim_end_matches('/')
    );
    let metadata: ProviderMetadata = client
        .get(&discovery_url)
        .send()
        .await
        .with_context(|| format!("failed to request {discovery_url}"))?
        .error_for_status()
        .context("OpenID discovery endpoint returned an error status")?
        .json()
        .await
        .context("failed to parse OpenID provider metadata")?;

    metadata
        .jwks_uri
        .ok_or_else(|| anyhow!("OpenID provider metadata has no 'jwks_uri'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const ISSUER: &str = "https://securetoken.google.com/qrtrack-demo";
    const AUDIENCE: &str = "qrtrack-demo";

    fn claims(sub: &str, iss: &str, aud: &str) -> serde_json::Value {
        json!({
            "sub": sub,
            "user_id": sub,
            "email": "owner@example.com",
            "iss": iss,
            "aud": aud,
            "exp": 4_000_000_000u64,
        })
    }

    fn hs256(claims: &serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    /// Same issuer and audience rules, but accepting an HMAC test key
    fn hmac_validation() -> Validation {
        let mut validation = build_validation(ISSUER, AUDIENCE);
        validation.algorithms = vec![Algorithm::HS256];
        validation
    }

    #[test]
    fn validation_pins_issuer_audience_and_rsa() {
        let validation = build_validation(ISSUER, AUDIENCE);
        assert!(validation.iss.as_ref().unwrap().contains(ISSUER));
        assert!(validation.aud.as_ref().unwrap().contains(AUDIENCE));
        assert_eq!(validation.algorithms, SIGNING_ALGORITHMS.to_vec());
    }

    #[test]
    fn symmetric_tokens_are_rejected() {
        let token = hs256(&claims("uid-1", ISSUER, AUDIENCE));
        let key = DecodingKey::from_secret(b"test-secret");
        assert!(verify(&token, &key, &build_validation(ISSUER, AUDIENCE)).is_err());
    }

    #[test]
    fn issuer_and_audience_are_enforced() {
        let key = DecodingKey::from_secret(b"test-secret");
        let validation = hmac_validation();

        let user = verify(&hs256(&claims("uid-1", ISSUER, AUDIENCE)), &key, &validation).unwrap();
        assert_eq!(user.uid, "uid-1");
        assert_eq!(user.email.as_deref(), Some("owner@example.com"));

        let other_issuer = claims("uid-1", "https://securetoken.google.com/other", AUDIENCE);
        assert!(verify(&hs256(&other_issuer), &key, &validation).is_err());

        let other_audience = claims("uid-1", ISSUER, "other");
        assert!(verify(&hs256(&other_audience), &key, &validation).is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let key = DecodingKey::from_secret(b"test-secret");
        let mut expired = claims("uid-1", ISSUER, AUDIENCE);
        expired["exp"] = json!(1_000_000_000u64);
        assert!(verify(&hs256(&expired), &key, &hmac_validation()).is_err());
    }

    #[test]
    fn only_rsa_keys_with_ids_are_used() {
        let jwks: JwkSet = serde_json::from_value(json!({
            "keys": [
                { "kty": "RSA", "kid": "rsa-1", "alg": "RS256", "use": "sig", "n": "AQAB", "e": "AQAB" },
                { "kty": "RSA", "alg": "RS256", "n": "AQAB", "e": "AQAB" },
                { "kty": "oct", "kid": "hmac-1", "k": "dGVzdC1zZWNyZXQ" }
            ]
        }))
        .unwrap();

        let kids: Vec<_> = signing_keys(&jwks).into_iter().map(|(kid, _)| kid).collect();
        assert_eq!(kids, vec!["rsa-1".to_string()]);
    }

    #[test]
    fn claims_map_to_auth_user() {
        let user = user_from_claims(IdTokenClaims {
            sub: Some("firebase-uid-1".to_string()),
            user_id: None,
            email: Some("owner@example.com".to_string()),
        })
        .unwrap();
        assert_eq!(user.uid, "firebase-uid-1");
        assert_eq!(user.email.as_deref(), Some("owner@example.com"));

        let user = user_from_claims(IdTokenClaims {
            sub: Some(String::new()),
            user_id: Some("fallback-uid".to_string()),
            email: None,
        })
        .unwrap();
        assert_eq!(user.uid, "fallback-uid");

        assert!(user_from_claims(IdTokenClaims {
            sub: None,
            user_id: None,
            email: None,
        })
        .is_err());
    }
}
