//! Provider access tokens for the softphone client.
//!
//! The token is an HS256 JWT signed with the API key secret, carrying a voice
//! grant that lets the client place calls through the configured application
//! and receive calls addressed to its identity.

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Content type the provider expects on its access tokens.
pub const TOKEN_CONTENT_TYPE: &str = "twilio-fpa;v=1";

pub const DEFAULT_IDENTITY: &str = "browser-client-1000";
pub const DEFAULT_TOKEN_TTL: u64 = 14400;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub jti: String,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub grants: Grants,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Grants {
    pub identity: String,
    pub voice: VoiceGrant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceGrant {
    pub incoming: IncomingGrant,
    pub outgoing: OutgoingGrant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncomingGrant {
    pub allow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutgoingGrant {
    pub application_sid: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub identity: String,
    pub token: String,
    pub ttl: u64,
}

pub struct AccessTokenBuilder<'a> {
    account_sid: &'a str,
    api_key: &'a str,
    api_secret: &'a str,
    application_sid: &'a str,
    identity: String,
    ttl: u64,
}

impl<'a> AccessTokenBuilder<'a> {
    pub fn new(
        account_sid: &'a str,
        api_key: &'a str,
        api_secret: &'a str,
        application_sid: &'a str,
    ) -> Self {
        Self {
            account_sid,
            api_key,
            api_secret,
            application_sid,
            identity: DEFAULT_IDENTITY.to_string(),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn claims(&self, issued_at: i64) -> Claims {
        Claims {
            jti: format!("{}-{}", self.api_key, issued_at),
            iss: self.api_key.to_string(),
            sub: self.account_sid.to_string(),
            iat: issued_at,
            nbf: issued_at,
            exp: issued_at + self.ttl as i64,
            grants: Grants {
                identity: self.identity.clone(),
                voice: VoiceGrant {
                    incoming: IncomingGrant { allow: true },
                    outgoing: OutgoingGrant {
                        application_sid: self.application_sid.to_string(),
                    },
                },
            },
        }
    }

    pub fn build(self) -> Result<IssuedToken> {
        let claims = self.claims(Utc::now().timestamp());
        let token = encode(&claims, self.api_secret)?;
        Ok(IssuedToken {
            identity: self.identity,
            token,
            ttl: self.ttl,
        })
    }
}

pub fn encode(claims: &Claims, secret: &str) -> Result<String> {
    let header = Header {
        alg: Algorithm::HS256,
        cty: Some(TOKEN_CONTENT_TYPE.to_string()),
        ..Default::default()
    };
    let token = jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(secret.as_bytes()))?;
    Ok(token)
}
