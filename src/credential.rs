//! Short-lived seat credentials.
//!
//! A credential is the signed proof that an agent occupies a specific seat at
//! a specific table. Tokens are issued by the server, expire after a
//! configurable window, and can be re-issued from a still-valid token without
//! re-authenticating. Expired or malformed tokens are always rejected.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::engine::{AgentId, SeatId};
use crate::signing::{Signable, SigningKey, TranscriptBuilder};

/// Default credential lifetime.
pub const DEFAULT_TTL_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("credential token is malformed")]
    Malformed,
    #[error("credential signature is invalid")]
    InvalidSignature,
    #[error("credential expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("credential is bound to a different table")]
    WrongTable,
    #[error("credential is bound to a different agent")]
    WrongAgent,
}

/// The signed payload carried inside a seat token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatClaims {
    pub agent_id: AgentId,
    pub table_id: Uuid,
    pub seat: SeatId,
    pub expires_at: DateTime<Utc>,
}

impl Signable for SeatClaims {
    fn domain_kind(&self) -> &'static str {
        "credential/seat_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_str(&self.agent_id);
        builder.append_bytes(self.table_id.as_bytes());
        builder.append_u8(self.seat);
        builder.append_i64(self.expires_at.timestamp_millis());
    }
}

/// Issues and verifies seat tokens with a server-held key.
pub struct CredentialIssuer {
    key: SigningKey,
    ttl: Duration,
}

impl CredentialIssuer {
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
        }
    }

    pub fn with_ttl(key: SigningKey, ttl: Duration) -> Self {
        Self { key, ttl }
    }

    pub fn issue(&self, agent_id: AgentId, table_id: Uuid, seat: SeatId) -> String {
        let claims = SeatClaims {
            agent_id,
            table_id,
            seat,
            expires_at: Utc::now() + self.ttl,
        };
        self.encode(&claims)
    }

    /// Verify a token and return its claims. Checks signature first, then
    /// expiry, so a forged token never learns whether its claims parse.
    pub fn verify(&self, token: &str) -> Result<SeatClaims, CredentialError> {
        let (sig_hex, claims_hex) = token.split_once('.').ok_or(CredentialError::Malformed)?;
        let signature = hex::decode(sig_hex).map_err(|_| CredentialError::Malformed)?;
        let claims_bytes = hex::decode(claims_hex).map_err(|_| CredentialError::Malformed)?;
        let claims: SeatClaims =
            serde_json::from_slice(&claims_bytes).map_err(|_| CredentialError::Malformed)?;
        if !self.key.verify_value(&claims, &signature) {
            return Err(CredentialError::InvalidSignature);
        }
        if claims.expires_at <= Utc::now() {
            return Err(CredentialError::Expired(claims.expires_at));
        }
        Ok(claims)
    }

    /// Verify a token against the table and agent the caller claims to be.
    pub fn verify_for(
        &self,
        token: &str,
        agent_id: &str,
        table_id: Uuid,
    ) -> Result<SeatClaims, CredentialError> {
        let claims = self.verify(token)?;
        if claims.table_id != table_id {
            return Err(CredentialError::WrongTable);
        }
        if claims.agent_id != agent_id {
            return Err(CredentialError::WrongAgent);
        }
        Ok(claims)
    }

    /// Re-issue a fresh token from a still-valid one. An expired token cannot
    /// be refreshed.
    pub fn refresh(&self, token: &str) -> Result<String, CredentialError> {
        let claims = self.verify(token)?;
        Ok(self.issue(claims.agent_id, claims.table_id, claims.seat))
    }

    fn encode(&self, claims: &SeatClaims) -> String {
        let signature = self.key.sign_value(claims);
        let body = serde_json::to_vec(claims).expect("seat claims serialize");
        format!("{}.{}", hex::encode(signature), hex::encode(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> CredentialIssuer {
        CredentialIssuer::new(SigningKey::from_bytes(b"test-issuer-key"))
    }

    #[test]
    fn issued_tokens_verify_and_carry_claims() {
        let issuer = issuer();
        let table = Uuid::new_v4();
        let token = issuer.issue("agent-a".into(), table, 3);
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.agent_id, "agent-a");
        assert_eq!(claims.table_id, table);
        assert_eq!(claims.seat, 3);
        assert!(claims.expires_at > Utc::now());
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let issuer = issuer();
        let token = issuer.issue("agent-a".into(), Uuid::new_v4(), 0);
        let (sig, body) = token.split_once('.').unwrap();
        // re-point the claims at another agent without re-signing
        let mut claims: SeatClaims =
            serde_json::from_slice(&hex::decode(body).unwrap()).unwrap();
        claims.agent_id = "agent-b".into();
        let forged = format!(
            "{sig}.{}",
            hex::encode(serde_json::to_vec(&claims).unwrap())
        );
        assert_eq!(
            issuer.verify(&forged),
            Err(CredentialError::InvalidSignature)
        );
    }

    #[test]
    fn expired_tokens_cannot_be_used_or_refreshed() {
        let issuer =
            CredentialIssuer::with_ttl(SigningKey::from_bytes(b"test-issuer-key"), Duration::minutes(-1));
        let token = issuer.issue("agent-a".into(), Uuid::new_v4(), 0);
        assert!(matches!(
            issuer.verify(&token),
            Err(CredentialError::Expired(_))
        ));
        assert!(issuer.refresh(&token).is_err());
    }

    #[test]
    fn refresh_extends_a_valid_token() {
        let issuer = issuer();
        let table = Uuid::new_v4();
        let token = issuer.issue("agent-a".into(), table, 1);
        let refreshed = issuer.refresh(&token).unwrap();
        let claims = issuer.verify(&refreshed).unwrap();
        assert_eq!(claims.agent_id, "agent-a");
        assert_eq!(claims.table_id, table);
    }

    #[test]
    fn verify_for_checks_binding() {
        let issuer = issuer();
        let table = Uuid::new_v4();
        let token = issuer.issue("agent-a".into(), table, 1);
        assert!(issuer.verify_for(&token, "agent-a", table).is_ok());
        assert_eq!(
            issuer.verify_for(&token, "agent-b", table),
            Err(CredentialError::WrongAgent)
        );
        assert_eq!(
            issuer.verify_for(&token, "agent-a", Uuid::new_v4()),
            Err(CredentialError::WrongTable)
        );
    }

    #[test]
    fn garbage_tokens_are_malformed() {
        let issuer = issuer();
        assert_eq!(issuer.verify("not-a-token"), Err(CredentialError::Malformed));
        assert_eq!(issuer.verify("zz.zz"), Err(CredentialError::Malformed));
    }
}
