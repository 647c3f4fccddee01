// Credential Resolver (C2)
//
// The actual encrypted-at-rest store is external (out of scope); this is
// the decrypt-and-ownership-check step only, using `ring` AEAD to decrypt
// a credential's payload after confirming the requesting user owns it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use serde_json::Value;

use crate::models::UserId;
use crate::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct EncryptedCredential {
    pub owner_id: UserId,
    pub revoked: bool,
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, credential_id: &str) -> Result<Option<EncryptedCredential>>;
}

pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    key: LessSafeKey,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>, key_bytes: [u8; 32]) -> Self {
        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes).expect("256-bit key is valid for AES-256-GCM");
        CredentialResolver {
            store,
            key: LessSafeKey::new(unbound),
        }
    }

    pub async fn resolve(&self, credential_id: &str, user_id: &UserId) -> Result<HashMap<String, Value>> {
        let credential = self
            .store
            .get(credential_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("credential {}", credential_id)))?;

        if credential.revoked || &credential.owner_id != user_id {
            return Err(EngineError::PermissionDenied(format!(
                "credential {} is not accessible to user {}",
                credential_id, user_id
            )));
        }

        let mut buffer = credential.ciphertext.clone();
        let nonce = Nonce::assume_unique_for_key(credential.nonce);
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut buffer)
            .map_err(|_| EngineError::PermissionDenied(format!("credential {} could not be decrypted", credential_id)))?;

        let parsed: HashMap<String, Value> = serde_json::from_slice(plaintext)?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::aead::{Aad, Nonce, NONCE_LEN};
    use ring::rand::{SecureRandom, SystemRandom};

    struct InMemoryCredentialStore {
        entries: HashMap<String, EncryptedCredential>,
    }

    #[async_trait]
    impl CredentialStore for InMemoryCredentialStore {
        async fn get(&self, credential_id: &str) -> Result<Option<EncryptedCredential>> {
            Ok(self.entries.get(credential_id).cloned())
        }
    }

    fn seal(key_bytes: [u8; 32], owner: &UserId, payload: &[u8]) -> EncryptedCredential {
        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes).unwrap();
        let key = LessSafeKey::new(unbound);
        let rng = SystemRandom::new();
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill(&mut nonce_bytes).unwrap();
        let mut in_out = payload.to_vec();
        key.seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce_bytes), Aad::empty(), &mut in_out)
            .unwrap();
        EncryptedCredential {
            owner_id: owner.clone(),
            revoked: false,
            nonce: nonce_bytes,
            ciphertext: in_out,
        }
    }

    #[tokio::test]
    async fn resolves_owned_credential() {
        let key_bytes = [7u8; 32];
        let owner = UserId::from("u1");
        let payload = serde_json::json!({"apiKey": "secret"}).to_string();
        let encrypted = seal(key_bytes, &owner, payload.as_bytes());

        let mut entries = HashMap::new();
        entries.insert("cred-1".to_string(), encrypted);
        let store = Arc::new(InMemoryCredentialStore { entries });
        let resolver = CredentialResolver::new(store, key_bytes);

        let resolved = resolver.resolve("cred-1", &owner).await.unwrap();
        assert_eq!(resolved.get("apiKey"), Some(&Value::from("secret")));
    }

    #[tokio::test]
    async fn denies_cross_user_access() {
        let key_bytes = [7u8; 32];
        let owner = UserId::from("u1");
        let encrypted = seal(key_bytes, &owner, b"{}");
        let mut entries = HashMap::new();
        entries.insert("cred-1".to_string(), encrypted);
        let store = Arc::new(InMemoryCredentialStore { entries });
        let resolver = CredentialResolver::new(store, key_bytes);

        let result = resolver.resolve("cred-1", &UserId::from("u2")).await;
        assert!(matches!(result, Err(EngineError::PermissionDenied(_))));
    }
}
