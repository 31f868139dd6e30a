use anyhow::{Context, Result};

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// bcrypt with a configurable cost. Both operations run on the blocking pool.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        PasswordHasher { cost }
    }

    pub async fn hash(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .context("password hashing task failed")?
            .context("failed to hash password")
    }

    /// A malformed stored hash counts as a mismatch.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .context("password verification task failed")?;
        match outcome {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::warn!("Unreadable password hash: {e}");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hasher = PasswordHasher::new(4);
        let hash = hasher.hash("secret1").await.unwrap();
        assert_ne!(hash, "secret1");
        assert!(hasher.verify("secret1", &hash).await.unwrap());
        assert!(!hasher.verify("secret2", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_hash_does_not_match() {
        let hasher = PasswordHasher::new(4);
        assert!(!hasher.verify("secret1", "plain-text").await.unwrap());
    }
}
