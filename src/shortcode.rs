use std::sync::Arc;

use chrono::Utc;
use rand::{rngs::OsRng, RngCore};

use crate::{
    error::{AllocError, StoreError},
    models::{Link, NewLink},
    store::LinkStore,
};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of every allocated short code.
pub const CODE_LENGTH: usize = 6;

/// Generate-then-check cycles before allocation gives up.
///
/// Each attempt collides with probability of roughly `links / 62^6`, so this
/// is only adequate while the table stays far below `62^6` rows.
pub const MAX_ATTEMPTS: u32 = 5;

/// Generate a random alphanumeric string of the given length from the OS
/// entropy source. Short codes double as bearer tokens for their destination,
/// so a predictable generator is not acceptable here.
pub fn generate(len: usize) -> Result<String, rand::Error> {
    generate_with(&mut OsRng, len)
}

fn generate_with<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> Result<String, rand::Error> {
    // Bytes at or above 248 (= 4 * 62) are discarded so every symbol is
    // equally likely.
    const LIMIT: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

    let mut code = String::with_capacity(len);
    let mut buf = [0u8; 32];
    while code.len() < len {
        rng.try_fill_bytes(&mut buf)?;
        let wanted = len - code.len();
        for &byte in buf.iter().filter(|&&b| b < LIMIT).take(wanted) {
            code.push(ALPHABET[byte as usize % ALPHABET.len()] as char);
        }
    }
    Ok(code)
}

/// Hands out links with short codes that are not in use yet.
#[derive(Clone)]
pub struct LinkAllocator {
    store: Arc<dyn LinkStore>,
}

impl LinkAllocator {
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self { store }
    }

    /// Allocate a fresh short code for `original_url` and persist the link.
    ///
    /// Collisions (an existing code on lookup, or a duplicate-key rejection on
    /// insert when another allocation raced us) cost one attempt each. Any
    /// other store error aborts immediately.
    pub async fn create_link(&self, original_url: &str) -> Result<Link, AllocError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let code = generate(CODE_LENGTH)?;

            match self.store.find_by_code(&code).await {
                Ok(existing) => {
                    tracing::warn!(
                        code = %code,
                        existing_id = existing.id,
                        "Short code already exists, retrying generation ({}/{})",
                        attempt,
                        MAX_ATTEMPTS
                    );
                    continue;
                }
                Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }

            let new_link = NewLink {
                short_code: code,
                original_url: original_url.to_owned(),
                created_at: Utc::now().naive_utc(),
            };

            match self.store.create_link(new_link).await {
                Ok(link) => {
                    tracing::info!(id = link.id, code = %link.short_code, "Link created");
                    return Ok(link);
                }
                Err(StoreError::Duplicate) => {
                    tracing::warn!(
                        "Short code was taken by a concurrent insert, retrying generation ({}/{})",
                        attempt,
                        MAX_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AllocError::Exhausted {
            attempts: MAX_ATTEMPTS,
        })
    }
}
