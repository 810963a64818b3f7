use tracing::{info, warn};

use crate::domain::account::AccountId;
use crate::domain::card::mask_card_number;
use crate::domain::ports::{AccountStore, SharedStore};
use crate::error::{AtmError, Result};

/// A verified account identity. Everything downstream of authentication
/// trusts the account id carried here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub account_id: AccountId,
    pub customer_name: String,
}

/// Maps a card/PIN pair to a verified account identity.
///
/// Transport-level concerns (field decryption, request shaping) live with
/// the caller; this service only resolves the card and compares the PIN.
pub struct Authenticator {
    store: SharedStore,
}

impl Authenticator {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn authenticate(&self, card_number: &str, pin: &str) -> Result<AuthSession> {
        let masked = mask_card_number(card_number);

        let Some(account) = self.store.find_by_card(card_number).await? else {
            // Same error for unknown card and wrong PIN, so a caller cannot
            // probe which cards exist.
            warn!(card = %masked, "authentication failed, unknown card");
            return Err(AtmError::InvalidCredentials);
        };

        if account.pin != pin {
            warn!(card = %masked, "authentication failed, PIN mismatch");
            return Err(AtmError::InvalidCredentials);
        }

        if !account.active {
            warn!(account_id = account.id, "authentication rejected, account is not active");
            return Err(AtmError::AccountInactive(account.id));
        }

        info!(account_id = account.id, card = %masked, "authentication successful");
        Ok(AuthSession {
            account_id: account.id,
            customer_name: account.customer_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::NewAccount;
    use crate::domain::ports::{AtmStore, JournalWrite};
    use crate::infrastructure::in_memory::InMemoryStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn setup() -> (Arc<InMemoryStore>, Authenticator) {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert(
                NewAccount::new(
                    "4532015112830366",
                    "John Doe",
                    "1234",
                    dec!(5000.00),
                    dec!(1000.00),
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let auth = Authenticator::new(store.clone());
        (store, auth)
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let (_store, auth) = setup().await;
        let session = auth.authenticate("4532015112830366", "1234").await.unwrap();
        assert_eq!(session.account_id, 1);
        assert_eq!(session.customer_name, "John Doe");
    }

    #[tokio::test]
    async fn test_wrong_pin_and_unknown_card_look_alike() {
        let (_store, auth) = setup().await;
        let wrong_pin = auth
            .authenticate("4532015112830366", "0000")
            .await
            .unwrap_err();
        let unknown_card = auth
            .authenticate("9999999999999999", "1234")
            .await
            .unwrap_err();
        assert!(matches!(wrong_pin, AtmError::InvalidCredentials));
        assert!(matches!(unknown_card, AtmError::InvalidCredentials));

        // Card strings are masked before any validation, so multibyte
        // garbage must fail cleanly rather than panic.
        let garbage = auth.authenticate("€€€€€€€€", "1234").await.unwrap_err();
        assert!(matches!(garbage, AtmError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_inactive_account_rejected() {
        let (store, auth) = setup().await;
        let mut account = store.get(1).await.unwrap().unwrap();
        account.active = false;
        store.commit(account, JournalWrite::None).await.unwrap();

        let err = auth
            .authenticate("4532015112830366", "1234")
            .await
            .unwrap_err();
        assert!(matches!(err, AtmError::AccountInactive(1)));
    }
}
