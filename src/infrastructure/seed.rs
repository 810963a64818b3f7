use rust_decimal_macros::dec;
use tracing::info;

use crate::domain::account::NewAccount;
use crate::domain::card::mask_card_number;
use crate::domain::ports::AtmStore;
use crate::error::Result;

/// Provisions the built-in sample accounts if the store holds none.
///
/// Returns how many accounts were created (zero when the store already has
/// data, e.g. on a second run against a persistent backend).
pub async fn seed_sample_accounts(store: &dyn AtmStore) -> Result<usize> {
    if !store.is_empty().await? {
        info!("store already contains accounts, skipping seed");
        return Ok(0);
    }

    let samples = [
        ("4532015112830366", "John Doe", "1234", dec!(5000.00), dec!(1000.00)),
        ("5425233430109903", "Jane Smith", "5678", dec!(10000.00), dec!(2000.00)),
        ("4916338506082832", "Bob Johnson", "9012", dec!(2500.00), dec!(500.00)),
        ("4024007134564842", "Alice Williams", "3456", dec!(15000.00), dec!(3000.00)),
    ];

    let mut created = 0;
    for (card, name, pin, balance, limit) in samples {
        let account = store
            .insert(NewAccount::new(card, name, pin, balance, limit)?)
            .await?;
        info!(
            account_id = account.id,
            card = %mask_card_number(card),
            balance = %balance,
            "seeded sample account"
        );
        created += 1;
    }
    Ok(created)
}
