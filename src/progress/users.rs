//! Provisioning of user records
//!
//! User records are owned by the surrounding application; the ledger only
//! increments `stats.xp` on them and requires them to exist. This helper
//! creates a minimal record for local setups and tests.

use serde_json::Value;

use super::models::user_ref;
use crate::store::{DocumentStore, FieldValue, Fields, StoreError};

/// Create `users/{user_id}` with zeroed stats unless it already exists.
///
/// Returns `true` if the record was created.
pub fn ensure_user<S: DocumentStore>(
    store: &S,
    user_id: &str,
    display_name: Option<&str>,
) -> Result<bool, StoreError> {
    let doc = user_ref(user_id);
    let created = store.run_transaction(|tx| {
        if tx.get(&doc)?.is_some() {
            return Ok(false);
        }
        let name = display_name.map_or(Value::Null, Value::from);
        tx.set(
            &doc,
            Fields::new()
                .with("displayName", name)
                .with("stats.xp", 0)
                .with("createdAt", FieldValue::ServerTimestamp),
            false,
        );
        Ok(true)
    })?;

    if created {
        tracing::info!(user = user_id, "created user record");
    }
    Ok(created)
}
